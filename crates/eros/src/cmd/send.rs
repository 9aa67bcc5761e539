use std::fs;

use eros_client::{request, ErosConfig};

use crate::cmd::{open_endpoint, parse_duration, wait_connected, SendArgs};
use crate::exit::{eros_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_response, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let payload = resolve_payload(&args)?;

    let eros = open_endpoint(&args.endpoint, ErosConfig::default().with_auto_reconnect(false))?;
    wait_connected(&eros, connect_timeout)?;

    let result = if args.wait {
        request(&eros, args.channel, &payload, wait_timeout)
            .map(|response| print_response(args.channel, &response, format))
            .map_err(|err| eros_error("request failed", err))
    } else {
        eros.transmit_packet(args.channel, &payload)
            .map_err(|err| eros_error("send failed", err))
    };
    tracing::debug!(summary = ?eros.traffic_summary(), "send finished");
    eros.close();

    result.map(|()| SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            CliError::new(USAGE, format!("failed reading {}: {err}", path.display()))
        });
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(data: Option<&str>) -> SendArgs {
        SendArgs {
            endpoint: "loopback".to_string(),
            channel: 5,
            data: data.map(str::to_string),
            file: None,
            wait: false,
            wait_timeout: "5s".to_string(),
            connect_timeout: "5s".to_string(),
        }
    }

    #[test]
    fn payload_comes_from_data_or_is_empty() {
        assert_eq!(resolve_payload(&args(Some("status"))).unwrap(), b"status");
        assert!(resolve_payload(&args(None)).unwrap().is_empty());
    }

    #[test]
    fn missing_payload_file_is_reported() {
        let mut args = args(None);
        args.file = Some("/nonexistent/eros-payload.bin".into());
        let err = resolve_payload(&args).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn loopback_request_prints_echoed_command() {
        let mut args = args(Some("ping"));
        args.wait = true;
        args.wait_timeout = "2s".to_string();
        assert_eq!(run(args, OutputFormat::Json).unwrap(), SUCCESS);
    }
}

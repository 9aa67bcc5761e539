use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Subcommand};
use eros_client::{Endpoint, Eros, ErosConfig, InboundRoute, TransportState};
use eros_frame::{ChannelId, TERMINAL};

use crate::exit::{eros_error, CliError, CliResult, INTERNAL, TIMEOUT, TRANSPORT_ERROR, USAGE};
use crate::output::OutputFormat;

pub mod bridge;
pub mod echo;
pub mod monitor;
pub mod ports;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports.
    Ports(PortsArgs),
    /// Print frames received from a device.
    Monitor(MonitorArgs),
    /// Send a single packet.
    Send(SendArgs),
    /// Share one device link with local pub/sub clients.
    Bridge(BridgeArgs),
    /// Run a TCP device simulator that echoes packets.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Bridge(args) => bridge::run(args, format),
        Command::Echo(args) => echo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {
    /// Only list devices with a known vendor id.
    #[arg(long)]
    pub known_only: bool,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Device endpoint, e.g. serial:/dev/ttyUSB0@115200 or tcp:192.168.4.1:2000.
    #[arg(env = "EROS_ENDPOINT")]
    pub endpoint: String,
    /// Filter to specific channels (comma-separated). Default: all.
    #[arg(long, value_delimiter = ',')]
    pub channels: Option<Vec<ChannelId>>,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Do not print bytes that fail to decode.
    #[arg(long)]
    pub no_fail: bool,
    /// Do not print link state changes.
    #[arg(long)]
    pub no_state: bool,
    /// Stop instead of reconnecting when the link drops.
    #[arg(long)]
    pub no_reconnect: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Device endpoint.
    #[arg(env = "EROS_ENDPOINT")]
    pub endpoint: String,
    /// Channel to send on.
    #[arg(long, short = 'c', default_value_t = TERMINAL)]
    pub channel: ChannelId,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Wait for the device's response on the same channel and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for a response when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Maximum time to wait for the link to come up.
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct BridgeArgs {
    /// Device endpoint to share.
    #[arg(env = "EROS_ENDPOINT")]
    pub endpoint: String,
    /// Address to bind the publish and subscribe sockets on.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    /// Publish port; subscribers use port + 1.
    #[arg(long, default_value_t = 2000)]
    pub port: u16,
    /// What to do with bytes written by subscribers: `receive` feeds them to
    /// local handlers, `transmit` forwards them to the device.
    #[arg(long, default_value = "receive")]
    pub inbound: InboundRoute,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:2000")]
    pub listen: String,
    /// Channels answered with ACK/NACK instead of an echo (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "5")]
    pub command_channels: Vec<ChannelId>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Clear `running` on Ctrl-C.
pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Parse an endpoint argument and start a client on it.
pub(crate) fn open_endpoint(endpoint: &str, config: ErosConfig) -> CliResult<Eros> {
    let endpoint: Endpoint = endpoint
        .parse()
        .map_err(|err| eros_error("invalid endpoint", err))?;
    tracing::debug!(%endpoint, kind = endpoint.kind(), "opening endpoint");
    endpoint
        .open(config)
        .map_err(|err| eros_error("open failed", err))
}

/// Block until the link is up.
///
/// Without auto-reconnect a failed first attempt is final, so it is reported
/// right away instead of waiting out the timeout.
pub(crate) fn wait_connected(eros: &Eros, timeout: Duration) -> CliResult<()> {
    let deadline = Instant::now() + timeout;
    loop {
        match eros.get_state() {
            TransportState::Connected => return Ok(()),
            TransportState::Dead
                if !eros.config().auto_reconnect && eros.connect_attempts() > 0 =>
            {
                return Err(CliError::new(
                    TRANSPORT_ERROR,
                    format!("could not connect to {}", eros.target()),
                ));
            }
            _ => {}
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("timed out connecting to {}", eros.target()),
            ));
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Parse durations such as `5s`, `150ms` or `3` (seconds).
pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use eros_transport::{LoopbackTransport, TcpTransport};

    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn invalid_endpoint_is_a_usage_error() {
        let err = open_endpoint("ftp:somewhere", ErosConfig::default()).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn wait_connected_returns_once_link_is_up() {
        let eros = Eros::new(LoopbackTransport::echo(), ErosConfig::default()).unwrap();
        wait_connected(&eros, Duration::from_secs(3)).unwrap();
        eros.close();
    }

    #[test]
    fn wait_connected_fails_fast_without_reconnect() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = ErosConfig::default().with_auto_reconnect(false);
        let eros = Eros::new(TcpTransport::new("127.0.0.1", port), config).unwrap();

        let err = wait_connected(&eros, Duration::from_secs(3)).unwrap_err();
        assert_eq!(err.code, TRANSPORT_ERROR);
        eros.close();
    }
}

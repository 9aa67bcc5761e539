use std::fmt;
use std::io;

use eros_client::ErosError;
use eros_frame::FrameError;
use eros_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::PermissionDenied
        | io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::InvalidChannel(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn eros_error(context: &str, err: ErosError) -> CliError {
    match err {
        ErosError::Transport(err) => transport_error(context, err),
        ErosError::Frame(err) => frame_error(context, err),
        ErosError::InvalidChannel(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        ErosError::InvalidEndpoint { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        ErosError::Bind { .. } => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        ErosError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ErosError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
        ErosError::Io(source) => io_error(context, source),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn maps_library_errors_to_exit_codes() {
        let invalid = "nope".parse::<eros_client::Endpoint>().unwrap_err();
        assert_eq!(eros_error("open", invalid).code, USAGE);
        assert_eq!(
            eros_error("request", ErosError::Timeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
        assert_eq!(
            eros_error("send", ErosError::InvalidChannel(20)).code,
            DATA_INVALID
        );
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(io_error("connect", refused).code, TRANSPORT_ERROR);
    }
}

use std::time::Duration;

use eros_frame::ChannelId;

/// Errors returned by the eros client.
///
/// Link failures after construction are not reported here: they move the
/// client to `DEAD` and the reconnector takes over.
#[derive(Debug, thiserror::Error)]
pub enum ErosError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] eros_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] eros_frame::FrameError),

    /// The channel id does not fit a frame header.
    #[error("invalid channel {0} (valid channels are 0-15)")]
    InvalidChannel(ChannelId),

    /// An endpoint string could not be parsed.
    #[error("invalid endpoint '{input}': {reason}")]
    InvalidEndpoint { input: String, reason: String },

    /// The pub/sub bridge could not bind one of its ports.
    #[error("failed to bind bridge port {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// No response arrived in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The client has been closed.
    #[error("client closed")]
    Closed,

    /// Other I/O error (thread spawn, socket setup).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ErosError>;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The channel id does not fit the header nibble.
    #[error("invalid channel {0} (valid channels are 0-15)")]
    InvalidChannel(u8),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The frame body is not valid COBS.
    #[error("malformed COBS encoding")]
    Cobs,

    /// The decoded body is too short to hold a header and checksum.
    #[error("frame too short ({0} bytes)")]
    TooShort(usize),

    /// The header names a frame kind this decoder does not know.
    #[error("unknown frame kind {0:#x}")]
    UnknownKind(u8),

    /// The checksum does not match the frame contents.
    #[error("checksum mismatch (expected {expected:#06x}, computed {computed:#06x})")]
    Checksum { expected: u16, computed: u16 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

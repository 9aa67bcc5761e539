//! COBS-delimited frames with channel multiplexing for eros.
//!
//! Every frame on the wire is:
//! - A `0x00` delimiter
//! - The COBS encoding of `header | payload | crc16`
//! - A closing `0x00` delimiter
//!
//! The header byte carries the channel (low nibble) and the frame kind
//! (high nibble). COBS guarantees the body contains no zero bytes, so the
//! decoder resynchronizes on the next delimiter after any noise and hands the
//! noise back as an [`DecodeEvent::Unrecognized`] event instead of dropping it.

pub mod channel;
pub mod codec;
pub mod decoder;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::ErosCodec;
pub use channel::{
    channel_name, is_valid_channel, ChannelId, LOG, MAX_CHANNEL, TERMINAL, TERMINAL_AUX, TRACE,
};
pub use codec::{
    crc16, decode_body, encode_frame, max_encoded_len, Frame, FrameConfig, FrameKind,
    DEFAULT_MAX_PAYLOAD, DELIMITER,
};
pub use decoder::{DecodeEvent, FrameDecoder};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

use bytes::{BufMut, Bytes, BytesMut};

use crate::channel::{is_valid_channel, ChannelId};
use crate::error::{FrameError, Result};

/// Frame delimiter. COBS guarantees it never appears inside a frame body.
pub const DELIMITER: u8 = 0x00;

/// Header (1) + CRC-16 (2).
pub const OVERHEAD: usize = 3;

/// Default maximum payload size: 4 KiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 4 * 1024;

/// Frame kind, carried in the high nibble of the header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameKind {
    /// Plain data, and commands sent to a device.
    #[default]
    Data,
    /// Positive command response.
    Ack,
    /// Negative command response.
    Nack,
}

impl FrameKind {
    fn nibble(self) -> u8 {
        match self {
            FrameKind::Data => 0,
            FrameKind::Ack => 1,
            FrameKind::Nack => 2,
        }
    }

    fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0 => Some(FrameKind::Data),
            1 => Some(FrameKind::Ack),
            2 => Some(FrameKind::Nack),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FrameKind::Data => "DATA",
            FrameKind::Ack => "ACK",
            FrameKind::Nack => "NACK",
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded message with channel routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The channel this message belongs to.
    pub channel: ChannelId,
    /// Data, ACK or NACK.
    pub kind: FrameKind,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new data frame.
    pub fn new(channel: ChannelId, payload: impl Into<Bytes>) -> Self {
        Self::with_kind(channel, FrameKind::Data, payload)
    }

    /// Create a frame of the given kind.
    pub fn with_kind(channel: ChannelId, kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            kind,
            payload: payload.into(),
        }
    }
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no reflection).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Upper bound of the encoded size of a frame carrying `payload_len` bytes,
/// delimiters included.
pub fn max_encoded_len(payload_len: usize) -> usize {
    cobs::max_encoding_length(payload_len + OVERHEAD) + 2
}

/// Encode a frame into the wire format and return the number of bytes
/// appended to `dst`.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────────────────────────────────────────┬──────┐
/// │ 0x00 │ COBS( header | payload | crc16 LE )          │ 0x00 │
/// └──────┴──────────────────────────────────────────────┴──────┘
/// header = kind << 4 | channel
/// crc16  = CRC-16/CCITT-FALSE over header and payload
/// ```
pub fn encode_frame(
    channel: ChannelId,
    kind: FrameKind,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<usize> {
    if !is_valid_channel(channel) {
        return Err(FrameError::InvalidChannel(channel));
    }

    let mut body = Vec::with_capacity(payload.len() + OVERHEAD);
    body.push(kind.nibble() << 4 | channel);
    body.extend_from_slice(payload);
    let crc = crc16(&body);
    body.extend_from_slice(&crc.to_le_bytes());

    let encoded = cobs::encode_vec(&body);
    let start = dst.len();
    dst.reserve(encoded.len() + 2);
    dst.put_u8(DELIMITER);
    dst.put_slice(&encoded);
    dst.put_u8(DELIMITER);
    Ok(dst.len() - start)
}

/// Decode one frame body: the bytes between two delimiters.
pub fn decode_body(chunk: &[u8], max_payload: usize) -> Result<Frame> {
    let body = cobs::decode_vec(chunk).map_err(|_| FrameError::Cobs)?;
    if body.len() < OVERHEAD {
        return Err(FrameError::TooShort(body.len()));
    }

    let (content, trailer) = body.split_at(body.len() - 2);
    let expected = u16::from_le_bytes([trailer[0], trailer[1]]);
    let computed = crc16(content);
    if expected != computed {
        return Err(FrameError::Checksum { expected, computed });
    }

    let header = content[0];
    let kind = FrameKind::from_nibble(header >> 4).ok_or(FrameError::UnknownKind(header >> 4))?;
    let payload = &content[1..];
    if payload.len() > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: max_payload,
        });
    }

    Ok(Frame {
        channel: header & 0x0F,
        kind,
        payload: Bytes::copy_from_slice(payload),
    })
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 4 KiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(channel: ChannelId, kind: FrameKind, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(channel, kind, payload, &mut buf).unwrap();
        buf
    }

    fn body(wire: &[u8]) -> &[u8] {
        &wire[1..wire.len() - 1]
    }

    #[test]
    fn crc_matches_reference_check_value() {
        assert_eq!(crc16(b"123456789"), 0x29B1);
        assert_eq!(crc16(b""), 0xFFFF);
    }

    #[test]
    fn encoded_frame_is_delimited_and_zero_free() {
        let wire = encode(5, FrameKind::Data, &[0, 1, 0, 0, 2]);
        assert_eq!(wire[0], DELIMITER);
        assert_eq!(wire[wire.len() - 1], DELIMITER);
        assert!(!body(&wire).contains(&DELIMITER));
        assert!(wire.len() <= max_encoded_len(5));
    }

    #[test]
    fn encode_reports_appended_length() {
        let mut buf = BytesMut::from(&b"prefix"[..]);
        let written = encode_frame(1, FrameKind::Data, b"abc", &mut buf).unwrap();
        assert_eq!(buf.len(), 6 + written);
    }

    #[test]
    fn decode_recovers_channel_kind_and_payload() {
        let cases: &[(ChannelId, FrameKind, &[u8])] = &[
            (0, FrameKind::Data, b""),
            (5, FrameKind::Data, b"ping"),
            (15, FrameKind::Ack, b"ok"),
            (6, FrameKind::Nack, b"unknown command"),
            (1, FrameKind::Data, &[0u8; 300]),
        ];
        for (channel, kind, payload) in cases {
            let wire = encode(*channel, *kind, payload);
            let frame = decode_body(body(&wire), DEFAULT_MAX_PAYLOAD).unwrap();
            assert_eq!(frame, Frame::with_kind(*channel, *kind, payload.to_vec()));
        }
    }

    #[test]
    fn rejects_channel_outside_nibble() {
        let mut buf = BytesMut::new();
        let err = encode_frame(16, FrameKind::Data, b"x", &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::InvalidChannel(16)));
        assert!(buf.is_empty());
    }

    #[test]
    fn detects_corrupted_payload() {
        let mut wire = encode(2, FrameKind::Data, b"hello");
        let last = wire.len() - 2;
        wire[last] ^= 0x40;
        if wire[last] == 0 {
            wire[last] = 0x7F;
        }
        let result = decode_body(body(&wire), DEFAULT_MAX_PAYLOAD);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_short_and_unknown_bodies() {
        let short = cobs::encode_vec(&[0x01, 0x02]);
        assert!(matches!(
            decode_body(&short, DEFAULT_MAX_PAYLOAD),
            Err(FrameError::TooShort(2))
        ));

        let mut raw = vec![0x31, b'x'];
        let crc = crc16(&raw);
        raw.extend_from_slice(&crc.to_le_bytes());
        let unknown = cobs::encode_vec(&raw);
        assert!(matches!(
            decode_body(&unknown, DEFAULT_MAX_PAYLOAD),
            Err(FrameError::UnknownKind(3))
        ));
    }

    #[test]
    fn enforces_max_payload_on_decode() {
        let wire = encode(1, FrameKind::Data, &[7u8; 64]);
        let result = decode_body(body(&wire), 32);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge { size: 64, max: 32 })
        ));
    }
}

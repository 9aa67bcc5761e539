//! Streaming decoder that resynchronizes on frame delimiters.

use bytes::{Buf, Bytes, BytesMut};
use tracing::debug;

use crate::codec::{decode_body, max_encoded_len, Frame, DEFAULT_MAX_PAYLOAD, DELIMITER};

/// One decoding result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// A valid frame. `wire_len` counts its encoded bytes plus every idle
    /// delimiter consumed since the previous frame.
    Frame { frame: Frame, wire_len: usize },
    /// Bytes between delimiters that do not form a valid frame.
    Unrecognized(Bytes),
}

impl DecodeEvent {
    /// Bytes of the wire stream this event accounts for.
    pub fn wire_len(&self) -> usize {
        match self {
            DecodeEvent::Frame { wire_len, .. } => *wire_len,
            DecodeEvent::Unrecognized(bytes) => bytes.len(),
        }
    }
}

/// Splits a byte stream on `0x00` and decodes each chunk.
///
/// A corrupt chunk never affects the next one: the following delimiter
/// starts a fresh frame. Every consumed byte ends up in exactly one event,
/// except trailing delimiters not yet followed by a frame.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_payload: usize,
    max_chunk: usize,
    idle: usize,
    scanned: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

impl FrameDecoder {
    pub fn new(max_payload: usize) -> Self {
        Self {
            max_payload,
            max_chunk: max_encoded_len(max_payload),
            idle: 0,
            scanned: 0,
        }
    }

    /// Maximum payload accepted by this decoder.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Decode the next event from `src`, consuming the bytes it covers.
    ///
    /// Returns `None` when `src` holds no complete chunk yet; the partial
    /// chunk stays in `src` for the next call.
    pub fn decode(&mut self, src: &mut BytesMut) -> Option<DecodeEvent> {
        loop {
            let start = self.scanned.min(src.len());
            let found = src[start..]
                .iter()
                .position(|&b| b == DELIMITER)
                .map(|offset| start + offset);

            let Some(pos) = found else {
                if src.len() > self.max_chunk {
                    self.scanned = 0;
                    let chunk = src.split().freeze();
                    debug!(len = chunk.len(), "flushing oversized undelimited bytes");
                    return Some(DecodeEvent::Unrecognized(chunk));
                }
                self.scanned = src.len();
                return None;
            };

            self.scanned = 0;
            if pos == 0 {
                src.advance(1);
                self.idle += 1;
                continue;
            }

            let chunk = src.split_to(pos).freeze();
            src.advance(1);
            return match decode_body(&chunk, self.max_payload) {
                Ok(frame) => {
                    let wire_len = self.idle + chunk.len() + 1;
                    self.idle = 0;
                    Some(DecodeEvent::Frame { frame, wire_len })
                }
                Err(err) => {
                    debug!(len = chunk.len(), error = %err, "unrecognized chunk");
                    // The terminating delimiter is charged to the next frame.
                    self.idle += 1;
                    Some(DecodeEvent::Unrecognized(chunk))
                }
            };
        }
    }

    /// Decode what is left once the stream has ended.
    ///
    /// Like [`FrameDecoder::decode`], except that a trailing partial chunk is
    /// returned as `Unrecognized` instead of being kept for more input.
    pub fn finish(&mut self, src: &mut BytesMut) -> Option<DecodeEvent> {
        if let Some(event) = self.decode(src) {
            return Some(event);
        }
        self.scanned = 0;
        if src.is_empty() {
            return None;
        }
        Some(DecodeEvent::Unrecognized(src.split().freeze()))
    }

    /// Drain everything decodable from `src`.
    pub fn decode_all(&mut self, src: &mut BytesMut) -> Vec<DecodeEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.decode(src) {
            events.push(event);
        }
        events
    }
}

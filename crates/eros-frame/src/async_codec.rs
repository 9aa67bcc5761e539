//! `tokio_util` codec over the same wire format.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, DEFAULT_MAX_PAYLOAD};
use crate::decoder::{DecodeEvent, FrameDecoder};
use crate::error::{FrameError, Result};

/// Codec for `tokio_util::codec::Framed` and friends.
///
/// Decodes to [`DecodeEvent`] so noise reaches the caller, and encodes
/// [`Frame`] values.
#[derive(Debug, Clone)]
pub struct ErosCodec {
    decoder: FrameDecoder,
}

impl ErosCodec {
    pub fn new(max_payload: usize) -> Self {
        Self {
            decoder: FrameDecoder::new(max_payload),
        }
    }
}

impl Default for ErosCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

impl Decoder for ErosCodec {
    type Item = DecodeEvent;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<DecodeEvent>> {
        Ok(self.decoder.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<DecodeEvent>> {
        Ok(self.decoder.finish(src))
    }
}

impl Encoder<Frame> for ErosCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let max = self.decoder.max_payload();
        if frame.payload.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max,
            });
        }
        encode_frame(frame.channel, frame.kind, &frame.payload, dst)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::FrameKind;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(1024);
        let mut sink = FramedWrite::new(client, ErosCodec::default());
        let mut stream = FramedRead::new(server, ErosCodec::default());

        sink.send(Frame::new(5, &b"ping"[..])).await.unwrap();
        sink.send(Frame::with_kind(5, FrameKind::Nack, &b"no"[..]))
            .await
            .unwrap();
        drop(sink);

        let mut frames = Vec::new();
        while let Some(event) = stream.next().await {
            if let DecodeEvent::Frame { frame, .. } = event.unwrap() {
                frames.push(frame);
            }
        }
        assert_eq!(
            frames,
            vec![
                Frame::new(5, &b"ping"[..]),
                Frame::with_kind(5, FrameKind::Nack, &b"no"[..]),
            ]
        );
    }

    #[test]
    fn eof_flushes_unterminated_tail() {
        let mut codec = ErosCodec::default();
        let mut buf = BytesMut::from(&b"\x00tail"[..]);
        let event = codec.decode_eof(&mut buf).unwrap();
        assert_eq!(
            event,
            Some(DecodeEvent::Unrecognized(bytes::Bytes::from_static(b"tail")))
        );
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn encoder_enforces_max_payload() {
        let mut codec = ErosCodec::new(4);
        let mut buf = BytesMut::new();
        let err = codec
            .encode(Frame::new(1, &b"too long"[..]), &mut buf)
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }
}

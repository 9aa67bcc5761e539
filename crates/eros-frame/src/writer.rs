use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use eros_transport::ErosStream;

use crate::channel::ChannelId;
use crate::codec::{encode_frame, Frame, FrameConfig, FrameKind};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<usize> {
        self.send_kind(frame.channel, frame.kind, frame.payload.as_ref())
    }

    /// Encode and send a data payload on a channel.
    pub fn send(&mut self, channel: ChannelId, payload: &[u8]) -> Result<usize> {
        self.send_kind(channel, FrameKind::Data, payload)
    }

    /// Encode and send a frame of the given kind. Returns the encoded length.
    pub fn send_kind(&mut self, channel: ChannelId, kind: FrameKind, payload: &[u8]) -> Result<usize> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        let written = encode_frame(channel, kind, payload, &mut self.buf)?;
        write_fully(&mut self.inner, &self.buf)?;
        self.flush()?;
        Ok(written)
    }

    /// Write already-encoded bytes unchanged.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(bytes);
        write_fully(&mut self.inner, bytes)?;
        self.flush()
    }

    /// The bytes of the most recent write.
    pub fn last_written(&self) -> &[u8] {
        &self.buf
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

// An expired write timeout surfaces as `WouldBlock` or `TimedOut` and is
// returned to the caller like any other I/O error.
fn write_fully<T: Write>(inner: &mut T, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}

impl FrameWriter<ErosStream> {
    /// Create a frame writer for `ErosStream` and apply the write timeout from config.
    pub fn with_config_stream(mut inner: ErosStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::decoder::{DecodeEvent, FrameDecoder};

    fn decode(bytes: &[u8]) -> Vec<Frame> {
        let mut wire = BytesMut::from(bytes);
        FrameDecoder::default()
            .decode_all(&mut wire)
            .into_iter()
            .filter_map(|event| match event {
                DecodeEvent::Frame { frame, .. } => Some(frame),
                DecodeEvent::Unrecognized(_) => None,
            })
            .collect()
    }

    #[test]
    fn write_multiple_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(1, b"one").unwrap();
        writer
            .write_frame(&Frame::with_kind(5, FrameKind::Ack, &b"done"[..]))
            .unwrap();

        let frames = decode(writer.into_inner().get_ref());
        assert_eq!(
            frames,
            vec![
                Frame::new(1, &b"one"[..]),
                Frame::with_kind(5, FrameKind::Ack, &b"done"[..]),
            ]
        );
    }

    #[test]
    fn send_returns_encoded_length_and_keeps_last_write() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let written = writer.send(5, b"ping").unwrap();

        assert_eq!(writer.last_written().len(), written);
        let wire = writer.get_ref().get_ref().clone();
        assert_eq!(wire.as_slice(), writer.last_written());
    }

    #[test]
    fn rejects_oversized_payload() {
        let config = FrameConfig {
            max_payload_size: 8,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), config);

        let err = writer.send(1, &[1u8; 9]).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 8 }));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn write_raw_passes_bytes_through() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_raw(b"\x00raw\x00").unwrap();
        assert_eq!(writer.get_ref().get_ref().as_slice(), b"\x00raw\x00");
    }

    #[test]
    fn zero_length_write_means_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(1, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn interrupted_write_retries() {
        let mut writer = FrameWriter::new(InterruptOnce {
            interrupted: false,
            written: Vec::new(),
        });
        writer.send(3, b"retry").unwrap();
        assert_eq!(decode(&writer.get_ref().written), vec![Frame::new(3, &b"retry"[..])]);
    }

    #[test]
    fn stalled_write_returns_io_error() {
        let mut writer = FrameWriter::new(StalledWriter {
            accepted: 0,
            attempts: 0,
        });
        let err = writer.send(1, &[0xAB; 64]).unwrap_err();
        match err {
            FrameError::Io(err) => assert_eq!(err.kind(), ErrorKind::WouldBlock),
            other => panic!("expected io error, got {other:?}"),
        }
        // One partial write, then a single stalled attempt.
        assert_eq!(writer.get_ref().attempts, 2);
        assert_eq!(writer.get_ref().accepted, 8);
    }

    /// Accepts eight bytes, then reports an expired write timeout.
    struct StalledWriter {
        accepted: usize,
        attempts: usize,
    }

    impl Write for StalledWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.attempts += 1;
            if self.accepted == 0 {
                self.accepted = buf.len().min(8);
                return Ok(self.accepted);
            }
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct InterruptOnce {
        interrupted: bool,
        written: Vec<u8>,
    }

    impl Write for InterruptOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}

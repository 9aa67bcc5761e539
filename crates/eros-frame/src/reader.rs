use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use eros_transport::{ErosStream, TransportError};

use crate::codec::{Frame, FrameConfig};
use crate::decoder::{DecodeEvent, FrameDecoder};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads decode events from any `Read` stream.
///
/// Handles partial reads internally: callers always get whole frames or
/// whole unrecognized chunks. Bytes of an incomplete frame survive a read
/// error, so a timed-out read can simply be retried.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    decoder: FrameDecoder,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            decoder: FrameDecoder::new(config.max_payload_size),
            config,
        }
    }

    /// Read the next frame or unrecognized chunk (blocking).
    ///
    /// Bytes still buffered at EOF come back as one `Unrecognized` event,
    /// then `Err(FrameError::ConnectionClosed)` is returned. Read errors,
    /// including expired timeouts, are `Err(FrameError::Io(_))`.
    pub fn read_event(&mut self) -> Result<DecodeEvent> {
        loop {
            if let Some(event) = self.decoder.decode(&mut self.buf) {
                return Ok(event);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                // A partial chunk left at EOF is reported before the close.
                if let Some(event) = self.decoder.finish(&mut self.buf) {
                    return Ok(event);
                }
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read the next valid frame, skipping unrecognized bytes.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let DecodeEvent::Frame { frame, .. } = self.read_event()? {
                return Ok(frame);
            }
        }
    }

    /// Bytes buffered but not yet decoded.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<ErosStream> {
    /// Create a frame reader for `ErosStream` and apply the read timeout from config.
    pub fn with_config_stream(mut inner: ErosStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) => FrameError::Io(io),
        TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
            FrameError::Io(source)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eros_client::{ErosConfig, ReconnectPolicy};
use eros_transport::{ErosStream, LoopbackTransport, Transport, TransportError};

pub const WAIT: Duration = Duration::from_secs(3);
pub const BACKOFF: Duration = Duration::from_millis(20);

/// Config with a short fixed backoff so reconnect tests run fast.
pub fn fast_config() -> ErosConfig {
    ErosConfig::default().with_reconnect_policy(ReconnectPolicy::fixed(BACKOFF))
}

/// Refuses the first `failures` connects, then behaves like `inner`.
pub struct FlakyTransport {
    inner: LoopbackTransport,
    failures: usize,
    attempts: Arc<AtomicUsize>,
}

impl FlakyTransport {
    pub fn new(inner: LoopbackTransport, failures: usize) -> (Self, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                failures,
                attempts: Arc::clone(&attempts),
            },
            attempts,
        )
    }
}

impl Transport for FlakyTransport {
    fn connect(&mut self) -> eros_transport::Result<ErosStream> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(TransportError::Connect {
                target: self.describe(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }
        self.inner.connect()
    }

    fn describe(&self) -> String {
        "flaky-loopback".to_string()
    }
}

/// Encode one data frame.
pub fn encoded(channel: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = bytes::BytesMut::new();
    eros_frame::encode_frame(channel, eros_frame::FrameKind::Data, payload, &mut buf)
        .expect("frame should encode");
    buf.to_vec()
}

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::ErosStream;
use crate::tcp::connect_tcp;
use crate::transport::Transport;

/// Client side of a pub/sub bridge exposed by another eros host.
///
/// The bridge publishes traffic on `port` and accepts injected traffic on
/// `port + 1`. This transport subscribes to the first and sends to the second,
/// so it behaves like any other bidirectional stream. The bridge is not
/// authenticated and is meant for loopback use.
#[derive(Debug, Clone)]
pub struct PubSubTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl PubSubTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: crate::tcp::TcpTransport::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the connect timeout. Both sockets share one deadline.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Port the bridge publishes on.
    pub fn publish_port(&self) -> u16 {
        self.port
    }

    /// Port the bridge subscribes on, or `None` when `port + 1` overflows.
    pub fn subscribe_port(&self) -> Option<u16> {
        self.port.checked_add(1)
    }
}

impl Transport for PubSubTransport {
    fn connect(&mut self) -> Result<ErosStream> {
        let subscribe_port = self.subscribe_port().ok_or_else(|| TransportError::Resolve {
            target: format!("{}:{}+1", self.host, self.port),
        })?;
        let deadline = Instant::now() + self.connect_timeout;
        let reader = connect_tcp(&self.host, self.port, deadline)?;
        let writer = connect_tcp(&self.host, subscribe_port, deadline)?;
        debug!(
            publish = self.port,
            subscribe = subscribe_port,
            "pub/sub bridge connected"
        );
        Ok(ErosStream::from_split(reader, writer))
    }

    fn describe(&self) -> String {
        format!("pubsub://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    use super::*;

    /// Find two adjacent free ports on loopback.
    fn adjacent_listeners() -> (TcpListener, TcpListener) {
        for _ in 0..32 {
            let first = TcpListener::bind("127.0.0.1:0").unwrap();
            let port = first.local_addr().unwrap().port();
            let Some(next) = port.checked_add(1) else {
                continue;
            };
            if let Ok(second) = TcpListener::bind(("127.0.0.1", next)) {
                return (first, second);
            }
        }
        panic!("no adjacent free ports");
    }

    #[test]
    fn reads_from_publish_and_writes_to_subscribe() {
        let (publish, subscribe) = adjacent_listeners();
        let port = publish.local_addr().unwrap().port();

        let bridge = std::thread::spawn(move || {
            let (mut out, _) = publish.accept().unwrap();
            let (mut inbound, _) = subscribe.accept().unwrap();
            out.write_all(b"published").unwrap();
            let mut buf = [0u8; 8];
            inbound.read_exact(&mut buf).unwrap();
            buf
        });

        let mut stream = PubSubTransport::new("127.0.0.1", port).connect().unwrap();
        assert_eq!(stream.kind(), "pubsub");
        stream.write_all(b"injected").unwrap();

        let mut buf = [0u8; 9];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"published");
        assert_eq!(&bridge.join().unwrap(), b"injected");
    }

    #[test]
    fn missing_subscribe_side_fails_within_one_deadline() {
        let (publish, subscribe) = adjacent_listeners();
        let port = publish.local_addr().unwrap().port();
        drop(subscribe);

        let timeout = Duration::from_millis(300);
        let started = Instant::now();
        let err = PubSubTransport::new("127.0.0.1", port)
            .with_connect_timeout(timeout)
            .connect()
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(started.elapsed() < timeout * 2);
    }

    #[test]
    fn overflowing_port_is_rejected() {
        let mut transport = PubSubTransport::new("127.0.0.1", u16::MAX);
        assert!(transport.subscribe_port().is_none());
        assert!(matches!(
            transport.connect(),
            Err(TransportError::Resolve { .. })
        ));
    }
}

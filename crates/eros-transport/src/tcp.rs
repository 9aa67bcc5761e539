use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::ErosStream;
use crate::transport::Transport;

/// TCP client transport.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Default time allowed for one connect attempt, across every resolved
    /// address. `Eros::close` may wait this long for an attempt in flight.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Resolve `host:port` and return every candidate address.
pub(crate) fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let target = format!("{host}:{port}");
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Connect {
            target: target.clone(),
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::Resolve { target });
    }
    Ok(addrs)
}

/// Try each resolved address in turn until `deadline`, keeping the last
/// failure.
pub(crate) fn connect_tcp(host: &str, port: u16, deadline: Instant) -> Result<TcpStream> {
    let target = format!("{host}:{port}");
    let mut last_err = None;
    for addr in resolve(host, port)? {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            last_err = Some(std::io::Error::from(ErrorKind::TimedOut));
            break;
        }
        match TcpStream::connect_timeout(&addr, remaining) {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                debug!(%addr, "tcp connected");
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    match last_err {
        Some(source) => Err(TransportError::Connect { target, source }),
        None => Err(TransportError::Resolve { target }),
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> Result<ErosStream> {
        let deadline = Instant::now() + self.connect_timeout;
        let stream = connect_tcp(&self.host, self.port, deadline)?;
        Ok(ErosStream::from_tcp(stream))
    }

    fn describe(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn connects_and_exchanges_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            conn.read_exact(&mut buf).unwrap();
            conn.write_all(&buf).unwrap();
        });

        let mut transport = TcpTransport::new("127.0.0.1", port);
        let mut stream = transport.connect().unwrap();
        assert_eq!(stream.kind(), "tcp");
        stream.write_all(b"hello").unwrap();

        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        server.join().unwrap();
    }

    #[test]
    fn refused_connect_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut transport = TcpTransport::new("127.0.0.1", port)
            .with_connect_timeout(Duration::from_millis(200));
        let err = transport.connect().unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[test]
    fn expired_deadline_fails_without_dialing() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let err = connect_tcp("127.0.0.1", port, Instant::now()).unwrap_err();
        match err {
            TransportError::Connect { source, .. } => {
                assert_eq!(source.kind(), ErrorKind::TimedOut);
            }
            other => panic!("expected connect error, got {other:?}"),
        }
        listener.set_nonblocking(true).unwrap();
        assert!(listener.accept().is_err());
    }

    #[test]
    fn default_connect_timeout_stays_short() {
        let transport = TcpTransport::new("127.0.0.1", 7000);
        assert_eq!(transport.connect_timeout, Duration::from_millis(500));
        let transport = transport.with_connect_timeout(Duration::from_millis(50));
        assert_eq!(transport.connect_timeout, Duration::from_millis(50));
    }

    #[test]
    fn describe_includes_endpoint() {
        let transport = TcpTransport::new("localhost", 7000);
        assert_eq!(transport.describe(), "tcp://localhost:7000");
    }
}

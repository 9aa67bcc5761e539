use std::net::{SocketAddr, UdpSocket};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::ErosStream;
use crate::tcp::resolve;
use crate::transport::Transport;

/// UDP transport.
///
/// UDP has no handshake: a successful connect means a local socket was bound
/// and the remote address fixed as its default peer. Every datagram is fed to
/// the frame decoder like a chunk of a byte stream.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    host: String,
    port: u16,
    local: Option<SocketAddr>,
}

impl UdpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            local: None,
        }
    }

    /// Bind to a fixed local address instead of an ephemeral port.
    pub fn with_local_addr(mut self, local: SocketAddr) -> Self {
        self.local = Some(local);
        self
    }
}

impl Transport for UdpTransport {
    fn connect(&mut self) -> Result<ErosStream> {
        let target = format!("{}:{}", self.host, self.port);
        let remote = resolve(&self.host, self.port)?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Resolve {
                target: target.clone(),
            })?;

        let local = self.local.unwrap_or_else(|| {
            if remote.is_ipv4() {
                SocketAddr::from(([0, 0, 0, 0], 0))
            } else {
                SocketAddr::from(([0u16; 8], 0))
            }
        });
        let socket = UdpSocket::bind(local).map_err(|source| TransportError::Bind {
            addr: local.to_string(),
            source,
        })?;
        socket
            .connect(remote)
            .map_err(|source| TransportError::Connect { target, source })?;

        debug!(%local, %remote, "udp socket bound");
        Ok(ErosStream::from_udp(socket))
    }

    fn describe(&self) -> String {
        format!("udp://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::time::Duration;

    use super::*;

    #[test]
    fn datagrams_flow_both_ways() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = peer.local_addr().unwrap().port();

        let mut transport = UdpTransport::new("127.0.0.1", port);
        let mut stream = transport.connect().unwrap();
        stream.write_all(b"ping").unwrap();

        let mut buf = [0u8; 16];
        let (n, from) = peer.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");

        peer.send_to(b"pong", from).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"pong");
    }

    #[test]
    fn idle_socket_times_out_instead_of_eof() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = peer.local_addr().unwrap().port();

        let mut stream = UdpTransport::new("127.0.0.1", port).connect().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let mut buf = [0u8; 4];
        let err = stream.read(&mut buf).unwrap_err();
        assert!(crate::stream::is_timeout(&err));
    }
}

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, UdpSocket};
use std::time::Duration;

use crate::error::Result;
use crate::loopback::LoopbackEnd;

/// Serial ports have no "block forever" setting; this stands in for `None`.
const SERIAL_BLOCKING_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// A connected transport stream implementing Read + Write.
///
/// This is the fundamental I/O type returned by [`crate::Transport::connect`].
/// Reads honor the configured read timeout and report an expired timeout as
/// `WouldBlock`/`TimedOut` (see [`is_timeout`]); `Ok(0)` always means the peer
/// closed the connection.
pub struct ErosStream {
    inner: ErosStreamInner,
}

enum ErosStreamInner {
    Tcp(TcpStream),
    Udp(UdpSocket),
    Serial(Box<dyn serialport::SerialPort>),
    /// Pub/sub client: inbound traffic on one socket, outbound on another.
    Split {
        reader: TcpStream,
        writer: TcpStream,
    },
    Loopback(LoopbackEnd),
}

/// Returns true if the error only reports an expired read/write timeout.
pub fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

impl Read for ErosStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ErosStreamInner::Tcp(stream) => stream.read(buf),
            ErosStreamInner::Udp(socket) => match socket.recv(buf) {
                // An empty datagram carries nothing and must not read as EOF.
                Ok(0) => Err(std::io::Error::from(ErrorKind::WouldBlock)),
                Ok(n) => Ok(n),
                // ICMP port-unreachable from a peer that is not up yet.
                Err(err) if err.kind() == ErrorKind::ConnectionRefused => {
                    Err(std::io::Error::from(ErrorKind::WouldBlock))
                }
                Err(err) => Err(err),
            },
            ErosStreamInner::Serial(port) => port.read(buf),
            ErosStreamInner::Split { reader, .. } => reader.read(buf),
            ErosStreamInner::Loopback(end) => end.read(buf),
        }
    }
}

impl Write for ErosStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ErosStreamInner::Tcp(stream) => stream.write(buf),
            ErosStreamInner::Udp(socket) => socket.send(buf),
            ErosStreamInner::Serial(port) => port.write(buf),
            ErosStreamInner::Split { writer, .. } => writer.write(buf),
            ErosStreamInner::Loopback(end) => end.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            ErosStreamInner::Tcp(stream) => stream.flush(),
            ErosStreamInner::Udp(_) => Ok(()),
            ErosStreamInner::Serial(port) => port.flush(),
            ErosStreamInner::Split { writer, .. } => writer.flush(),
            ErosStreamInner::Loopback(end) => end.flush(),
        }
    }
}

impl ErosStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: ErosStreamInner::Tcp(stream),
        }
    }

    pub(crate) fn from_udp(socket: UdpSocket) -> Self {
        Self {
            inner: ErosStreamInner::Udp(socket),
        }
    }

    pub(crate) fn from_serial(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: ErosStreamInner::Serial(port),
        }
    }

    pub(crate) fn from_split(reader: TcpStream, writer: TcpStream) -> Self {
        Self {
            inner: ErosStreamInner::Split { reader, writer },
        }
    }

    /// Wrap one end of an in-memory loopback pipe.
    pub fn loopback(end: LoopbackEnd) -> Self {
        Self {
            inner: ErosStreamInner::Loopback(end),
        }
    }

    /// Short name of the underlying transport kind.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            ErosStreamInner::Tcp(_) => "tcp",
            ErosStreamInner::Udp(_) => "udp",
            ErosStreamInner::Serial(_) => "serial",
            ErosStreamInner::Split { .. } => "pubsub",
            ErosStreamInner::Loopback(_) => "loopback",
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            ErosStreamInner::Tcp(stream) => stream.set_read_timeout(timeout)?,
            ErosStreamInner::Udp(socket) => socket.set_read_timeout(timeout)?,
            ErosStreamInner::Serial(port) => port
                .set_timeout(timeout.unwrap_or(SERIAL_BLOCKING_TIMEOUT))
                .map_err(std::io::Error::from)?,
            ErosStreamInner::Split { reader, .. } => reader.set_read_timeout(timeout)?,
            ErosStreamInner::Loopback(end) => end.set_read_timeout(timeout),
        }
        Ok(())
    }

    /// Set write timeout on the underlying stream.
    ///
    /// Serial ports share one timeout for both directions and loopback writes
    /// never block, so this is a no-op for them.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            ErosStreamInner::Tcp(stream) => stream.set_write_timeout(timeout)?,
            ErosStreamInner::Udp(socket) => socket.set_write_timeout(timeout)?,
            ErosStreamInner::Split { writer, .. } => writer.set_write_timeout(timeout)?,
            ErosStreamInner::Serial(_) | ErosStreamInner::Loopback(_) => {}
        }
        Ok(())
    }

    /// Try to clone this stream (creates a new OS handle).
    ///
    /// Used to split one connection into a reader half owned by the receive
    /// loop and a writer half shared by transmitters.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            ErosStreamInner::Tcp(stream) => ErosStreamInner::Tcp(stream.try_clone()?),
            ErosStreamInner::Udp(socket) => ErosStreamInner::Udp(socket.try_clone()?),
            ErosStreamInner::Serial(port) => {
                ErosStreamInner::Serial(port.try_clone().map_err(std::io::Error::from)?)
            }
            ErosStreamInner::Split { reader, writer } => ErosStreamInner::Split {
                reader: reader.try_clone()?,
                writer: writer.try_clone()?,
            },
            ErosStreamInner::Loopback(end) => ErosStreamInner::Loopback(end.clone()),
        };
        Ok(Self { inner })
    }

    /// Shut the connection down in both directions.
    ///
    /// Errors are ignored: the peer may already be gone.
    pub fn shutdown(&self) {
        match &self.inner {
            ErosStreamInner::Tcp(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
            }
            ErosStreamInner::Split { reader, writer } => {
                let _ = reader.shutdown(Shutdown::Both);
                let _ = writer.shutdown(Shutdown::Both);
            }
            ErosStreamInner::Loopback(end) => end.close(),
            ErosStreamInner::Udp(_) | ErosStreamInner::Serial(_) => {}
        }
    }
}

impl std::fmt::Debug for ErosStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErosStream")
            .field("type", &self.kind())
            .finish()
    }
}

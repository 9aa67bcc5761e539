//! Byte transports for the eros packet protocol.
//!
//! Provides a unified interface over the endpoints a device can be reached on:
//! - Serial ports (USB CDC / UART bridges)
//! - TCP client sockets
//! - UDP sockets (connectionless; "connected" means bound with a default peer)
//! - Pub/sub bridge sockets exposed by another eros host
//! - In-memory loopback pipes (tests and demos)
//!
//! This is the lowest layer of eros. Everything else builds on top of the
//! [`Transport`] trait and the [`ErosStream`] it produces.

pub mod error;
pub mod loopback;
pub mod pubsub;
pub mod serial;
pub mod stream;
pub mod tcp;
pub mod transport;
pub mod udp;

pub use error::{Result, TransportError};
pub use loopback::{LoopbackEnd, LoopbackTransport};
pub use pubsub::PubSubTransport;
pub use serial::{known_vendor, list_serial_ports, SerialDevice, SerialTransport, UsbInfo};
pub use stream::{is_timeout, ErosStream};
pub use tcp::TcpTransport;
pub use transport::Transport;
pub use udp::UdpTransport;

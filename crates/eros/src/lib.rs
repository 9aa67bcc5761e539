//! Framed multi-channel packet links.
//!
//! eros carries small packets on up to 16 channels over one byte link to a
//! device: a serial port, a TCP or UDP socket, or a pub/sub bridge shared
//! with other local processes.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte transports (serial, TCP, UDP, pub/sub, loopback)
//! - [`frame`]: COBS framing with channel multiplexing and CRC checks
//! - [`client`]: Reconnecting client, channel router, command correlation (behind `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use eros_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use eros_frame::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use eros_client::*;
}

#[cfg(feature = "client")]
pub use eros_client::{Eros, ErosConfig, TransportState};

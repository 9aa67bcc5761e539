use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Connectivity of the link behind a client.
///
/// Each connection attempt moves `Connecting -> Connected -> Dead` or
/// `Connecting -> Dead`. With auto-reconnect enabled `Dead` is followed by a
/// fresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportState {
    Connecting,
    Connected,
    Dead,
}

impl TransportState {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportState::Connecting => "CONNECTING",
            TransportState::Connected => "CONNECTED",
            TransportState::Dead => "DEAD",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            TransportState::Connecting => 0,
            TransportState::Connected => 1,
            TransportState::Dead => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => TransportState::Connecting,
            1 => TransportState::Connected,
            _ => TransportState::Dead,
        }
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: TransportState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub(crate) fn get(&self) -> TransportState {
        TransportState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Store `state` and return the previous one.
    pub(crate) fn swap(&self, state: TransportState) -> TransportState {
        TransportState::from_u8(self.0.swap(state.to_u8(), Ordering::SeqCst))
    }
}

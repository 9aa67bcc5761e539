//! Callback interfaces.
//!
//! Each is a single-method trait with a blanket impl for closures, so a
//! handler is either a closure or a type of the caller's own.

use eros_frame::Frame;

use crate::state::TransportState;

/// Receives decoded frames of one channel.
pub trait FrameHandler: Send + Sync {
    fn on_frame(&self, frame: &Frame);
}

impl<F> FrameHandler for F
where
    F: Fn(&Frame) + Send + Sync,
{
    fn on_frame(&self, frame: &Frame) {
        self(frame)
    }
}

/// Receives raw byte sequences: unrecognized input or encoded output.
pub trait BytesHandler: Send + Sync {
    fn on_bytes(&self, bytes: &[u8]);
}

impl<F> BytesHandler for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn on_bytes(&self, bytes: &[u8]) {
        self(bytes)
    }
}

/// Receives link state changes.
pub trait StateHandler: Send + Sync {
    fn on_state(&self, state: TransportState);
}

impl<F> StateHandler for F
where
    F: Fn(TransportState) + Send + Sync,
{
    fn on_state(&self, state: TransportState) {
        self(state)
    }
}

//! Queue between the link thread and a consumer polling at its own pace.

use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use eros_frame::Frame;
use tracing::warn;

use crate::handler::{BytesHandler, FrameHandler};

/// A crossbeam-backed queue whose sending side is used as a handler.
///
/// Handlers push and return immediately; the consumer drains on its own
/// schedule, e.g. once per UI frame. A bounded inbox drops new items when
/// full instead of stalling the link thread.
#[derive(Debug, Clone)]
pub struct Inbox<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T: Send + 'static> Default for Inbox<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T: Send + 'static> Inbox<T> {
    pub fn unbounded() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx }
    }

    /// Sending side, for handlers that build their own items.
    pub fn sender(&self) -> Sender<T> {
        self.tx.clone()
    }

    /// Push without blocking. Returns false if the item was dropped.
    pub fn push(&self, item: T) -> bool {
        push(&self.tx, item)
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now.
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

fn push<T>(tx: &Sender<T>, item: T) -> bool {
    match tx.try_send(item) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("inbox full, dropping item");
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

impl Inbox<Frame> {
    /// Handler queueing whole frames.
    pub fn frame_handler(&self) -> impl FrameHandler {
        let tx = self.tx.clone();
        move |frame: &Frame| {
            push(&tx, frame.clone());
        }
    }
}

impl Inbox<Bytes> {
    /// Handler queueing frame payloads.
    pub fn payload_handler(&self) -> impl FrameHandler {
        let tx = self.tx.clone();
        move |frame: &Frame| {
            push(&tx, frame.payload.clone());
        }
    }

    /// Handler queueing raw byte sequences (fail or raw callbacks).
    pub fn bytes_handler(&self) -> impl BytesHandler {
        let tx = self.tx.clone();
        move |bytes: &[u8]| {
            push(&tx, Bytes::copy_from_slice(bytes));
        }
    }

    /// Everything queued right now, concatenated into one buffer.
    pub fn drain_concat(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in self.rx.try_iter() {
            out.extend_from_slice(&chunk);
        }
        out
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use eros_frame::{ChannelId, DecodeEvent};
use tracing::{debug, trace};

use crate::analytics::Analytics;
use crate::handler::{BytesHandler, FrameHandler, StateHandler};
use crate::state::TransportState;
use crate::sync::{lock, read, write};

/// Handler registry plus traffic counters.
///
/// Handlers are cloned out of the registry before they run, so a callback
/// may attach or detach handlers (its own included) without deadlocking.
/// Delivery of decoded events is serialized: no two frame or fail callbacks
/// run at the same time.
#[derive(Default)]
pub(crate) struct Router {
    channels: RwLock<HashMap<ChannelId, Arc<dyn FrameHandler>>>,
    fail: RwLock<Option<Arc<dyn BytesHandler>>>,
    raw: RwLock<Option<Arc<dyn BytesHandler>>>,
    state: RwLock<Option<Arc<dyn StateHandler>>>,
    delivery: Mutex<()>,
    pub(crate) analytics: Analytics,
}

impl Router {
    /// Register the handler for a channel, replacing any previous one.
    pub(crate) fn attach_channel(&self, channel: ChannelId, handler: Arc<dyn FrameHandler>) {
        if write(&self.channels).insert(channel, handler).is_some() {
            debug!(channel, "replaced channel handler");
        }
    }

    pub(crate) fn detach_channel(&self, channel: ChannelId) -> bool {
        write(&self.channels).remove(&channel).is_some()
    }

    /// Install `handler` and hand back the one it displaced.
    pub(crate) fn swap_channel(
        &self,
        channel: ChannelId,
        handler: Arc<dyn FrameHandler>,
    ) -> Option<Arc<dyn FrameHandler>> {
        write(&self.channels).insert(channel, handler)
    }

    /// Undo [`Router::swap_channel`], unless `installed` has been replaced
    /// since.
    pub(crate) fn restore_channel(
        &self,
        channel: ChannelId,
        installed: &Arc<dyn FrameHandler>,
        previous: Option<Arc<dyn FrameHandler>>,
    ) {
        let mut channels = write(&self.channels);
        let unchanged = channels
            .get(&channel)
            .is_some_and(|current| Arc::ptr_eq(current, installed));
        if !unchanged {
            debug!(channel, "channel handler changed meanwhile, not restoring");
            return;
        }
        match previous {
            Some(previous) => channels.insert(channel, previous),
            None => channels.remove(&channel),
        };
    }

    pub(crate) fn set_fail(&self, handler: Option<Arc<dyn BytesHandler>>) {
        *write(&self.fail) = handler;
    }

    pub(crate) fn set_raw(&self, handler: Option<Arc<dyn BytesHandler>>) {
        *write(&self.raw) = handler;
    }

    pub(crate) fn set_state(&self, handler: Option<Arc<dyn StateHandler>>) {
        *write(&self.state) = handler;
    }

    /// Count and deliver one decode event.
    pub(crate) fn dispatch(&self, event: DecodeEvent) {
        let _delivery = lock(&self.delivery);
        match event {
            DecodeEvent::Frame { frame, wire_len } => {
                self.analytics.record_rx(frame.channel, wire_len);
                let handler = read(&self.channels).get(&frame.channel).cloned();
                match handler {
                    Some(handler) => handler.on_frame(&frame),
                    None => trace!(channel = frame.channel, "no handler for channel"),
                }
            }
            DecodeEvent::Unrecognized(bytes) => {
                self.analytics.record_unrecognized(bytes.len());
                let handler = read(&self.fail).clone();
                match handler {
                    Some(handler) => handler.on_bytes(&bytes),
                    None => debug!(len = bytes.len(), "unrecognized bytes without fail handler"),
                }
            }
        }
    }

    /// Hand encoded outbound bytes to the raw handler.
    pub(crate) fn emit_raw(&self, bytes: &[u8]) {
        let handler = read(&self.raw).clone();
        if let Some(handler) = handler {
            handler.on_bytes(bytes);
        }
    }

    pub(crate) fn emit_state(&self, state: TransportState) {
        let handler = read(&self.state).clone();
        if let Some(handler) = handler {
            handler.on_state(state);
        }
    }
}

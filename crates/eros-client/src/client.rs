use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use eros_frame::{is_valid_channel, ChannelId, DecodeEvent, FrameError, FrameKind};
use eros_transport::{PubSubTransport, SerialTransport, TcpTransport, Transport, UdpTransport};
use tracing::{debug, info, warn};

use crate::analytics::{AnalyticsSnapshot, TrafficSummary};
use crate::config::ErosConfig;
use crate::error::{ErosError, Result};
use crate::handler::{BytesHandler, FrameHandler, StateHandler};
use crate::link::{supervise, Shared};
use crate::router::Router;
use crate::state::TransportState;
use crate::sync::lock;

/// Host a pub/sub client connects to when only a port is given.
pub const DEFAULT_PUBSUB_HOST: &str = "127.0.0.1";

/// A multi-channel connection to one eros device.
///
/// Owns its transport and a background link thread that connects, decodes
/// incoming frames, dispatches them to channel handlers, and reconnects after
/// failures. Handlers run on that thread and should hand work off quickly
/// (see [`crate::Inbox`]).
///
/// Share a client between consumers with `Arc<Eros>`. Dropping the last
/// handle closes it.
pub struct Eros {
    shared: Arc<Shared>,
    target: String,
    shutdown: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Eros {
    /// Start a client on any transport.
    ///
    /// Returns as soon as the link thread is running; connection progress is
    /// visible through [`Eros::get_state`] and the state handler.
    pub fn new<T: Transport>(transport: T, config: ErosConfig) -> Result<Self> {
        let target = transport.describe();
        let shared = Arc::new(Shared::new(config));
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

        let worker = thread::Builder::new().name("eros-link".to_string()).spawn({
            let shared = Arc::clone(&shared);
            move || supervise(transport, shared, shutdown_rx)
        })?;
        info!(target = %target, "eros client started");

        Ok(Self {
            shared,
            target,
            shutdown: Mutex::new(Some(shutdown_tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Serial device at `baud`.
    pub fn serial(path: impl Into<String>, baud: u32, auto_reconnect: bool) -> Result<Self> {
        Self::new(
            SerialTransport::new(path, baud),
            ErosConfig::default().with_auto_reconnect(auto_reconnect),
        )
    }

    /// TCP client.
    pub fn tcp(host: impl Into<String>, port: u16, auto_reconnect: bool) -> Result<Self> {
        Self::new(
            TcpTransport::new(host, port),
            ErosConfig::default().with_auto_reconnect(auto_reconnect),
        )
    }

    /// UDP peer.
    pub fn udp(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::new(UdpTransport::new(host, port), ErosConfig::default())
    }

    /// Client of a pub/sub bridge on the local host (`port` and `port + 1`).
    pub fn pubsub(port: u16) -> Result<Self> {
        Self::new(
            PubSubTransport::new(DEFAULT_PUBSUB_HOST, port),
            ErosConfig::default(),
        )
    }

    /// Description of the transport, e.g. `tcp://127.0.0.1:2000`.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn config(&self) -> &ErosConfig {
        &self.shared.config
    }

    /// Register the handler for a channel. A later registration replaces an
    /// earlier one.
    pub fn attach_channel_callback(
        &self,
        channel: ChannelId,
        handler: impl FrameHandler + 'static,
    ) -> Result<()> {
        if !is_valid_channel(channel) {
            return Err(ErosError::InvalidChannel(channel));
        }
        self.shared.router.attach_channel(channel, Arc::new(handler));
        Ok(())
    }

    /// Remove the handler for a channel. Returns whether one was registered.
    pub fn detach_channel_callback(&self, channel: ChannelId) -> bool {
        self.shared.router.detach_channel(channel)
    }

    /// Register the handler for bytes that do not decode as a frame.
    pub fn attach_fail_callback(&self, handler: impl BytesHandler + 'static) {
        self.shared.router.set_fail(Some(Arc::new(handler)));
    }

    pub fn detach_fail_callback(&self) {
        self.shared.router.set_fail(None);
    }

    /// Register the handler receiving every encoded outbound byte sequence.
    ///
    /// The handler runs while the link writer is held, in wire order. It
    /// must not transmit on this client.
    pub fn attach_raw_callback(&self, handler: impl BytesHandler + 'static) {
        self.shared.router.set_raw(Some(Arc::new(handler)));
    }

    pub fn detach_raw_callback(&self) {
        self.shared.router.set_raw(None);
    }

    /// Register the handler for link state changes.
    pub fn attach_state_callback(&self, handler: impl StateHandler + 'static) {
        self.shared.router.set_state(Some(Arc::new(handler)));
    }

    pub fn detach_state_callback(&self) {
        self.shared.router.set_state(None);
    }

    /// Send a data frame.
    ///
    /// Only an invalid channel or an oversized payload is an error. Without a
    /// live link, or after [`Eros::close`], the packet is dropped; a failed
    /// write takes the link down and leaves recovery to the reconnector.
    pub fn transmit_packet(&self, channel: ChannelId, data: &[u8]) -> Result<()> {
        self.transmit_response(channel, FrameKind::Data, data)
    }

    /// Send a frame of any kind. Used to play the device side of a command
    /// channel.
    pub fn transmit_response(&self, channel: ChannelId, kind: FrameKind, data: &[u8]) -> Result<()> {
        if !is_valid_channel(channel) {
            return Err(ErosError::InvalidChannel(channel));
        }
        let max = self.shared.config.max_payload_size;
        if data.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: data.len(),
                max,
            }
            .into());
        }
        if self.shared.is_closed() {
            debug!(channel, "transmit on closed client ignored");
            return Ok(());
        }

        self.shared.write(Some(channel), |writer| {
            writer.send_kind(channel, kind, data).map(|_| ())
        });
        Ok(())
    }

    /// Write already-encoded bytes to the link unchanged.
    ///
    /// The bytes reach the raw handler but are not attributed to a channel
    /// in the analytics.
    pub fn transmit_raw(&self, bytes: &[u8]) {
        if self.shared.is_closed() {
            return;
        }
        self.shared.write(None, |writer| writer.write_raw(bytes));
    }

    /// Feed bytes into the receive path as if the device had sent them.
    ///
    /// Injected bytes have their own decoder, so a partial frame here never
    /// mixes with link traffic. Must not be called from a frame or fail
    /// handler.
    pub fn inject_received(&self, bytes: &[u8]) {
        if self.shared.is_closed() {
            return;
        }
        self.shared.inject(bytes);
    }

    pub(crate) fn router(&self) -> &Router {
        &self.shared.router
    }

    /// Route an event decoded outside the link, such as by a bridge
    /// connection with its own decoder.
    pub(crate) fn dispatch_received(&self, event: DecodeEvent) {
        if self.shared.is_closed() {
            return;
        }
        self.shared.router.dispatch(event);
    }

    pub fn get_state(&self) -> TransportState {
        self.shared.state()
    }

    /// Poll until the link reaches `state`. Returns false on timeout.
    pub fn wait_for_state(&self, state: TransportState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.get_state() == state {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Connection attempts made so far.
    pub fn connect_attempts(&self) -> u64 {
        self.shared.attempts()
    }

    /// Per-channel counters; key `-1` holds unrecognized bytes.
    pub fn analytics(&self) -> AnalyticsSnapshot {
        self.shared.router.analytics.snapshot()
    }

    pub fn traffic_summary(&self) -> TrafficSummary {
        self.shared.router.analytics.summary()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Stop the link thread and release the transport.
    ///
    /// Returns once the link thread has exited, unless called from a handler
    /// running on that thread. That takes at most one read timeout, or the
    /// transport's connect timeout when a connect attempt is in flight. Later
    /// calls are no-ops.
    pub fn close(&self) {
        if !self.shared.mark_closed() {
            return;
        }
        drop(lock(&self.shutdown).take());
        self.shared.release();

        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                debug!("close called from link thread, not joining");
            } else if worker.join().is_err() {
                warn!("link thread panicked");
            }
        }

        self.shared.publish_state(TransportState::Dead);
        info!(target = %self.target, "eros client closed");
    }
}

impl Drop for Eros {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Eros {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Eros")
            .field("target", &self.target)
            .field("state", &self.get_state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

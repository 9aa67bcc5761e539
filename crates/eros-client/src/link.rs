//! Link supervision: connect, receive, back off, repeat.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use eros_frame::{ChannelId, FrameConfig, FrameDecoder, FrameError, FrameReader, FrameWriter};
use eros_transport::{is_timeout, ErosStream, Transport};
use tracing::{debug, info, warn};

use crate::config::ErosConfig;
use crate::error::{ErosError, Result};
use crate::router::Router;
use crate::state::{StateCell, TransportState};
use crate::sync::lock;

/// State shared between the client handle and its link thread.
pub(crate) struct Shared {
    pub(crate) router: Router,
    pub(crate) config: ErosConfig,
    state: StateCell,
    attempts: AtomicU64,
    closed: AtomicBool,
    broken: AtomicBool,
    stream: Mutex<Option<ErosStream>>,
    writer: Mutex<Option<FrameWriter<ErosStream>>>,
    inbound: Mutex<Inbound>,
}

struct Inbound {
    decoder: FrameDecoder,
    buf: BytesMut,
}

impl Shared {
    pub(crate) fn new(config: ErosConfig) -> Self {
        Self {
            router: Router::default(),
            state: StateCell::new(TransportState::Connecting),
            attempts: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            broken: AtomicBool::new(false),
            stream: Mutex::new(None),
            writer: Mutex::new(None),
            inbound: Mutex::new(Inbound {
                decoder: FrameDecoder::new(config.max_payload_size),
                buf: BytesMut::new(),
            }),
            config,
        }
    }

    pub(crate) fn state(&self) -> TransportState {
        self.state.get()
    }

    pub(crate) fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns false if the client was already closed.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    /// Store a new state and notify the state handler if it changed.
    pub(crate) fn publish_state(&self, state: TransportState) {
        let previous = self.state.swap(state);
        if previous != state {
            debug!(from = %previous, to = %state, "link state changed");
            self.router.emit_state(state);
        }
    }

    fn install(&self, stream: ErosStream) -> Result<FrameReader<ErosStream>> {
        let frame_config = FrameConfig {
            max_payload_size: self.config.max_payload_size,
            read_timeout: Some(self.config.effective_read_timeout()),
            write_timeout: self.config.write_timeout,
        };
        let reader = FrameReader::with_config_stream(stream.try_clone()?, frame_config.clone())?;
        let writer = FrameWriter::with_config_stream(stream.try_clone()?, frame_config)?;

        let mut slot = lock(&self.stream);
        if self.is_closed() {
            stream.shutdown();
            return Err(ErosError::Closed);
        }
        self.broken.store(false, Ordering::SeqCst);
        *lock(&self.writer) = Some(writer);
        *slot = Some(stream);
        Ok(reader)
    }

    /// Shut the current stream down, then drop the writer.
    ///
    /// The shutdown comes first so a write stalled on a full socket returns
    /// and gives up the writer lock.
    pub(crate) fn release(&self) {
        if let Some(stream) = lock(&self.stream).take() {
            stream.shutdown();
        }
        *lock(&self.writer) = None;
    }

    fn link_failed(&self, err: &FrameError) {
        warn!(error = %err, "write failed, dropping link");
        self.broken.store(true, Ordering::SeqCst);
        if let Some(stream) = lock(&self.stream).as_ref() {
            stream.shutdown();
        }
        self.publish_state(TransportState::Dead);
    }

    /// Run a write against the current link.
    ///
    /// On success the written bytes are counted against `channel` and handed
    /// to the raw handler before the writer lock is released, so the raw
    /// mirror sees frames in wire order. Returns false when there is no link
    /// or the write failed. A failed write takes the link down.
    pub(crate) fn write<F>(&self, channel: Option<ChannelId>, op: F) -> bool
    where
        F: FnOnce(&mut FrameWriter<ErosStream>) -> eros_frame::Result<()>,
    {
        let mut guard = lock(&self.writer);
        let Some(writer) = guard.as_mut() else {
            debug!("no link, dropping outbound bytes");
            return false;
        };
        match op(writer) {
            Ok(()) => {
                let written = writer.last_written();
                if let Some(channel) = channel {
                    self.router.analytics.record_tx(channel, written.len());
                }
                self.router.emit_raw(written);
                true
            }
            Err(err) => {
                *guard = None;
                drop(guard);
                self.link_failed(&err);
                false
            }
        }
    }

    /// Decode bytes as if they had been read from the link.
    pub(crate) fn inject(&self, bytes: &[u8]) {
        let mut guard = lock(&self.inbound);
        let inbound = &mut *guard;
        inbound.buf.extend_from_slice(bytes);
        while let Some(event) = inbound.decoder.decode(&mut inbound.buf) {
            self.router.dispatch(event);
        }
    }
}

/// Body of the link thread. Returns once the client is closed, or after the
/// first lost link when auto-reconnect is off.
pub(crate) fn supervise<T: Transport>(mut transport: T, shared: Arc<Shared>, shutdown: Receiver<()>) {
    let target = transport.describe();
    let mut failures: u32 = 0;

    while !shared.is_closed() {
        shared.publish_state(TransportState::Connecting);
        let attempt = shared.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let connected = transport
            .connect()
            .map_err(ErosError::from)
            .and_then(|stream| shared.install(stream));
        match connected {
            Ok(mut reader) => {
                failures = 0;
                info!(target = %target, attempt, "link connected");
                shared.publish_state(TransportState::Connected);
                receive(&shared, &mut reader);
                shared.release();
                info!(target = %target, "link down");
            }
            Err(ErosError::Closed) => break,
            Err(err) => {
                failures = failures.saturating_add(1);
                warn!(target = %target, attempt, error = %err, "connect failed");
            }
        }
        shared.publish_state(TransportState::Dead);

        if shared.is_closed() || !shared.config.auto_reconnect {
            break;
        }
        let delay = shared.config.reconnect.delay(failures);
        debug!(?delay, "waiting before reconnect");
        match shutdown.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    shared.publish_state(TransportState::Dead);
    debug!(target = %target, "link thread exiting");
}

fn receive(shared: &Shared, reader: &mut FrameReader<ErosStream>) {
    loop {
        if shared.is_closed() || shared.broken.load(Ordering::SeqCst) {
            return;
        }
        match reader.read_event() {
            Ok(event) => shared.router.dispatch(event),
            Err(FrameError::Io(err)) if is_timeout(&err) => {}
            Err(FrameError::ConnectionClosed) => {
                info!("peer closed the link");
                return;
            }
            Err(err) => {
                if !shared.is_closed() {
                    warn!(error = %err, "link read failed");
                }
                return;
            }
        }
    }
}

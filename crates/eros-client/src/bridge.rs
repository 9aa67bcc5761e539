//! Pub/sub bridge: shares one client's link with other local processes.
//!
//! Binds two loopback TCP ports. Every encoded frame the client sends is
//! published to all connections on `port`; bytes written by connections on
//! `port + 1` enter the client, decoded per connection so partial frames from
//! different writers never mix. A [`eros_transport::PubSubTransport`] on the
//! same port is the matching client. Connections are not authenticated.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::BytesMut;
use eros_frame::{max_encoded_len, FrameDecoder, DELIMITER};
use tracing::{debug, info, warn};

use crate::client::Eros;
use crate::error::{ErosError, Result};
use crate::sync::lock;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const SUBSCRIBER_READ_TIMEOUT: Duration = Duration::from_millis(100);
/// A publish connection that cannot take a frame within this long is dropped.
const PUBLISH_WRITE_TIMEOUT: Duration = Duration::from_millis(200);

/// Where bytes from subscribe-port connections go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InboundRoute {
    /// Into the client's receive path, as if the device had sent them.
    #[default]
    Receive,
    /// Out to the device unchanged; the bytes must already be encoded frames.
    Transmit,
}

impl std::str::FromStr for InboundRoute {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "receive" => Ok(InboundRoute::Receive),
            "transmit" => Ok(InboundRoute::Transmit),
            other => Err(format!("unknown inbound route '{other}' (expected receive|transmit)")),
        }
    }
}

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Bind address. Default: `127.0.0.1`.
    pub host: String,
    /// Publish port; the subscribe port is `port + 1`. Default: 2000.
    pub port: u16,
    pub inbound: InboundRoute,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2000,
            inbound: InboundRoute::Receive,
        }
    }
}

type Publishers = Arc<Mutex<Vec<TcpStream>>>;

/// A running bridge. Stops on [`PubSubBridge::close`] or drop.
pub struct PubSubBridge {
    eros: Arc<Eros>,
    publish_addr: SocketAddr,
    subscribe_addr: SocketAddr,
    running: Arc<AtomicBool>,
    publishers: Publishers,
    threads: Vec<JoinHandle<()>>,
}

impl PubSubBridge {
    /// Bind both ports and start forwarding. Takes over the client's raw
    /// handler.
    pub fn bind(eros: Arc<Eros>, config: BridgeConfig) -> Result<Self> {
        let subscribe_port = config.port.checked_add(1).ok_or_else(|| ErosError::Bind {
            addr: format!("{}:{}", config.host, config.port),
            source: std::io::Error::new(ErrorKind::InvalidInput, "no room for subscribe port"),
        })?;
        let publish = bind_listener(&config.host, config.port)?;
        let subscribe = bind_listener(&config.host, subscribe_port)?;
        let publish_addr = publish.local_addr()?;
        let subscribe_addr = subscribe.local_addr()?;

        let running = Arc::new(AtomicBool::new(true));
        let publishers: Publishers = Arc::new(Mutex::new(Vec::new()));

        {
            let publishers = Arc::clone(&publishers);
            eros.attach_raw_callback(move |bytes: &[u8]| publish_to(&publishers, bytes));
        }

        let mut threads = Vec::with_capacity(2);
        threads.push(thread::Builder::new().name("eros-bridge-pub".to_string()).spawn({
            let running = Arc::clone(&running);
            let publishers = Arc::clone(&publishers);
            move || accept_publishers(publish, running, publishers)
        })?);
        threads.push(thread::Builder::new().name("eros-bridge-sub".to_string()).spawn({
            let running = Arc::clone(&running);
            let eros = Arc::clone(&eros);
            let inbound = config.inbound;
            move || accept_subscribers(subscribe, running, eros, inbound)
        })?);

        info!(
            publish = %publish_addr,
            subscribe = %subscribe_addr,
            inbound = ?config.inbound,
            "pub/sub bridge listening"
        );
        Ok(Self {
            eros,
            publish_addr,
            subscribe_addr,
            running,
            publishers,
            threads,
        })
    }

    /// Address publishing outbound frames.
    pub fn publish_addr(&self) -> SocketAddr {
        self.publish_addr
    }

    /// Address accepting inbound bytes.
    pub fn subscribe_addr(&self) -> SocketAddr {
        self.subscribe_addr
    }

    /// Connected publish-port clients.
    pub fn publisher_count(&self) -> usize {
        lock(&self.publishers).len()
    }

    /// Stop forwarding, disconnect everyone and release both ports.
    pub fn close(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.eros.detach_raw_callback();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("bridge thread panicked");
            }
        }
        for stream in lock(&self.publishers).drain(..) {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        info!("pub/sub bridge closed");
    }
}

impl Drop for PubSubBridge {
    fn drop(&mut self) {
        self.close();
    }
}

fn bind_listener(host: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).map_err(|source| ErosError::Bind {
        addr: addr.clone(),
        source,
    })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ErosError::Bind { addr, source })?;
    Ok(listener)
}

fn publish_to(publishers: &Publishers, bytes: &[u8]) {
    let mut publishers = lock(publishers);
    publishers.retain_mut(|stream| match stream.write_all(bytes) {
        Ok(()) => true,
        Err(err) => {
            debug!(error = %err, "dropping publish connection");
            false
        }
    });
}

fn accept_publishers(listener: TcpListener, running: Arc<AtomicBool>, publishers: Publishers) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(err) = prepare(&stream, None, Some(PUBLISH_WRITE_TIMEOUT)) {
                    warn!(%peer, error = %err, "rejecting publish connection");
                    continue;
                }
                debug!(%peer, "publish connection accepted");
                lock(&publishers).push(stream);
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL_INTERVAL),
            Err(err) => {
                warn!(error = %err, "publish accept failed");
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}

fn accept_subscribers(
    listener: TcpListener,
    running: Arc<AtomicBool>,
    eros: Arc<Eros>,
    inbound: InboundRoute,
) {
    let mut readers: Vec<JoinHandle<()>> = Vec::new();
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(err) = prepare(&stream, Some(SUBSCRIBER_READ_TIMEOUT), None) {
                    warn!(%peer, error = %err, "rejecting subscribe connection");
                    continue;
                }
                debug!(%peer, "subscribe connection accepted");
                let running = Arc::clone(&running);
                let eros = Arc::clone(&eros);
                let spawned = thread::Builder::new()
                    .name("eros-bridge-reader".to_string())
                    .spawn(move || forward_inbound(stream, running, eros, inbound));
                match spawned {
                    Ok(handle) => readers.push(handle),
                    Err(err) => warn!(error = %err, "failed to start subscriber reader"),
                }
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL_INTERVAL),
            Err(err) => {
                warn!(error = %err, "subscribe accept failed");
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
        readers.retain(|handle| !handle.is_finished());
    }
    for handle in readers {
        let _ = handle.join();
    }
}

fn prepare(
    stream: &TcpStream,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(read_timeout)?;
    stream.set_write_timeout(write_timeout)
}

fn forward_inbound(
    mut stream: TcpStream,
    running: Arc<AtomicBool>,
    eros: Arc<Eros>,
    inbound: InboundRoute,
) {
    let max_payload = eros.config().max_payload_size;
    let mut decoder = FrameDecoder::new(max_payload);
    let mut pending = BytesMut::new();
    let mut buf = [0u8; 4096];
    while running.load(Ordering::SeqCst) {
        match stream.read(&mut buf) {
            Ok(0) => {
                if inbound == InboundRoute::Receive {
                    while let Some(event) = decoder.finish(&mut pending) {
                        eros.dispatch_received(event);
                    }
                } else if !pending.is_empty() {
                    debug!(len = pending.len(), "dropping unterminated subscriber bytes");
                }
                break;
            }
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                match inbound {
                    InboundRoute::Receive => {
                        while let Some(event) = decoder.decode(&mut pending) {
                            eros.dispatch_received(event);
                        }
                    }
                    InboundRoute::Transmit => {
                        if let Some(complete) = take_delimited(&mut pending) {
                            eros.transmit_raw(&complete);
                        }
                        if pending.len() > max_encoded_len(max_payload) {
                            warn!(
                                len = pending.len(),
                                "dropping oversized undelimited subscriber bytes"
                            );
                            pending.clear();
                        }
                    }
                }
            }
            Err(err) if eros_transport::is_timeout(&err) => {}
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => {
                debug!(error = %err, "subscribe connection failed");
                break;
            }
        }
    }
}

/// Split off the leading part of `pending` that ends on a frame boundary.
///
/// An unfinished frame stays behind together with its opening delimiter.
fn take_delimited(pending: &mut BytesMut) -> Option<BytesMut> {
    let last = pending.iter().rposition(|&b| b == DELIMITER)?;
    if last + 1 == pending.len() {
        return Some(pending.split());
    }
    if last == 0 {
        return None;
    }
    if pending[last - 1] == DELIMITER {
        return Some(pending.split_to(last));
    }
    Some(pending.split_to(last + 1))
}

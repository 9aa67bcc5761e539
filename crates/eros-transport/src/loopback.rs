//! In-memory loopback pipes.
//!
//! [`LoopbackEnd::echo`] reads back everything written to it, which stands in
//! for a device that mirrors its input. [`LoopbackEnd::pair`] crosses two ends
//! so that two facades can talk to each other without sockets.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::ErosStream;
use crate::transport::Transport;

#[derive(Debug, Default)]
struct Pipe {
    queue: Mutex<VecDeque<u8>>,
    ready: Condvar,
    closed: AtomicBool,
}

impl Pipe {
    fn push(&self, data: &[u8]) -> std::io::Result<usize> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(std::io::Error::from(ErrorKind::BrokenPipe));
        }
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.extend(data.iter().copied());
        self.ready.notify_all();
        Ok(data.len())
    }

    fn pop(&self, buf: &mut [u8], timeout: Option<Duration>) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if !queue.is_empty() {
                let n = buf.len().min(queue.len());
                for (slot, byte) in buf.iter_mut().zip(queue.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if self.closed.load(Ordering::SeqCst) {
                return Ok(0);
            }
            queue = match deadline {
                None => self
                    .ready
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(std::io::Error::from(ErrorKind::WouldBlock));
                    }
                    self.ready
                        .wait_timeout(queue, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _guard = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        self.ready.notify_all();
    }

    fn reopen(&self) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.clear();
        self.closed.store(false, Ordering::SeqCst);
    }
}

/// One end of an in-memory pipe. Clones share the same pipe.
#[derive(Debug, Clone)]
pub struct LoopbackEnd {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    read_timeout: Option<Duration>,
}

impl LoopbackEnd {
    /// An end that reads back what is written to it.
    pub fn echo() -> Self {
        let pipe = Arc::new(Pipe::default());
        Self {
            rx: Arc::clone(&pipe),
            tx: pipe,
            read_timeout: None,
        }
    }

    /// Two crossed ends: writes on one are read on the other.
    pub fn pair() -> (Self, Self) {
        let a_to_b = Arc::new(Pipe::default());
        let b_to_a = Arc::new(Pipe::default());
        let a = Self {
            rx: Arc::clone(&b_to_a),
            tx: Arc::clone(&a_to_b),
            read_timeout: None,
        };
        let b = Self {
            rx: a_to_b,
            tx: b_to_a,
            read_timeout: None,
        };
        (a, b)
    }

    /// Queue bytes for this end to read, as if the remote side had sent them.
    pub fn inject(&self, data: &[u8]) -> std::io::Result<usize> {
        self.rx.push(data)
    }

    /// Close both directions. Pending bytes stay readable, then reads
    /// return EOF and writes fail with `BrokenPipe`.
    pub fn close(&self) {
        self.rx.close();
        self.tx.close();
    }

    /// Reset a closed pipe so it can be connected again.
    pub fn reopen(&self) {
        self.rx.reopen();
        self.tx.reopen();
    }

    /// Whether the read side has been closed.
    pub fn is_closed(&self) -> bool {
        self.rx.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    pub(crate) fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.rx.pop(buf, self.read_timeout)
    }

    pub(crate) fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.tx.push(buf)
    }

    pub(crate) fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Transport over a [`LoopbackEnd`]; every connect hands out a clone of it.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    end: LoopbackEnd,
}

impl LoopbackTransport {
    pub fn new(end: LoopbackEnd) -> Self {
        Self { end }
    }

    /// Loopback transport that echoes everything written to it.
    pub fn echo() -> Self {
        Self::new(LoopbackEnd::echo())
    }

    /// The pipe end handed out on connect.
    pub fn end(&self) -> &LoopbackEnd {
        &self.end
    }
}

impl Transport for LoopbackTransport {
    fn connect(&mut self) -> Result<ErosStream> {
        if self.end.is_closed() {
            return Err(TransportError::Connect {
                target: self.describe(),
                source: std::io::Error::from(ErrorKind::ConnectionRefused),
            });
        }
        debug!("connected loopback pipe");
        Ok(ErosStream::loopback(self.end.clone()))
    }

    fn describe(&self) -> String {
        "loopback".to_string()
    }
}

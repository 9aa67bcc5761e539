//! Command/response exchange over one channel.
//!
//! A command is an ordinary data frame. Whatever arrives on the same channel
//! is taken as the response, in arrival order. There are no request ids: with
//! several commands in flight the responses cannot be told apart, so callers
//! that need certainty keep at most one command outstanding per channel.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use eros_frame::{is_valid_channel, ChannelId, Frame, FrameKind};
use serde::Serialize;
use tracing::debug;

use crate::client::Eros;
use crate::error::{ErosError, Result};
use crate::handler::FrameHandler;

/// How the device answered a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseType {
    /// Success, optionally with a payload.
    Ack,
    /// Failure, optionally with an error message.
    Nack,
    /// Untagged output on the command channel.
    Data,
}

impl From<FrameKind> for ResponseType {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Ack => ResponseType::Ack,
            FrameKind::Nack => ResponseType::Nack,
            FrameKind::Data => ResponseType::Data,
        }
    }
}

/// A response received on a command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    pub resp_type: ResponseType,
    pub data: Bytes,
}

impl CommandFrame {
    pub fn is_ack(&self) -> bool {
        self.resp_type == ResponseType::Ack
    }

    pub fn is_nack(&self) -> bool {
        self.resp_type == ResponseType::Nack
    }
}

impl From<&Frame> for CommandFrame {
    fn from(frame: &Frame) -> Self {
        Self {
            resp_type: frame.kind.into(),
            data: frame.payload.clone(),
        }
    }
}

/// A channel turned into a command/response exchange.
///
/// Holds the channel handler for as long as it lives; dropping it detaches.
pub struct CommandChannel {
    eros: Arc<Eros>,
    channel: ChannelId,
}

impl CommandChannel {
    /// Take over `channel`; every frame arriving on it is passed to
    /// `on_response` as a [`CommandFrame`].
    pub fn attach<F>(eros: Arc<Eros>, channel: ChannelId, on_response: F) -> Result<Self>
    where
        F: Fn(CommandFrame) + Send + Sync + 'static,
    {
        eros.attach_channel_callback(channel, move |frame: &Frame| {
            on_response(CommandFrame::from(frame))
        })?;
        debug!(channel, "command channel attached");
        Ok(Self { eros, channel })
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Send a command.
    pub fn send(&self, command: &[u8]) -> Result<()> {
        self.eros.transmit_packet(self.channel, command)
    }

    /// Release the channel.
    pub fn detach(self) {}
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.eros.detach_channel_callback(self.channel);
    }
}

/// Send `command` and block until the next frame on `channel`.
///
/// While waiting, frames on `channel` go to the request instead of any
/// handler already attached there; that handler is put back before
/// returning. Subject to the same ambiguity as [`CommandChannel`]: the first
/// frame to arrive is taken as the answer.
pub fn request(eros: &Eros, channel: ChannelId, command: &[u8], timeout: Duration) -> Result<CommandFrame> {
    if !is_valid_channel(channel) {
        return Err(ErosError::InvalidChannel(channel));
    }
    let (tx, rx) = crossbeam_channel::bounded(1);
    let waiter: Arc<dyn FrameHandler> = Arc::new(move |frame: &Frame| {
        let _ = tx.try_send(CommandFrame::from(frame));
    });
    let previous = eros.router().swap_channel(channel, Arc::clone(&waiter));

    let result = eros
        .transmit_packet(channel, command)
        .and_then(|()| rx.recv_timeout(timeout).map_err(|_| ErosError::Timeout(timeout)));
    eros.router().restore_channel(channel, &waiter, previous);
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use eros_transport::{LoopbackEnd, LoopbackTransport};

    use super::*;
    use crate::config::ErosConfig;
    use crate::state::TransportState;

    const WAIT: Duration = Duration::from_secs(2);

    /// Host and device clients joined by a crossed loopback pipe.
    fn host_and_device() -> (Arc<Eros>, Arc<Eros>) {
        let (a, b) = LoopbackEnd::pair();
        let host = Eros::new(LoopbackTransport::new(a), ErosConfig::default()).unwrap();
        let device = Eros::new(LoopbackTransport::new(b), ErosConfig::default()).unwrap();
        assert!(host.wait_for_state(TransportState::Connected, WAIT));
        assert!(device.wait_for_state(TransportState::Connected, WAIT));
        (Arc::new(host), Arc::new(device))
    }

    fn ack_everything(device: &Arc<Eros>, channel: ChannelId) {
        let responder = Arc::downgrade(device);
        device
            .attach_channel_callback(channel, move |frame: &Frame| {
                if let Some(device) = responder.upgrade() {
                    let kind = if frame.payload.starts_with(b"bad") {
                        FrameKind::Nack
                    } else {
                        FrameKind::Ack
                    };
                    let _ = device.transmit_response(channel, kind, &frame.payload);
                }
            })
            .unwrap();
    }

    #[test]
    fn responses_are_tagged_and_delivered_in_order() {
        let (host, device) = host_and_device();
        ack_everything(&device, 5);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = crossbeam_channel::unbounded();
        let commands = {
            let seen = Arc::clone(&seen);
            CommandChannel::attach(Arc::clone(&host), 5, move |response| {
                seen.lock().unwrap().push(response);
                let _ = tx.send(());
            })
            .unwrap()
        };

        commands.send(b"status").unwrap();
        rx.recv_timeout(WAIT).unwrap();
        commands.send(b"bad-command").unwrap();
        rx.recv_timeout(WAIT).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_ack());
        assert_eq!(seen[0].data.as_ref(), b"status");
        assert!(seen[1].is_nack());
    }

    #[test]
    fn blocking_request_returns_response() {
        let (host, device) = host_and_device();
        ack_everything(&device, 5);

        let response = request(&host, 5, b"reboot", WAIT).unwrap();
        assert_eq!(response.resp_type, ResponseType::Ack);
        assert_eq!(response.data.as_ref(), b"reboot");
    }

    #[test]
    fn request_times_out_without_responder() {
        let (host, _device) = host_and_device();
        let err = request(&host, 9, b"hello?", Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, ErosError::Timeout(_)));
        assert!(!host.detach_channel_callback(9));
    }

    #[test]
    fn request_hands_channel_back_to_existing_handler() {
        let (host, device) = host_and_device();
        ack_everything(&device, 5);
        let (tx, rx) = crossbeam_channel::unbounded();
        host.attach_channel_callback(5, move |frame: &Frame| {
            let _ = tx.send(frame.payload.clone());
        })
        .unwrap();

        let response = request(&host, 5, b"version", WAIT).unwrap();
        assert!(response.is_ack());
        assert!(rx.try_recv().is_err());

        device.transmit_packet(5, b"unsolicited").unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap().as_ref(), b"unsolicited");
    }

    #[test]
    fn request_rejects_invalid_channel() {
        let (host, _device) = host_and_device();
        let err = request(&host, 16, b"x", WAIT).unwrap_err();
        assert!(matches!(err, ErosError::InvalidChannel(16)));
    }

    #[test]
    fn dropping_command_channel_detaches() {
        let (host, _device) = host_and_device();
        let commands = CommandChannel::attach(Arc::clone(&host), 5, |_| {}).unwrap();
        commands.detach();
        assert!(!host.detach_channel_callback(5));
    }
}

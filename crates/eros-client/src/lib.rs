//! Multi-channel client for eros devices.
//!
//! [`Eros`] owns one transport and keeps it alive in the background:
//! connecting, decoding frames, dispatching them to per-channel handlers and
//! reconnecting after failures. On top of that sit the command/response
//! [`correlator`], the consumer-side [`Inbox`] queue and the pub/sub
//! [`bridge`] that shares a link with other local processes.

pub mod analytics;
pub mod bridge;
pub mod client;
pub mod config;
pub mod correlator;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod inbox;
mod link;
mod router;
pub mod state;
mod sync;
pub mod text;

pub use analytics::{AnalyticsGroup, AnalyticsSnapshot, ChannelTraffic, TrafficSummary, UNRECOGNIZED};
pub use bridge::{BridgeConfig, InboundRoute, PubSubBridge};
pub use client::{Eros, DEFAULT_PUBSUB_HOST};
pub use config::{ErosConfig, ReconnectPolicy, MAX_READ_TIMEOUT};
pub use correlator::{request, CommandChannel, CommandFrame, ResponseType};
pub use endpoint::Endpoint;
pub use error::{ErosError, Result};
pub use handler::{BytesHandler, FrameHandler, StateHandler};
pub use inbox::Inbox;
pub use state::TransportState;
pub use text::sanitize;

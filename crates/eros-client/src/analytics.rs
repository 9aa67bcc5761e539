//! Per-channel traffic counters.

use std::collections::BTreeMap;
use std::sync::Mutex;

use eros_frame::ChannelId;
use serde::Serialize;

use crate::sync::lock;

/// Analytics key for bytes that did not decode as a frame.
pub const UNRECOGNIZED: i16 = -1;

/// Byte and packet counters for one direction of one channel.
///
/// Counters only grow for the lifetime of the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsGroup {
    bytes: u64,
    packets: u64,
}

impl AnalyticsGroup {
    /// Total bytes on the wire, delimiters included.
    pub fn get_total(&self) -> u64 {
        self.bytes
    }

    /// Number of frames (or unrecognized chunks).
    pub fn packets(&self) -> u64 {
        self.packets
    }

    fn record(&mut self, bytes: usize) {
        self.bytes = self.bytes.saturating_add(bytes as u64);
        self.packets = self.packets.saturating_add(1);
    }
}

/// Transmit and receive counters of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelTraffic {
    pub tx: AnalyticsGroup,
    pub rx: AnalyticsGroup,
}

/// Totals as shown by a connection overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficSummary {
    /// Bytes written, all channels.
    pub outgoing: u64,
    /// Bytes of decoded frames, all channels.
    pub incoming: u64,
    /// Bytes that failed to decode.
    pub unrecognized: u64,
}

/// Snapshot of all counters, keyed by channel (`-1` = unrecognized).
pub type AnalyticsSnapshot = BTreeMap<i16, ChannelTraffic>;

#[derive(Debug, Default)]
pub(crate) struct Analytics {
    channels: Mutex<AnalyticsSnapshot>,
}

impl Analytics {
    pub(crate) fn record_tx(&self, channel: ChannelId, bytes: usize) {
        lock(&self.channels)
            .entry(i16::from(channel))
            .or_default()
            .tx
            .record(bytes);
    }

    pub(crate) fn record_rx(&self, channel: ChannelId, bytes: usize) {
        lock(&self.channels)
            .entry(i16::from(channel))
            .or_default()
            .rx
            .record(bytes);
    }

    pub(crate) fn record_unrecognized(&self, bytes: usize) {
        lock(&self.channels)
            .entry(UNRECOGNIZED)
            .or_default()
            .rx
            .record(bytes);
    }

    pub(crate) fn snapshot(&self) -> AnalyticsSnapshot {
        lock(&self.channels).clone()
    }

    pub(crate) fn summary(&self) -> TrafficSummary {
        let channels = lock(&self.channels);
        let mut summary = TrafficSummary::default();
        for (id, traffic) in channels.iter() {
            if *id == UNRECOGNIZED {
                summary.unrecognized += traffic.rx.get_total();
            } else {
                summary.outgoing += traffic.tx.get_total();
                summary.incoming += traffic.rx.get_total();
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_bytes_and_packets_per_direction() {
        let analytics = Analytics::default();
        analytics.record_tx(5, 10);
        analytics.record_tx(5, 12);
        analytics.record_rx(5, 10);
        analytics.record_unrecognized(4);

        let snapshot = analytics.snapshot();
        let ch5 = snapshot[&5];
        assert_eq!(ch5.tx.get_total(), 22);
        assert_eq!(ch5.tx.packets(), 2);
        assert_eq!(ch5.rx.get_total(), 10);
        assert_eq!(snapshot[&UNRECOGNIZED].rx.get_total(), 4);
        assert_eq!(snapshot[&UNRECOGNIZED].tx, AnalyticsGroup::default());
    }

    #[test]
    fn summary_separates_unrecognized_bytes() {
        let analytics = Analytics::default();
        analytics.record_tx(1, 7);
        analytics.record_tx(2, 3);
        analytics.record_rx(2, 9);
        analytics.record_unrecognized(5);

        assert_eq!(
            analytics.summary(),
            TrafficSummary {
                outgoing: 10,
                incoming: 9,
                unrecognized: 5,
            }
        );
    }
}

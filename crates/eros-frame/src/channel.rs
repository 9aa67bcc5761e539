//! Channel ids.
//!
//! A channel is a 4-bit id multiplexed over one transport. None are reserved
//! by the protocol; the constants below are the conventional assignments
//! used by eros firmware and tooling.

/// Channel id type.
pub type ChannelId = u8;

/// Highest valid channel id.
pub const MAX_CHANNEL: ChannelId = 15;

/// Log output.
pub const LOG: ChannelId = 1;

/// Terminal command/response.
pub const TERMINAL: ChannelId = 5;

/// Terminal auxiliary output (stdout of running commands).
pub const TERMINAL_AUX: ChannelId = 6;

/// Trace/plot data.
pub const TRACE: ChannelId = 10;

/// Returns a human-readable name for a channel id.
pub fn channel_name(id: ChannelId) -> &'static str {
    match id {
        LOG => "LOG",
        TERMINAL => "TERMINAL",
        TERMINAL_AUX => "TERMINAL_AUX",
        TRACE => "TRACE",
        0..=MAX_CHANNEL => "USER",
        _ => "INVALID",
    }
}

/// Returns true if the id fits in a frame header.
pub fn is_valid_channel(id: ChannelId) -> bool {
    id <= MAX_CHANNEL
}

use std::time::Duration;

use eros_frame::DEFAULT_MAX_PAYLOAD;

/// Longest read timeout the receive loop uses; bounds how long `close()` waits.
pub const MAX_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Exponential backoff between connection attempts.
///
/// The delay after the n-th consecutive failure is
/// `initial_delay * multiplier^(n-1)`, capped at `max_delay`. A successful
/// connect resets the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            multiplier: 2,
        }
    }
}

impl ReconnectPolicy {
    /// Constant delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1,
        }
    }

    /// Delay to wait after `failures` consecutive failed attempts.
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(failures.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Client behavior configuration.
#[derive(Debug, Clone)]
pub struct ErosConfig {
    /// Retry after connect failures and lost links. Default: true.
    pub auto_reconnect: bool,
    /// Backoff between attempts.
    pub reconnect: ReconnectPolicy,
    /// Receive loop read timeout, clamped to [`MAX_READ_TIMEOUT`]. Default: 100 ms.
    pub read_timeout: Duration,
    /// Write timeout, where the transport supports one. Default: 1 s.
    pub write_timeout: Option<Duration>,
    /// Largest payload accepted in either direction. Default: 4 KiB.
    pub max_payload_size: usize,
}

impl Default for ErosConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect: ReconnectPolicy::default(),
            read_timeout: Duration::from_millis(100),
            write_timeout: Some(Duration::from_secs(1)),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ErosConfig {
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_max_payload_size(mut self, max: usize) -> Self {
        self.max_payload_size = max;
        self
    }

    /// Read timeout actually applied to the link.
    pub fn effective_read_timeout(&self) -> Duration {
        self.read_timeout
            .clamp(Duration::from_millis(1), MAX_READ_TIMEOUT)
    }
}

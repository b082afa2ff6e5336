//! Hub tuning knobs.

use std::time::Duration;

/// Capacity of each connection's outbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// How long a broadcast waits for a full queue before evicting.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle time after which a keepalive comment is written.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Period of the health sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Inactivity after which a connection counts as stale.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

/// Period of the connection count report.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration shared by the hub and the stream loops built on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Capacity of each connection's outbound queue.
    pub queue_capacity: usize,
    /// Per-connection send timeout during a broadcast.
    pub send_timeout: Duration,
    /// Keepalive period of an idle stream.
    pub keepalive_interval: Duration,
    /// Health sweep period.
    pub sweep_interval: Duration,
    /// Staleness threshold used by the health sweep.
    pub stale_after: Duration,
    /// Period of the debug report of connection counts.
    pub report_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
            report_interval: DEFAULT_REPORT_INTERVAL,
        }
    }
}

impl HubConfig {
    /// Set the outbound queue capacity (at least 1).
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the broadcast send timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the keepalive period.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set the health sweep period.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the staleness threshold.
    pub fn with_stale_after(mut self, threshold: Duration) -> Self {
        self.stale_after = threshold;
        self
    }

    /// Set the report period.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }
}

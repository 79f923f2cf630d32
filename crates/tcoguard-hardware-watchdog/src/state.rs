//! Watchdog lifecycle status and feed metrics.

use std::time::Duration;

use serde::Serialize;

/// Lifecycle status of the watchdog handle as seen by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WatchdogStatus {
    /// Open and counting down. Opening the device arms it.
    #[default]
    Armed,
    /// Closed with the disarm token; the timer is stopped.
    Disarmed,
    /// Closed without the disarm token; a hardware reset is pending.
    ForcedClose,
}

impl WatchdogStatus {
    /// Whether the handle has been given up.
    #[must_use]
    pub fn is_closed(self) -> bool {
        !matches!(self, Self::Armed)
    }

    /// Whether the host is guaranteed to reset from this state.
    #[must_use]
    pub fn is_reset_pending(self) -> bool {
        matches!(self, Self::ForcedClose)
    }

    /// Get the status as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Armed => "Armed",
            Self::Disarmed => "Disarmed",
            Self::ForcedClose => "ForcedClose",
        }
    }
}

impl core::fmt::Display for WatchdogStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Feed counters kept by the handle owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WatchdogMetrics {
    /// Total number of successful feeds.
    pub feed_count: u64,
    /// Total number of failed feeds.
    pub failure_count: u64,
    /// Failed feeds since the last success.
    pub consecutive_failures: u32,
    /// Longest gap observed between two successful feeds.
    pub max_feed_gap: Duration,
}

impl WatchdogMetrics {
    /// Create a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful feed, `gap` after the previous one.
    pub fn record_feed(&mut self, gap: Option<Duration>) {
        if let Some(gap) = gap
            && gap > self.max_feed_gap
        {
            self.max_feed_gap = gap;
        }
        self.feed_count = self.feed_count.saturating_add(1);
        self.consecutive_failures = 0;
    }

    /// Record a feed failure.
    pub fn record_failure(&mut self) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}

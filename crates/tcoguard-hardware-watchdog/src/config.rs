//! Reset policy for the chipset watchdog.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HardwareWatchdogError, HardwareWatchdogResult};

/// Timing policy shared by the heartbeat, the switch monitor and the
/// forced-reset fallback.
///
/// Immutable once the supervisor has started. Construct it through
/// [`ResetPolicy::new`] or the builder so the cadence invariant is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetPolicy {
    /// Hardware countdown length in seconds.
    ///
    /// Default: 30s.
    pub timeout_secs: u32,

    /// Seconds between keep-alive writes. Must be strictly less than
    /// `timeout_secs`.
    ///
    /// Default: 10s.
    pub feed_interval_secs: u32,

    /// Seconds the reset switch must be held before a forced reset.
    ///
    /// Default: 5s.
    pub hold_threshold_secs: u32,

    /// Extra seconds past `timeout_secs` to wait for the hardware reset
    /// before reporting that it did not happen.
    ///
    /// Default: 10s.
    pub reset_grace_secs: u32,
}

impl ResetPolicy {
    /// Create a validated policy.
    ///
    /// # Errors
    ///
    /// Returns an error if `feed_interval_secs` is not strictly less than
    /// `timeout_secs`, or if any interval is zero.
    pub fn new(
        timeout_secs: u32,
        feed_interval_secs: u32,
        hold_threshold_secs: u32,
    ) -> HardwareWatchdogResult<Self> {
        let policy = Self {
            timeout_secs,
            feed_interval_secs,
            hold_threshold_secs,
            ..Self::default()
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Create a policy builder.
    #[must_use]
    pub fn builder() -> ResetPolicyBuilder {
        ResetPolicyBuilder::default()
    }

    /// Validate the policy.
    ///
    /// # Errors
    ///
    /// Returns an error if any values are invalid.
    pub fn validate(&self) -> HardwareWatchdogResult<()> {
        if self.timeout_secs == 0 {
            return Err(HardwareWatchdogError::invalid_configuration(
                "timeout_secs must be greater than 0",
            ));
        }
        if self.feed_interval_secs == 0 {
            return Err(HardwareWatchdogError::invalid_configuration(
                "feed_interval_secs must be greater than 0",
            ));
        }
        if self.feed_interval_secs >= self.timeout_secs {
            return Err(HardwareWatchdogError::invalid_configuration(format!(
                "feed_interval_secs ({}) must be less than timeout_secs ({})",
                self.feed_interval_secs, self.timeout_secs
            )));
        }
        if self.hold_threshold_secs == 0 {
            return Err(HardwareWatchdogError::invalid_configuration(
                "hold_threshold_secs must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Whether the feed cadence leaves at least half the countdown as slack.
    #[must_use]
    pub fn has_recommended_cadence(&self) -> bool {
        u64::from(self.feed_interval_secs) * 2 <= u64::from(self.timeout_secs)
    }

    /// The countdown length.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_secs))
    }

    /// The keep-alive cadence.
    #[must_use]
    pub fn feed_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.feed_interval_secs))
    }

    /// The switch hold threshold.
    #[must_use]
    pub fn hold_threshold(&self) -> Duration {
        Duration::from_secs(u64::from(self.hold_threshold_secs))
    }

    /// How long after a forced close the host must have reset.
    #[must_use]
    pub fn reset_deadline(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_secs) + u64::from(self.reset_grace_secs))
    }
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            feed_interval_secs: 10,
            hold_threshold_secs: 5,
            reset_grace_secs: 10,
        }
    }
}

/// Builder for `ResetPolicy`.
#[derive(Debug, Default)]
pub struct ResetPolicyBuilder {
    policy: ResetPolicy,
}

impl ResetPolicyBuilder {
    /// Set the countdown length in seconds.
    #[must_use]
    pub fn timeout_secs(mut self, secs: u32) -> Self {
        self.policy.timeout_secs = secs;
        self
    }

    /// Set the keep-alive cadence in seconds.
    #[must_use]
    pub fn feed_interval_secs(mut self, secs: u32) -> Self {
        self.policy.feed_interval_secs = secs;
        self
    }

    /// Set the switch hold threshold in seconds.
    #[must_use]
    pub fn hold_threshold_secs(mut self, secs: u32) -> Self {
        self.policy.hold_threshold_secs = secs;
        self
    }

    /// Set the forced-reset grace period in seconds.
    #[must_use]
    pub fn reset_grace_secs(mut self, secs: u32) -> Self {
        self.policy.reset_grace_secs = secs;
        self
    }

    /// Build the policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy is invalid.
    pub fn build(self) -> HardwareWatchdogResult<ResetPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

//! Heartbeat task: blink, and feed the watchdog on its cadence.

use std::time::Duration;

use tcoguard_errors::dispose;
use tcoguard_hardware_watchdog::HardwareWatchdogError;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::indicators::Indicators;
use crate::owner::WatchdogHandle;
use crate::shutdown::Shutdown;

/// State owned by the heartbeat task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatState {
    /// Current heartbeat LED phase.
    pub indicator_phase: bool,
    /// Last successful feed issued by this task (or at startup).
    pub last_feed_at: Instant,
    /// Feed failures since the last success.
    pub consecutive_failures: u32,
    /// Whether the critical indicator pattern is showing.
    pub escalated: bool,
}

/// Heartbeat task parameters.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    /// Watchdog owner to feed.
    pub watchdog: WatchdogHandle,
    /// LEDs, when the expander came up.
    pub indicators: Option<Indicators>,
    /// Minimum time between feeds.
    pub feed_interval: Duration,
    /// Tick period.
    pub tick: Duration,
    /// Consecutive failures before the critical pattern.
    pub max_feed_failures: u32,
}

impl Heartbeat {
    /// Run until shutdown or until the watchdog is closed.
    ///
    /// Returns the final state.
    pub async fn run(self, mut shutdown: Shutdown) -> HeartbeatState {
        let mut state = HeartbeatState {
            indicator_phase: false,
            last_feed_at: self.watchdog.last_feed().unwrap_or_else(Instant::now),
            consecutive_failures: 0,
            escalated: false,
        };
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(
            feed_interval_secs = self.feed_interval.as_secs(),
            tick_ms = self.tick.as_millis(),
            "Heartbeat started"
        );

        loop {
            if shutdown.is_triggered() {
                break;
            }
            tokio::select! {
                biased;
                () = shutdown.triggered() => break,
                _ = ticker.tick() => {}
            }

            state.indicator_phase = !state.indicator_phase;
            if let Some(indicators) = &self.indicators {
                indicators.set_heartbeat(state.indicator_phase).await;
            }

            let now = Instant::now();
            if now.saturating_duration_since(state.last_feed_at) < self.feed_interval {
                continue;
            }
            match self.watchdog.feed().await {
                Ok(()) => {
                    state.last_feed_at = now;
                    state.consecutive_failures = 0;
                    if state.escalated {
                        state.escalated = false;
                        info!("Watchdog feed recovered");
                        if let Some(indicators) = &self.indicators {
                            indicators.set_critical(false).await;
                        }
                    }
                }
                Err(HardwareWatchdogError::Closed) => {
                    warn!("Watchdog handle closed, heartbeat stopping");
                    break;
                }
                Err(e) => {
                    state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                    if let Err(e) = dispose::<(), _>(Err(e), "Watchdog feed") {
                        error!(error = %e, "Unexpected feed error class");
                    }
                    if state.consecutive_failures >= self.max_feed_failures && !state.escalated {
                        state.escalated = true;
                        error!(
                            severity = "critical",
                            consecutive_failures = state.consecutive_failures,
                            "Watchdog feeding has failed repeatedly; reset protection is lapsing"
                        );
                        if let Some(indicators) = &self.indicators {
                            indicators.set_critical(true).await;
                        }
                    }
                }
            }
        }

        debug!("Heartbeat stopped");
        state
    }
}

//! Reset switch hold monitor.
//!
//! The switch is sampled on a fixed period, debounced, and fed into
//! [`SwitchHoldMachine`]. Holding it past the threshold consumes the
//! [`ResetTrigger`], which force-closes the watchdog and ends the monitor.
//!
//! ```text
//!            pressed                      held >= threshold
//!   Idle ───────────────► Pressed(since) ───────────────────► Resetting
//!     ▲                        │
//!     └────── released ────────┘
//!           (held < threshold, "aborted")
//! ```
//!
//! Within one sample the threshold is checked before the level, so a release
//! observed at or after the threshold still resets.

use std::time::Duration;

use tcoguard_gpio::{ExpanderHandle, Level, PinRef};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::ServiceError;
use crate::indicators::{Indicators, WarningBurst};
use crate::owner::WatchdogHandle;
use crate::shutdown::Shutdown;

/// Debounced switch position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchLevel {
    /// Not pressed.
    #[default]
    Released,
    /// Held down.
    Pressed,
}

impl SwitchLevel {
    /// Interpret an electrical level given the wiring's pressed level.
    #[must_use]
    pub fn from_electrical(level: Level, pressed_level: Level) -> Self {
        if level == pressed_level {
            Self::Pressed
        } else {
            Self::Released
        }
    }
}

/// Accepts a level change only after `required` consecutive equal samples.
#[derive(Debug, Clone)]
pub struct Debouncer {
    stable: SwitchLevel,
    candidate: SwitchLevel,
    streak: u32,
    required: u32,
}

impl Debouncer {
    /// Start released; `required` is clamped to at least one sample.
    #[must_use]
    pub fn new(required: u32) -> Self {
        Self {
            stable: SwitchLevel::Released,
            candidate: SwitchLevel::Released,
            streak: 0,
            required: required.max(1),
        }
    }

    /// Feed one raw sample, returning the debounced level.
    pub fn sample(&mut self, raw: SwitchLevel) -> SwitchLevel {
        if raw == self.stable {
            self.streak = 0;
            return self.stable;
        }
        if raw == self.candidate {
            self.streak = self.streak.saturating_add(1);
        } else {
            self.candidate = raw;
            self.streak = 1;
        }
        if self.streak >= self.required {
            self.stable = raw;
            self.streak = 0;
        }
        self.stable
    }
}

/// State of [`SwitchHoldMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    /// Waiting for a press.
    Idle,
    /// Held since the given instant.
    Pressed(Instant),
    /// Threshold reached; terminal.
    Resetting,
}

/// Outcome of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldEvent {
    /// Nothing changed.
    None,
    /// A press began.
    PressStarted,
    /// The switch was released before the threshold.
    Aborted {
        /// How long it was held.
        held: Duration,
    },
    /// The switch has been held for the threshold.
    ThresholdReached {
        /// How long it was held.
        held: Duration,
    },
}

/// Pure hold-duration state machine.
#[derive(Debug, Clone)]
pub struct SwitchHoldMachine {
    state: HoldState,
    threshold: Duration,
}

impl SwitchHoldMachine {
    /// Machine in `Idle` with the given hold threshold.
    #[must_use]
    pub fn new(threshold: Duration) -> Self {
        Self {
            state: HoldState::Idle,
            threshold,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> HoldState {
        self.state
    }

    /// When the current press began, if one is in progress.
    #[must_use]
    pub fn press_started_at(&self) -> Option<Instant> {
        match self.state {
            HoldState::Pressed(since) => Some(since),
            HoldState::Idle | HoldState::Resetting => None,
        }
    }

    /// Apply one debounced sample taken at `now`.
    pub fn observe(&mut self, level: SwitchLevel, now: Instant) -> HoldEvent {
        match self.state {
            HoldState::Resetting => HoldEvent::None,
            HoldState::Idle => match level {
                SwitchLevel::Pressed => {
                    self.state = HoldState::Pressed(now);
                    HoldEvent::PressStarted
                }
                SwitchLevel::Released => HoldEvent::None,
            },
            HoldState::Pressed(since) => {
                let held = now.saturating_duration_since(since);
                if held >= self.threshold {
                    self.state = HoldState::Resetting;
                    HoldEvent::ThresholdReached { held }
                } else if level == SwitchLevel::Released {
                    self.state = HoldState::Idle;
                    HoldEvent::Aborted { held }
                } else {
                    HoldEvent::None
                }
            }
        }
    }
}

/// One-shot forced reset. Consumed by [`ResetTrigger::fire`].
#[derive(Debug)]
pub struct ResetTrigger {
    watchdog: WatchdogHandle,
    deadline: Duration,
}

impl ResetTrigger {
    /// Trigger that force-closes `watchdog` and expects the host gone within
    /// `deadline`.
    #[must_use]
    pub fn new(watchdog: WatchdogHandle, deadline: Duration) -> Self {
        Self { watchdog, deadline }
    }

    /// Log at critical severity, then force-close the watchdog.
    ///
    /// The log line comes first because it may be the last one written.
    pub async fn fire(self, reason: &str) -> PendingReset {
        error!(
            severity = "critical",
            reason,
            deadline_secs = self.deadline.as_secs(),
            "Forcing hardware reset: closing watchdog without disarm"
        );
        if let Err(e) = self.watchdog.force_close().await {
            error!(severity = "critical", error = %e, "Forced watchdog close could not be delivered");
        }
        PendingReset {
            fired_at: Instant::now(),
            deadline: self.deadline,
        }
    }
}

/// A forced close that has been performed; the host should reset shortly.
#[derive(Debug, Clone, Copy)]
pub struct PendingReset {
    fired_at: Instant,
    deadline: Duration,
}

impl PendingReset {
    /// When the forced close was issued.
    #[must_use]
    pub fn fired_at(&self) -> Instant {
        self.fired_at
    }

    /// Wait out the deadline. Reaching the end means the reset did not happen.
    pub async fn wait(self) -> ServiceError {
        tokio::time::sleep_until(self.fired_at + self.deadline).await;
        let err = ServiceError::ResetFailed {
            waited_secs: self.deadline.as_secs(),
        };
        error!(severity = "critical", "{err}");
        err
    }
}

/// How the monitor ended.
#[derive(Debug)]
pub enum MonitorOutcome {
    /// Shutdown was requested.
    Stopped,
    /// The switch triggered a forced reset.
    ResetTriggered(PendingReset),
}

/// Switch monitor parameters.
#[derive(Debug, Clone)]
pub struct SwitchMonitor {
    /// Expander carrying the switch.
    pub expander: ExpanderHandle,
    /// LEDs for press feedback, when available.
    pub indicators: Option<Indicators>,
    /// Switch input pin.
    pub pin: PinRef,
    /// Electrical level meaning "pressed".
    pub pressed_level: Level,
    /// Sampling period.
    pub poll_interval: Duration,
    /// Samples required for a level change.
    pub debounce_samples: u32,
    /// Hold time that forces a reset.
    pub hold_threshold: Duration,
}

impl SwitchMonitor {
    /// Sample the switch until shutdown or until the trigger fires.
    pub async fn run(self, trigger: ResetTrigger, mut shutdown: Shutdown) -> MonitorOutcome {
        let mut debouncer = Debouncer::new(self.debounce_samples);
        let mut machine = SwitchHoldMachine::new(self.hold_threshold);
        let mut burst: Option<WarningBurst> = None;
        let mut read_failing = false;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(pin = %self.pin, pressed_level = ?self.pressed_level, "Switch monitor started");

        loop {
            if shutdown.is_triggered() {
                break;
            }
            tokio::select! {
                biased;
                () = shutdown.triggered() => break,
                _ = ticker.tick() => {}
            }

            let level = debouncer.sample(self.read_switch(&mut read_failing).await);
            match machine.observe(level, Instant::now()) {
                HoldEvent::None => {}
                HoldEvent::PressStarted => {
                    info!(
                        hold_threshold_secs = self.hold_threshold.as_secs(),
                        "Reset switch pressed; keep holding to force a reset"
                    );
                    burst = self.indicators.as_ref().map(Indicators::start_warning);
                }
                HoldEvent::Aborted { held } => {
                    info!(held_ms = duration_ms(held), "Reset switch released early; reset aborted");
                    if let Some(burst) = burst.take() {
                        burst.cancel();
                    }
                    if let Some(indicators) = &self.indicators {
                        indicators.restore_status().await;
                    }
                }
                HoldEvent::ThresholdReached { held } => {
                    drop(burst.take());
                    info!(held_ms = duration_ms(held), "Reset switch held past threshold");
                    let pending = trigger.fire("reset switch held").await;
                    return MonitorOutcome::ResetTriggered(pending);
                }
            }
        }

        if let Some(burst) = burst.take() {
            burst.cancel();
        }
        debug!("Switch monitor stopped");
        MonitorOutcome::Stopped
    }

    /// Raw switch position. A failed read counts as released.
    ///
    /// `failing` tracks the read health so that only the first failure and
    /// the recovery are logged above debug.
    async fn read_switch(&self, failing: &mut bool) -> SwitchLevel {
        match self.expander.read_level(self.pin).await {
            Ok(level) => {
                if std::mem::take(failing) {
                    info!(pin = %self.pin, "Reset switch readable again");
                }
                SwitchLevel::from_electrical(level, self.pressed_level)
            }
            Err(e) if !*failing => {
                *failing = true;
                warn!(
                    pin = %self.pin,
                    error = %e,
                    "Reset switch unreadable; treating it as released, switch reset unavailable"
                );
                SwitchLevel::Released
            }
            Err(e) => {
                debug!(error = %e, "Reset switch read failed");
                SwitchLevel::Released
            }
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

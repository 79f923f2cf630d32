//! Startup, steady state and cleanup of the whole service.
//!
//! Startup order is expander first, then watchdog open, configure and first
//! feed, then the heartbeat and switch monitor tasks. Cleanup stops both
//! tasks and waits for them before disarming the watchdog, so no feed can
//! race the disarm token. Every cleanup step runs even if an earlier one
//! failed.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tcoguard_errors::dispose;
use tcoguard_gpio::{ExpanderHandle, spawn_expander};
use tcoguard_hardware_watchdog::{HardwareWatchdogError, WatchdogAttributes, WatchdogDevice};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use crate::config::{BoardPins, ServiceConfig};
use crate::diagnostics::{PROC_MODULES, PlatformReport};
use crate::error::{ServiceError, ServiceResult};
use crate::heartbeat::Heartbeat;
use crate::indicators::Indicators;
use crate::owner::{self, WatchdogHandle};
use crate::platform::Platform;
use crate::shutdown;
use crate::signals::Signals;
use crate::switch_monitor::{MonitorOutcome, ResetTrigger, SwitchMonitor};

type PendingWait = Pin<Box<dyn Future<Output = ServiceError> + Send>>;

/// An opened, configured and fed watchdog, not yet handed to its owner.
#[derive(Debug)]
pub struct ArmedWatchdog {
    /// The device.
    pub device: Box<dyn WatchdogDevice>,
    /// When the first feed succeeded.
    pub first_feed: Option<Instant>,
    /// Timeout the driver reports after configuration.
    pub effective_timeout_secs: Option<u32>,
}

/// Open the watchdog, apply the configured timeout and feed it once.
///
/// A timeout the driver refuses is logged and the driver default kept.
///
/// # Errors
///
/// Returns the open error when no device is available.
pub fn arm_watchdog<P: Platform + ?Sized>(
    platform: &P,
    config: &ServiceConfig,
) -> ServiceResult<ArmedWatchdog> {
    let policy = config.policy;
    let mut device = platform.open_watchdog(&config.watchdog)?;
    info!(path = %device.path().display(), "Watchdog opened and armed");

    match device.set_timeout(policy.timeout_secs) {
        Ok(applied) => info!(
            requested_secs = policy.timeout_secs,
            applied_secs = applied,
            "Watchdog timeout set"
        ),
        Err(e) => warn!(
            error = %e,
            requested_secs = policy.timeout_secs,
            "Watchdog timeout not configurable; keeping driver default"
        ),
    }

    let effective_timeout_secs = device.timeout().ok();
    if let Some(effective) = effective_timeout_secs
        && effective <= policy.feed_interval_secs
    {
        error!(
            severity = "critical",
            timeout_secs = effective,
            feed_interval_secs = policy.feed_interval_secs,
            "Driver timeout does not exceed the feed interval; the host will reset"
        );
    }
    let time_left = match device.time_left() {
        Ok(Some(secs)) => Some(secs),
        Ok(None) | Err(_) => WatchdogAttributes::read(&config.watchdog.sysfs_dir).timeleft_secs,
    };
    debug!(timeout_secs = ?effective_timeout_secs, time_left_secs = ?time_left, "Watchdog timer state");

    let first_feed = match dispose(device.feed(), "Initial watchdog feed") {
        Ok(Some(())) => Some(Instant::now()),
        Ok(None) => None,
        Err(e) => {
            error!(error = %e, "Initial watchdog feed failed");
            None
        }
    };

    Ok(ArmedWatchdog {
        device,
        first_feed,
        effective_timeout_secs,
    })
}

struct ExpanderUnit {
    handle: ExpanderHandle,
    task: JoinHandle<()>,
    indicators: Indicators,
}

/// The composed service.
#[derive(Debug)]
pub struct Supervisor<P> {
    config: ServiceConfig,
    pins: BoardPins,
    platform: P,
}

impl<P: Platform> Supervisor<P> {
    /// Validate `config` and bind it to `platform`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid.
    pub fn new(config: ServiceConfig, platform: P) -> ServiceResult<Self> {
        config.validate()?;
        let pins = config.board_pins()?;
        Ok(Self {
            config,
            pins,
            platform,
        })
    }

    /// Run until SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if signal handlers cannot be installed, if no
    /// watchdog device is available, or if a forced reset did not happen
    /// within its deadline.
    pub async fn run(self) -> ServiceResult<()> {
        let signals = Signals::install()?;
        self.run_until(signals.recv()).await
    }

    /// Run until `stop` resolves with the name of the stop reason.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::run`].
    pub async fn run_until<F>(self, stop: F) -> ServiceResult<()>
    where
        F: Future<Output = &'static str>,
    {
        PlatformReport::collect(&self.config.watchdog, PROC_MODULES).log();

        let expander = self.start_expander().await;

        let armed = match arm_watchdog(&self.platform, &self.config) {
            Ok(armed) => armed,
            Err(e) => {
                error!(error = %e, "Cannot start without a watchdog");
                if let Some(unit) = expander {
                    release_expander(unit).await;
                }
                return Err(e);
            }
        };
        let started_at = Instant::now();

        let (trigger, token) = shutdown::channel();
        let (watchdog, owner_task) = owner::spawn(armed.device, armed.first_feed);
        let indicators = expander.as_ref().map(|unit| unit.indicators.clone());

        let heartbeat = Heartbeat {
            watchdog: watchdog.clone(),
            indicators: indicators.clone(),
            feed_interval: self.config.policy.feed_interval(),
            tick: self.config.heartbeat.tick(),
            max_feed_failures: self.config.heartbeat.max_feed_failures,
        };
        let heartbeat_task =
            tokio::spawn(heartbeat.run(token.clone()).instrument(info_span!("heartbeat")));

        let mut monitor_task = expander.as_ref().map(|unit| {
            let monitor = SwitchMonitor {
                expander: unit.handle.clone(),
                indicators: indicators.clone(),
                pin: self.pins.switch,
                pressed_level: self.config.switch.pressed_level,
                poll_interval: self.config.switch.poll_interval(),
                debounce_samples: self.config.switch.debounce_samples,
                hold_threshold: self.config.policy.hold_threshold(),
            };
            let reset = ResetTrigger::new(watchdog.clone(), self.config.policy.reset_deadline());
            tokio::spawn(
                monitor
                    .run(reset, token.clone())
                    .instrument(info_span!("switch_monitor")),
            )
        });
        if monitor_task.is_none() {
            warn!("Reset switch unavailable; switch-triggered reset disabled");
        }
        info!(
            timeout_secs = self.config.policy.timeout_secs,
            feed_interval_secs = self.config.policy.feed_interval_secs,
            hold_threshold_secs = self.config.policy.hold_threshold_secs,
            "Supervisor running"
        );

        let feed_interval = self.config.policy.feed_interval();
        let mut staleness = tokio::time::interval(self.config.supervisor.staleness_check());
        staleness.set_missed_tick_behavior(MissedTickBehavior::Delay);
        staleness.tick().await;
        let mut pending: Option<PendingWait> = None;
        let mut stop = std::pin::pin!(stop);

        let result = loop {
            tokio::select! {
                reason = &mut stop => {
                    info!(reason, "Termination requested");
                    break Ok(());
                }
                outcome = wait_opt(monitor_task.as_mut()), if monitor_task.is_some() => {
                    monitor_task = None;
                    match outcome {
                        Ok(MonitorOutcome::ResetTriggered(reset)) => {
                            pending = Some(Box::pin(reset.wait()));
                        }
                        Ok(MonitorOutcome::Stopped) => debug!("Switch monitor stopped early"),
                        Err(e) => error!(error = %e, "Switch monitor task failed"),
                    }
                }
                err = wait_opt(pending.as_mut()), if pending.is_some() => break Err(err),
                _ = staleness.tick(), if pending.is_none() => {
                    check_staleness(&watchdog, feed_interval, started_at);
                }
            }
        };

        info!("Shutting down");
        trigger.trigger();
        match heartbeat_task.await {
            Ok(state) => debug!(?state, "Heartbeat joined"),
            Err(e) => error!(error = %e, "Heartbeat task failed"),
        }
        if let Some(task) = monitor_task {
            match task.await {
                Ok(MonitorOutcome::ResetTriggered(_)) => {
                    warn!("Forced reset fired during shutdown; it stays in effect");
                }
                Ok(MonitorOutcome::Stopped) => debug!("Switch monitor joined"),
                Err(e) => error!(error = %e, "Switch monitor task failed"),
            }
        }

        match watchdog.close_gracefully().await {
            Ok(()) => {}
            Err(HardwareWatchdogError::Closed) => {
                warn!("Watchdog was force-closed; hardware reset still pending");
            }
            Err(e) => error!(error = %e, "Watchdog disarm failed"),
        }
        drop(watchdog);
        if let Err(e) = owner_task.await {
            error!(error = %e, "Watchdog owner task failed");
        }

        if let Some(unit) = expander {
            release_expander(unit).await;
        }
        info!("Supervisor stopped");
        result
    }

    async fn start_expander(&self) -> Option<ExpanderUnit> {
        let port = match self.platform.open_expander(&self.config.expander) {
            Ok(port) => port,
            Err(e) => {
                warn!(error = %e, "Expander unavailable; running without indicators or reset switch");
                return None;
            }
        };
        let (handle, task) = spawn_expander(port);
        let indicators = Indicators::new(handle.clone(), &self.pins, self.config.indicators);
        match indicators.initialize(self.pins.switch).await {
            Ok(()) => info!(
                bus = %self.config.expander.bus.display(),
                address = format_args!("{:#04x}", self.config.expander.address),
                "Expander initialized"
            ),
            // Switch reads will fail and count as released.
            Err(e) => warn!(error = %e, "Expander initialization failed; continuing"),
        }
        Some(ExpanderUnit {
            handle,
            task,
            indicators,
        })
    }
}

async fn release_expander(unit: ExpanderUnit) {
    if let Err(e) = unit.indicators.all_off().await {
        warn!(error = %e, "Could not switch indicators off");
    }
    if let Err(e) = unit.handle.release().await {
        warn!(error = %e, "Expander release failed");
    }
    if let Err(e) = unit.task.await {
        error!(error = %e, "Expander task failed");
    }
}

fn check_staleness(watchdog: &WatchdogHandle, feed_interval: Duration, started_at: Instant) {
    let last = watchdog.last_feed().unwrap_or(started_at);
    let gap = Instant::now().saturating_duration_since(last);
    if gap > feed_interval.saturating_mul(2) {
        warn!(
            gap_secs = gap.as_secs(),
            feed_interval_secs = feed_interval.as_secs(),
            "No watchdog feed for more than twice the feed interval"
        );
    } else {
        trace!(gap_ms = gap.as_millis(), "Feed is fresh");
    }
}

async fn wait_opt<F>(future: Option<&mut F>) -> F::Output
where
    F: Future + Unpin,
{
    match future {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

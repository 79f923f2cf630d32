//! Status and heartbeat LEDs on the expander.
//!
//! Every write here is cosmetic. Failures are routed through the shared
//! disposition policy and never reach the feed or reset paths.
//!
//! While the critical pattern is up (status LED dark after repeated feed
//! failures) nothing but [`Indicators::set_critical`] may light the status
//! LED again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tcoguard_errors::DisposeExt;
use tcoguard_gpio::{ExpanderHandle, GpioResult, PinRef};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span};

use crate::config::{BoardPins, IndicatorSettings};

/// The two indicator LEDs.
#[derive(Debug, Clone)]
pub struct Indicators {
    expander: ExpanderHandle,
    status: PinRef,
    heartbeat: PinRef,
    settings: IndicatorSettings,
    critical: Arc<AtomicBool>,
}

impl Indicators {
    /// Indicators on `expander` at the board's LED pins.
    #[must_use]
    pub fn new(expander: ExpanderHandle, pins: &BoardPins, settings: IndicatorSettings) -> Self {
        Self {
            expander,
            status: pins.status_led,
            heartbeat: pins.heartbeat_led,
            settings,
            critical: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The expander the LEDs live on.
    #[must_use]
    pub fn expander(&self) -> &ExpanderHandle {
        &self.expander
    }

    /// Configure `switch` as input and both LEDs as outputs, then show the
    /// startup pattern: status on, heartbeat off.
    ///
    /// # Errors
    ///
    /// Returns the first expander failure; later steps are skipped.
    pub async fn initialize(&self, switch: PinRef) -> GpioResult<()> {
        self.expander.configure_input(switch).await?;
        self.expander.configure_output(self.status).await?;
        self.expander.configure_output(self.heartbeat).await?;
        self.expander.set_output(self.status, true).await?;
        self.expander.set_output(self.heartbeat, false).await
    }

    /// Drive the status LED.
    pub async fn set_status(&self, on: bool) {
        cosmetic(self.expander.set_output(self.status, on).await, "status LED");
    }

    /// Raise or clear the critical pattern, shared by every clone.
    pub async fn set_critical(&self, critical: bool) {
        self.critical.store(critical, Ordering::SeqCst);
        self.set_status(!critical).await;
    }

    /// Whether the critical pattern is up.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.critical.load(Ordering::SeqCst)
    }

    /// Return the status LED to its resting state: on, or off while critical.
    pub async fn restore_status(&self) {
        self.set_status(!self.is_critical()).await;
    }

    /// Drive the heartbeat LED.
    pub async fn set_heartbeat(&self, on: bool) {
        cosmetic(
            self.expander.set_output(self.heartbeat, on).await,
            "heartbeat LED",
        );
    }

    /// Start the fast-blink warning burst on the status LED.
    ///
    /// The burst runs on its own task; dropping or cancelling the returned
    /// guard stops it between toggles. A burst that runs to completion
    /// restores the status LED.
    #[must_use]
    pub fn start_warning(&self) -> WarningBurst {
        let indicators = self.clone();
        let task = tokio::spawn(
            async move {
                let period = indicators.settings.warning_period();
                let mut on = false;
                for _ in 0..indicators.settings.warning_blinks {
                    indicators.set_status(on).await;
                    on = !on;
                    tokio::time::sleep(period).await;
                }
                indicators.restore_status().await;
                debug!("Warning burst finished");
            }
            .instrument(info_span!("warning_burst")),
        );
        WarningBurst { task }
    }

    /// Turn both LEDs off, attempting each even if the other fails.
    ///
    /// # Errors
    ///
    /// Returns the first failure.
    pub async fn all_off(&self) -> GpioResult<()> {
        let status = self.expander.set_output(self.status, false).await;
        let heartbeat = self.expander.set_output(self.heartbeat, false).await;
        status.and(heartbeat)
    }
}

fn cosmetic(result: GpioResult<()>, context: &str) {
    if let Err(err) = result.dispose(context) {
        debug!(%err, "{context}: failure left unhandled");
    }
}

/// Guard for a running warning burst.
#[derive(Debug)]
pub struct WarningBurst {
    task: JoinHandle<()>,
}

impl WarningBurst {
    /// Stop the burst now.
    pub fn cancel(self) {
        self.task.abort();
    }

    /// Whether the burst has run to completion or been stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WarningBurst {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use std::time::Duration;
    use tcoguard_gpio::{MockExpander, spawn_expander};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn indicators(chip: &MockExpander) -> Result<(Indicators, BoardPins), Box<dyn std::error::Error>> {
        let config = ServiceConfig::default();
        let pins = config.board_pins()?;
        let (expander, _task) = spawn_expander(chip.clone());
        Ok((Indicators::new(expander, &pins, config.indicators), pins))
    }

    #[tokio::test]
    async fn test_initialize_sets_startup_pattern() -> TestResult {
        let chip = MockExpander::new();
        let (leds, pins) = indicators(&chip)?;
        leds.initialize(pins.switch).await?;
        assert!(chip.is_input(pins.switch));
        assert!(!chip.is_input(pins.status_led));
        assert!(!chip.is_input(pins.heartbeat_led));
        assert!(chip.output_high(pins.status_led));
        assert!(!chip.output_high(pins.heartbeat_led));
        Ok(())
    }

    #[tokio::test]
    async fn test_all_off_tries_both() -> TestResult {
        let chip = MockExpander::new();
        let (leds, pins) = indicators(&chip)?;
        leds.initialize(pins.switch).await?;
        leds.set_heartbeat(true).await;

        // First write fails, second still goes through.
        chip.fail_next(1);
        assert!(leds.all_off().await.is_err());
        assert!(!chip.output_high(pins.heartbeat_led));

        leds.all_off().await?;
        assert!(!chip.output_high(pins.status_led));
        Ok(())
    }

    #[tokio::test]
    async fn test_cosmetic_failures_are_swallowed() -> TestResult {
        let chip = MockExpander::new();
        let (leds, pins) = indicators(&chip)?;
        chip.set_failing(true);
        leds.set_status(false).await;
        leds.set_heartbeat(true).await;
        chip.set_failing(false);
        assert!(chip.output_high(pins.status_led));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_burst_toggles_then_finishes() -> TestResult {
        let chip = MockExpander::new();
        let (leds, pins) = indicators(&chip)?;
        leds.initialize(pins.switch).await?;
        let before = chip.writes().len();

        let burst = leds.start_warning();
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(burst.is_finished());

        // Ten toggles starting from off; the first is a real change.
        let toggles = chip.writes().len() - before;
        assert_eq!(toggles, 10);
        Ok(())
    }

    /// Scenario: a warning burst while the critical pattern is up.
    /// Expected: the burst blinks, then leaves the status LED dark.
    #[tokio::test(start_paused = true)]
    async fn test_burst_keeps_critical_pattern() -> TestResult {
        let chip = MockExpander::new();
        let (leds, pins) = indicators(&chip)?;
        leds.initialize(pins.switch).await?;
        leds.set_critical(true).await;
        assert!(!chip.output_high(pins.status_led));

        let clone = leds.clone();
        let burst = clone.start_warning();
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(burst.is_finished());
        assert!(!chip.output_high(pins.status_led));

        clone.restore_status().await;
        assert!(!chip.output_high(pins.status_led));

        leds.set_critical(false).await;
        clone.restore_status().await;
        assert!(chip.output_high(pins.status_led));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_burst_stops_toggling() -> TestResult {
        let chip = MockExpander::new();
        let (leds, pins) = indicators(&chip)?;
        leds.initialize(pins.switch).await?;

        let burst = leds.start_warning();
        tokio::time::sleep(Duration::from_millis(250)).await;
        burst.cancel();
        leds.set_status(true).await;
        let settled = chip.writes().len();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(chip.writes().len(), settled);
        assert!(chip.output_high(pins.status_led));
        Ok(())
    }
}

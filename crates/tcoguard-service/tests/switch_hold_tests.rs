//! Switch hold detection, from the pure state machine up to the monitor task.

use std::time::Duration;

use proptest::prelude::*;
use tcoguard_gpio::{Level, MockExpander, spawn_expander};
use tcoguard_hardware_watchdog::{DeviceEvent, SimulatedHardware, WatchdogDevice};
use tcoguard_service::indicators::Indicators;
use tcoguard_service::owner::{self, WatchdogHandle};
use tcoguard_service::shutdown;
use tcoguard_service::switch_monitor::{
    HoldEvent, HoldState, MonitorOutcome, ResetTrigger, SwitchHoldMachine, SwitchLevel,
    SwitchMonitor,
};
use tcoguard_service::ServiceConfig;
use tokio::time::Instant;
use tracing::Instrument;
use tracing_test::traced_test;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const THRESHOLD_MS: u64 = 5_000;

fn sample() -> impl Strategy<Value = (bool, u64)> {
    (any::<bool>(), 1u64..=1_500)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_threshold_fires_at_most_once_and_only_after_full_hold(
        samples in prop::collection::vec(sample(), 1..200)
    ) {
        let base = Instant::now();
        let mut machine = SwitchHoldMachine::new(Duration::from_millis(THRESHOLD_MS));
        let mut elapsed_ms = 0u64;
        let mut pressed_since: Option<u64> = None;
        let mut fired = 0u32;

        for (pressed, step_ms) in samples {
            elapsed_ms = elapsed_ms.saturating_add(step_ms);
            let level = if pressed { SwitchLevel::Pressed } else { SwitchLevel::Released };
            let now = base + Duration::from_millis(elapsed_ms);

            match machine.observe(level, now) {
                HoldEvent::ThresholdReached { held } => {
                    fired = fired.saturating_add(1);
                    let start = pressed_since.ok_or_else(|| {
                        TestCaseError::fail("threshold without a press")
                    })?;
                    prop_assert!(elapsed_ms.saturating_sub(start) >= THRESHOLD_MS);
                    prop_assert!(held >= Duration::from_millis(THRESHOLD_MS));
                }
                HoldEvent::Aborted { held } => {
                    prop_assert!(held < Duration::from_millis(THRESHOLD_MS));
                    pressed_since = None;
                }
                HoldEvent::PressStarted => pressed_since = Some(elapsed_ms),
                HoldEvent::None => {}
            }
        }

        prop_assert!(fired <= 1);
        if fired == 1 {
            prop_assert_eq!(machine.state(), HoldState::Resetting);
        }
    }
}

struct Bench {
    hardware: SimulatedHardware,
    chip: MockExpander,
    /// Keeps the owner alive after the monitor drops its trigger.
    watchdog: WatchdogHandle,
    monitor: SwitchMonitor,
    trigger: ResetTrigger,
}

async fn bench() -> Result<Bench, Box<dyn std::error::Error>> {
    let config = ServiceConfig::default();
    let pins = config.board_pins()?;

    let hardware = SimulatedHardware::new(30);
    let mut device: Box<dyn WatchdogDevice> = Box::new(hardware.open()?);
    device.feed()?;
    let (watchdog, _owner) = owner::spawn(device, Some(Instant::now()));

    let chip = MockExpander::new();
    let (expander, _task) = spawn_expander(chip.clone());
    expander.configure_input(pins.switch).await?;

    let monitor = SwitchMonitor {
        expander,
        indicators: None,
        pin: pins.switch,
        pressed_level: config.switch.pressed_level,
        poll_interval: config.switch.poll_interval(),
        debounce_samples: config.switch.debounce_samples,
        hold_threshold: config.policy.hold_threshold(),
    };
    let trigger = ResetTrigger::new(watchdog.clone(), config.policy.reset_deadline());
    Ok(Bench {
        hardware,
        chip,
        watchdog,
        monitor,
        trigger,
    })
}

async fn bench_with_indicators() -> Result<(Bench, Indicators), Box<dyn std::error::Error>> {
    let mut bench = bench().await?;
    let config = ServiceConfig::default();
    let pins = config.board_pins()?;
    let leds = Indicators::new(bench.monitor.expander.clone(), &pins, config.indicators);
    leds.initialize(pins.switch).await?;
    bench.monitor.indicators = Some(leds.clone());
    Ok((bench, leds))
}

/// Disarm through the kept handle and check that nothing forced a reset.
async fn assert_disarmed_without_reset(
    watchdog: &WatchdogHandle,
    hardware: &SimulatedHardware,
) -> TestResult {
    watchdog.close_gracefully().await?;
    assert_eq!(hardware.count(DeviceEvent::Disarmed), 1);
    assert_eq!(hardware.count(DeviceEvent::ForcedClose), 0);
    assert!(!hardware.is_armed());
    Ok(())
}

/// Scenario: a single-sample glitch on the switch line.
/// Expected: the debouncer swallows it and no press is reported.
#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_glitch_is_debounced() -> TestResult {
    let bench = bench().await?;
    let pin = bench.monitor.pin;
    let (stop, token) = shutdown::channel();
    let task = tokio::spawn(
        bench
            .monitor
            .run(bench.trigger, token)
            .in_current_span(),
    );

    tokio::time::sleep(Duration::from_millis(1_050)).await;
    bench.chip.set_input(pin, Level::Low);
    tokio::time::sleep(Duration::from_millis(100)).await;
    bench.chip.set_input(pin, Level::High);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(bench.hardware.count(DeviceEvent::ForcedClose), 0);

    stop.trigger();
    let outcome = task.await?;
    assert!(matches!(outcome, MonitorOutcome::Stopped));
    assert!(!logs_contain("Reset switch pressed"));
    assert!(!logs_contain("Forcing hardware reset"));
    assert_disarmed_without_reset(&bench.watchdog, &bench.hardware).await
}

/// Scenario: the switch is held for six seconds with a five second threshold.
/// Expected: the monitor forces exactly one close and reports the pending reset.
#[tokio::test(start_paused = true)]
async fn test_hold_triggers_forced_close() -> TestResult {
    let bench = bench().await?;
    let pin = bench.monitor.pin;
    let (_stop, token) = shutdown::channel();
    bench.chip.set_input(pin, Level::Low);

    let started = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_secs(7),
        bench.monitor.run(bench.trigger, token),
    )
    .await?;

    let pending = match outcome {
        MonitorOutcome::ResetTriggered(pending) => pending,
        MonitorOutcome::Stopped => return Err("monitor stopped without firing".into()),
    };
    let fired_after = pending.fired_at().saturating_duration_since(started);
    assert!(fired_after >= Duration::from_secs(5));
    assert!(fired_after < Duration::from_secs(6));
    assert_eq!(bench.hardware.count(DeviceEvent::ForcedClose), 1);
    assert_eq!(bench.hardware.count(DeviceEvent::Disarmed), 0);
    Ok(())
}

/// Scenario: the switch cannot be read for ten seconds while held, then the
/// bus comes back with the switch released.
/// Expected: failed reads count as released, so no reset happens. The outage
/// is warned about once, not once per sample, and the recovery is logged.
#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_unreadable_switch_never_resets() -> TestResult {
    let bench = bench().await?;
    let pin = bench.monitor.pin;
    bench.chip.set_input(pin, Level::Low);
    bench.chip.set_failing(true);
    let (stop, token) = shutdown::channel();
    let task = tokio::spawn(
        bench
            .monitor
            .run(bench.trigger, token)
            .in_current_span(),
    );

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(bench.hardware.count(DeviceEvent::ForcedClose), 0);
    assert!(logs_contain("Reset switch unreadable"));
    logs_assert(|lines: &[&str]| {
        let warnings = lines
            .iter()
            .filter(|line| line.contains("Reset switch unreadable"))
            .count();
        if warnings == 1 {
            Ok(())
        } else {
            Err(format!("expected one unreadable warning, got {warnings}"))
        }
    });

    bench.chip.set_input(pin, Level::High);
    bench.chip.set_failing(false);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(logs_contain("Reset switch readable again"));

    stop.trigger();
    assert!(matches!(task.await?, MonitorOutcome::Stopped));
    assert!(!logs_contain("Reset switch pressed"));
    assert!(!logs_contain("Forcing hardware reset"));
    assert_disarmed_without_reset(&bench.watchdog, &bench.hardware).await
}

/// Scenario: the heartbeat has escalated to the critical pattern and the
/// operator taps the switch for two seconds.
/// Expected: the aborted hold leaves the status LED dark.
#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_short_press_keeps_critical_pattern() -> TestResult {
    let (bench, leds) = bench_with_indicators().await?;
    let pin = bench.monitor.pin;
    let status = ServiceConfig::default().board_pins()?.status_led;
    leds.set_critical(true).await;
    assert!(!bench.chip.output_high(status));

    let (stop, token) = shutdown::channel();
    let task = tokio::spawn(
        bench
            .monitor
            .run(bench.trigger, token)
            .in_current_span(),
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    bench.chip.set_input(pin, Level::Low);
    tokio::time::sleep(Duration::from_secs(2)).await;
    bench.chip.set_input(pin, Level::High);
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(logs_contain("reset aborted"));
    assert!(!bench.chip.output_high(status));

    stop.trigger();
    assert!(matches!(task.await?, MonitorOutcome::Stopped));
    assert!(!bench.chip.output_high(status));
    assert_disarmed_without_reset(&bench.watchdog, &bench.hardware).await
}

/// Scenario: the same short press with the heartbeat healthy.
/// Expected: the status LED is lit again after the abort.
#[tokio::test(start_paused = true)]
async fn test_short_press_restores_status_led() -> TestResult {
    let (bench, _leds) = bench_with_indicators().await?;
    let pin = bench.monitor.pin;
    let status = ServiceConfig::default().board_pins()?.status_led;
    assert!(bench.chip.output_high(status));

    let (stop, token) = shutdown::channel();
    let task = tokio::spawn(bench.monitor.run(bench.trigger, token));

    tokio::time::sleep(Duration::from_millis(500)).await;
    bench.chip.set_input(pin, Level::Low);
    tokio::time::sleep(Duration::from_secs(2)).await;
    bench.chip.set_input(pin, Level::High);
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(bench.chip.output_high(status));
    stop.trigger();
    assert!(matches!(task.await?, MonitorOutcome::Stopped));
    assert_disarmed_without_reset(&bench.watchdog, &bench.hardware).await
}

/// Scenario: the pending reset outlives its deadline.
#[tokio::test(start_paused = true)]
async fn test_pending_reset_reports_failure_after_deadline() -> TestResult {
    let bench = bench().await?;
    let pending = bench.trigger.fire("test").await;
    let fired_at = pending.fired_at();

    let err = pending.wait().await;
    let waited = Instant::now().saturating_duration_since(fired_at);
    assert_eq!(waited, Duration::from_secs(40));
    assert!(err.to_string().contains("reset failed"));
    assert_eq!(err.exit_status(), 1);
    Ok(())
}

//! End-to-end supervisor runs against the simulated board, on paused time.

use std::time::Duration;

use tcoguard_gpio::{Level, MockExpander, PinRef};
use tcoguard_hardware_watchdog::{DeviceEvent, SimulatedHardware};
use tcoguard_service::{ServiceConfig, ServiceError, SimulatedPlatform, Supervisor};
use tracing_test::traced_test;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn board() -> Result<(SimulatedPlatform, MockExpander, ServiceConfig), Box<dyn std::error::Error>> {
    let platform = SimulatedPlatform::new(30);
    let chip = platform.expander.clone().ok_or("simulated platform without expander")?;
    Ok((platform, chip, ServiceConfig::default()))
}

fn switch_pin() -> Result<PinRef, Box<dyn std::error::Error>> {
    Ok(ServiceConfig::default().board_pins()?.switch)
}

/// Scenario: the operator taps the switch for three seconds.
/// Expected: the reset is aborted, and a later stop disarms the watchdog.
#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_short_press_aborts_reset() -> TestResult {
    let (platform, chip, config) = board()?;
    let hardware = platform.hardware.clone();
    let switch = switch_pin()?;
    let supervisor = Supervisor::new(config, platform)?;

    let result = supervisor
        .run_until(async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            chip.set_input(switch, Level::Low);
            tokio::time::sleep(Duration::from_secs(3)).await;
            chip.set_input(switch, Level::High);
            tokio::time::sleep(Duration::from_secs(2)).await;
            "test stop"
        })
        .await;

    assert!(matches!(result, Ok(())));
    assert!(logs_contain("Reset switch pressed"));
    assert!(logs_contain("reset aborted"));
    assert_eq!(hardware.count(DeviceEvent::ForcedClose), 0);
    assert_eq!(hardware.count(DeviceEvent::Disarmed), 1);
    assert!(!hardware.is_armed());
    Ok(())
}

/// Scenario: the switch is held well past the five second threshold.
/// Expected: exactly one forced close, no feeds after it, and the hardware
/// fires once its countdown runs out. The run itself ends with
/// `ResetFailed` because the simulated host never goes away.
#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_long_hold_forces_single_reset() -> TestResult {
    let (platform, chip, config) = board()?;
    let hardware = platform.hardware.clone();
    let switch = switch_pin()?;
    let supervisor = Supervisor::new(config, platform)?;

    let result = supervisor
        .run_until(async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            chip.set_input(switch, Level::Low);
            std::future::pending::<()>().await;
            "unreachable"
        })
        .await;

    assert!(matches!(result, Err(ServiceError::ResetFailed { waited_secs: 40 })));
    assert!(logs_contain("Forcing hardware reset"));

    let events = hardware.events();
    let forced_at = events
        .iter()
        .position(|e| *e == DeviceEvent::ForcedClose)
        .ok_or("no forced close recorded")?;
    assert_eq!(hardware.count(DeviceEvent::ForcedClose), 1);
    assert_eq!(hardware.count(DeviceEvent::Disarmed), 0);
    assert!(
        events
            .iter()
            .skip(forced_at)
            .all(|e| *e != DeviceEvent::Fed),
        "feed after forced close: {events:?}"
    );

    assert!(hardware.is_armed());
    hardware.advance(Duration::from_secs(30));
    assert!(hardware.has_fired());
    Ok(())
}

/// Scenario: a plain stop request with the switch untouched.
/// Expected: feeds happened on cadence, both LEDs end dark and the timer is
/// disarmed. The feed never counts as stale.
#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_graceful_stop_disarms_and_clears_leds() -> TestResult {
    let (platform, chip, config) = board()?;
    let hardware = platform.hardware.clone();
    let pins = config.board_pins()?;
    let supervisor = Supervisor::new(config, platform)?;

    supervisor
        .run_until(async {
            tokio::time::sleep(Duration::from_millis(25_500)).await;
            "test stop"
        })
        .await?;

    // Startup feed, then 10s and 20s.
    assert_eq!(hardware.count(DeviceEvent::Fed), 3);
    assert_eq!(hardware.events().last(), Some(&DeviceEvent::Disarmed));
    assert!(!hardware.is_armed());
    assert!(!chip.output_high(pins.status_led));
    assert!(!chip.output_high(pins.heartbeat_led));
    assert!(chip.is_input(pins.switch));
    assert!(!logs_contain("twice the feed interval"));
    Ok(())
}

/// Scenario: every feed fails from startup on, including the first one.
/// Expected: the staleness check measures from startup and warns once the
/// gap passes twice the feed interval, while the run still stops cleanly.
#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_failing_feeds_are_reported_stale() -> TestResult {
    let platform = SimulatedPlatform::new(30);
    let hardware = platform.hardware.clone();
    hardware.fail_next_feeds(100);
    let supervisor = Supervisor::new(ServiceConfig::default(), platform)?;

    supervisor
        .run_until(async {
            tokio::time::sleep(Duration::from_secs(19)).await;
            assert!(!logs_contain("twice the feed interval"));
            tokio::time::sleep(Duration::from_secs(11)).await;
            "test stop"
        })
        .await?;

    assert!(logs_contain("Initial watchdog feed"));
    assert!(hardware.count(DeviceEvent::FeedFailed) >= 3);
    assert!(logs_contain("No watchdog feed for more than twice the feed interval"));
    assert_eq!(hardware.count(DeviceEvent::Fed), 0);
    assert_eq!(hardware.count(DeviceEvent::Disarmed), 1);
    Ok(())
}

/// Scenario: the configured timeout is applied before the first feed.
#[tokio::test(start_paused = true)]
async fn test_startup_order() -> TestResult {
    let (platform, _chip, config) = board()?;
    let hardware = platform.hardware.clone();
    let supervisor = Supervisor::new(config, platform)?;

    supervisor.run_until(async { "test stop" }).await?;

    let events = hardware.events();
    assert_eq!(
        events.get(..3),
        Some(&[DeviceEvent::Opened, DeviceEvent::TimeoutSet(30), DeviceEvent::Fed][..])
    );
    Ok(())
}

/// Scenario: there is no watchdog device.
/// Expected: the run fails with the "no device" exit status and the LEDs
/// that were already lit are turned off again.
#[tokio::test(start_paused = true)]
async fn test_missing_watchdog_is_fatal() -> TestResult {
    let chip = MockExpander::new();
    let platform = SimulatedPlatform {
        hardware: SimulatedHardware::absent(),
        expander: Some(chip.clone()),
    };
    let config = ServiceConfig::default();
    let pins = config.board_pins()?;
    let supervisor = Supervisor::new(config, platform)?;

    let result = supervisor.run_until(std::future::pending()).await;

    let err = match result {
        Err(e) => e,
        Ok(()) => return Err("supervisor started without a watchdog".into()),
    };
    assert_eq!(err.exit_status(), 2);
    assert!(!chip.output_high(pins.status_led));
    Ok(())
}

/// Scenario: the expander bus is missing.
/// Expected: the watchdog is still fed and the gap is logged once.
#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_runs_without_expander() -> TestResult {
    let platform = SimulatedPlatform {
        hardware: SimulatedHardware::new(30),
        expander: None,
    };
    let hardware = platform.hardware.clone();
    let supervisor = Supervisor::new(ServiceConfig::default(), platform)?;

    supervisor
        .run_until(async {
            tokio::time::sleep(Duration::from_millis(20_500)).await;
            "test stop"
        })
        .await?;

    assert!(logs_contain("Expander unavailable"));
    assert!(logs_contain("switch-triggered reset disabled"));
    assert_eq!(hardware.count(DeviceEvent::Fed), 3);
    assert_eq!(hardware.count(DeviceEvent::Disarmed), 1);
    Ok(())
}

/// Scenario: the driver cannot change its timeout.
/// Expected: the run continues at the driver default.
#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_fixed_timeout_is_not_fatal() -> TestResult {
    let platform = SimulatedPlatform {
        hardware: SimulatedHardware::with_fixed_timeout(60),
        expander: Some(MockExpander::new()),
    };
    let hardware = platform.hardware.clone();
    let supervisor = Supervisor::new(ServiceConfig::default(), platform)?;

    supervisor.run_until(async { "test stop" }).await?;

    assert!(logs_contain("keeping driver default"));
    assert_eq!(hardware.count(DeviceEvent::TimeoutSet(30)), 0);
    assert_eq!(hardware.count(DeviceEvent::Fed), 1);
    Ok(())
}

/// Scenario: a driver whose fixed timeout does not exceed the feed interval.
/// Expected: a critical log, but the service still runs.
#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_short_driver_timeout_is_critical() -> TestResult {
    let platform = SimulatedPlatform {
        hardware: SimulatedHardware::with_fixed_timeout(10),
        expander: Some(MockExpander::new()),
    };
    let supervisor = Supervisor::new(ServiceConfig::default(), platform)?;

    supervisor.run_until(async { "test stop" }).await?;

    assert!(logs_contain("Driver timeout does not exceed the feed interval"));
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected_up_front() {
    let mut config = ServiceConfig::default();
    config.policy.hold_threshold_secs = 0;
    let result = Supervisor::new(config, SimulatedPlatform::new(30));
    assert!(matches!(result, Err(ref e) if e.exit_status() == 3));
}

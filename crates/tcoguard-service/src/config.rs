//! Service configuration loaded from JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tcoguard_gpio::{DEFAULT_ADDRESS, Level, PinRef};
use tcoguard_hardware_watchdog::ResetPolicy;
use tcoguard_hardware_watchdog::sysfs::DEFAULT_SYSFS_DIR;
use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/tcoguard/config.json";

/// Complete supervisor configuration.
///
/// Every section falls back to its defaults, so a partial file only needs
/// the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Watchdog device location.
    pub watchdog: WatchdogSettings,
    /// Timeout, feed cadence and hold threshold.
    pub policy: ResetPolicy,
    /// I2C expander location.
    pub expander: ExpanderSettings,
    /// Which expander pins carry the switch and the LEDs.
    pub pins: PinLayout,
    /// Reset switch sampling.
    pub switch: SwitchSettings,
    /// Warning blink pattern.
    pub indicators: IndicatorSettings,
    /// Heartbeat task cadence.
    pub heartbeat: HeartbeatSettings,
    /// Supervisor loop cadence.
    pub supervisor: SupervisorSettings,
}

/// Where the watchdog lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSettings {
    /// Character device node.
    pub device: PathBuf,
    /// Sysfs attribute directory for the same device.
    pub sysfs_dir: PathBuf,
    /// Kernel module expected to drive it.
    pub module: String,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/watchdog"),
            sysfs_dir: PathBuf::from(DEFAULT_SYSFS_DIR),
            module: "iTCO_wdt".to_string(),
        }
    }
}

/// Where the GPIO expander lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpanderSettings {
    /// i2c-dev bus node.
    pub bus: PathBuf,
    /// 7-bit bus address.
    pub address: u16,
}

impl Default for ExpanderSettings {
    fn default() -> Self {
        Self {
            bus: PathBuf::from("/dev/i2c-2"),
            address: DEFAULT_ADDRESS,
        }
    }
}

/// Unvalidated `port.bit` pin coordinates as written in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSpec {
    /// Expander port (0 or 1).
    pub port: u8,
    /// Bit within the port (0-7).
    pub bit: u8,
}

impl PinSpec {
    const fn new(port: u8, bit: u8) -> Self {
        Self { port, bit }
    }
}

/// Pin assignment of the carrier board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinLayout {
    /// Reset switch input.
    pub switch: PinSpec,
    /// Status LED output.
    pub status_led: PinSpec,
    /// Heartbeat LED output.
    pub heartbeat_led: PinSpec,
}

impl Default for PinLayout {
    fn default() -> Self {
        Self {
            switch: PinSpec::new(1, 7),
            status_led: PinSpec::new(1, 2),
            heartbeat_led: PinSpec::new(1, 3),
        }
    }
}

/// Validated pin assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardPins {
    /// Reset switch input.
    pub switch: PinRef,
    /// Status LED output.
    pub status_led: PinRef,
    /// Heartbeat LED output.
    pub heartbeat_led: PinRef,
}

impl PinLayout {
    /// Check every pin exists and no pin is used twice.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the offending pin.
    pub fn resolve(&self) -> ServiceResult<BoardPins> {
        let resolve = |name: &str, spec: PinSpec| {
            PinRef::new(spec.port, spec.bit)
                .map_err(|e| ServiceError::invalid_config(format!("pins.{name}: {e}")))
        };
        let pins = BoardPins {
            switch: resolve("switch", self.switch)?,
            status_led: resolve("status_led", self.status_led)?,
            heartbeat_led: resolve("heartbeat_led", self.heartbeat_led)?,
        };
        if pins.switch == pins.status_led
            || pins.switch == pins.heartbeat_led
            || pins.status_led == pins.heartbeat_led
        {
            return Err(ServiceError::invalid_config(
                "pins.switch, pins.status_led and pins.heartbeat_led must be distinct",
            ));
        }
        Ok(pins)
    }
}

/// Reset switch sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchSettings {
    /// Electrical input level that means "pressed".
    ///
    /// Defaults to low: the input bit reads cleared while the button is held
    /// and set while it is released. Use `high` for wiring that reads set
    /// while held.
    pub pressed_level: Level,
    /// Milliseconds between switch samples.
    pub poll_interval_ms: u64,
    /// Consecutive equal samples before a level change is accepted.
    pub debounce_samples: u32,
}

impl Default for SwitchSettings {
    fn default() -> Self {
        Self {
            pressed_level: Level::Low,
            poll_interval_ms: 100,
            debounce_samples: 2,
        }
    }
}

impl SwitchSettings {
    /// Sampling period.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Warning blink pattern on the status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    /// Number of toggles in one warning burst.
    pub warning_blinks: u32,
    /// Milliseconds between toggles.
    pub warning_blink_ms: u64,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            warning_blinks: 10,
            warning_blink_ms: 100,
        }
    }
}

impl IndicatorSettings {
    /// Time between warning toggles.
    #[must_use]
    pub fn warning_period(&self) -> Duration {
        Duration::from_millis(self.warning_blink_ms)
    }
}

/// Heartbeat task cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatSettings {
    /// Milliseconds between heartbeat ticks.
    pub tick_ms: u64,
    /// Consecutive feed failures before the critical indicator state.
    pub max_feed_failures: u32,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            max_feed_failures: 3,
        }
    }
}

impl HeartbeatSettings {
    /// Tick period.
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Supervisor loop cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Seconds between feed staleness checks.
    pub staleness_check_secs: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            staleness_check_secs: 5,
        }
    }
}

impl SupervisorSettings {
    /// Staleness check period.
    #[must_use]
    pub fn staleness_check(&self) -> Duration {
        Duration::from_secs(self.staleness_check_secs)
    }
}

impl ServiceConfig {
    /// Load and validate configuration from `path`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigRead`, `ConfigParse` or `InvalidConfig` when the file
    /// exists but cannot be used.
    pub async fn load(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let path = path.as_ref();
        let config = match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let config: Self =
                    serde_json::from_str(&content).map_err(|source| ServiceError::ConfigParse {
                        path: path.to_path_buf(),
                        source,
                    })?;
                debug!(path = %path.display(), "Loaded config");
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ServiceError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid value.
    pub fn validate(&self) -> ServiceResult<()> {
        self.policy.validate()?;
        if !self.policy.has_recommended_cadence() {
            warn!(
                feed_interval_secs = self.policy.feed_interval_secs,
                timeout_secs = self.policy.timeout_secs,
                "Feed interval exceeds half the watchdog timeout; a single late feed may reset the host"
            );
        }
        self.pins.resolve()?;

        if self.expander.address > 0x7F {
            return Err(ServiceError::invalid_config(format!(
                "expander.address {:#x} is not a 7-bit address",
                self.expander.address
            )));
        }
        if self.switch.poll_interval_ms == 0 {
            return Err(ServiceError::invalid_config(
                "switch.poll_interval_ms must be greater than 0",
            ));
        }
        if self.switch.debounce_samples == 0 {
            return Err(ServiceError::invalid_config(
                "switch.debounce_samples must be at least 1",
            ));
        }
        if self.indicators.warning_blink_ms == 0 {
            return Err(ServiceError::invalid_config(
                "indicators.warning_blink_ms must be greater than 0",
            ));
        }
        if self.heartbeat.tick_ms == 0 {
            return Err(ServiceError::invalid_config(
                "heartbeat.tick_ms must be greater than 0",
            ));
        }
        if self.heartbeat.tick() > self.policy.feed_interval() {
            return Err(ServiceError::invalid_config(format!(
                "heartbeat.tick_ms ({}) must not exceed the feed interval ({}s)",
                self.heartbeat.tick_ms, self.policy.feed_interval_secs
            )));
        }
        if self.heartbeat.max_feed_failures == 0 {
            return Err(ServiceError::invalid_config(
                "heartbeat.max_feed_failures must be at least 1",
            ));
        }
        if self.supervisor.staleness_check_secs == 0 {
            return Err(ServiceError::invalid_config(
                "supervisor.staleness_check_secs must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Validated pin assignment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a pin does not exist or is reused.
    pub fn board_pins(&self) -> ServiceResult<BoardPins> {
        self.pins.resolve()
    }
}

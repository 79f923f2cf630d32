//! Where the supervisor gets its hardware from.

use core::fmt::Debug;

use tcoguard_gpio::{GpioResult, MockExpander, RegisterPort};
use tcoguard_hardware_watchdog::{HardwareWatchdogResult, SimulatedHardware, WatchdogDevice};

use crate::config::{ExpanderSettings, WatchdogSettings};

/// Opens the expander bus and the watchdog device.
pub trait Platform: Send + Sync + Debug {
    /// Open the bus the expander sits on.
    ///
    /// # Errors
    ///
    /// Returns `BusOpen` or `AddressSelect` when the expander is unreachable.
    fn open_expander(&self, settings: &ExpanderSettings) -> GpioResult<Box<dyn RegisterPort>>;

    /// Open, and thereby arm, the watchdog.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` when there is no usable device.
    fn open_watchdog(
        &self,
        settings: &WatchdogSettings,
    ) -> HardwareWatchdogResult<Box<dyn WatchdogDevice>>;
}

/// The real board: i2c-dev and the kernel watchdog node.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxPlatform;

#[cfg(target_os = "linux")]
impl Platform for LinuxPlatform {
    fn open_expander(&self, settings: &ExpanderSettings) -> GpioResult<Box<dyn RegisterPort>> {
        let port = tcoguard_gpio::I2cDevPort::open(&settings.bus, settings.address)?;
        Ok(Box::new(port))
    }

    fn open_watchdog(
        &self,
        settings: &WatchdogSettings,
    ) -> HardwareWatchdogResult<Box<dyn WatchdogDevice>> {
        let device = tcoguard_hardware_watchdog::LinuxWatchdog::open(&settings.device)?;
        Ok(Box::new(device))
    }
}

/// In-memory chips, for tests and `--simulate` runs.
#[derive(Debug, Clone)]
pub struct SimulatedPlatform {
    /// The simulated watchdog chip.
    pub hardware: SimulatedHardware,
    /// The simulated expander; `None` behaves as an absent bus.
    pub expander: Option<MockExpander>,
}

impl SimulatedPlatform {
    /// Both chips present, watchdog defaulting to `driver_default_secs`.
    #[must_use]
    pub fn new(driver_default_secs: u32) -> Self {
        Self {
            hardware: SimulatedHardware::new(driver_default_secs),
            expander: Some(MockExpander::new()),
        }
    }
}

impl Platform for SimulatedPlatform {
    fn open_expander(&self, settings: &ExpanderSettings) -> GpioResult<Box<dyn RegisterPort>> {
        match &self.expander {
            Some(chip) => Ok(Box::new(chip.clone())),
            None => Err(tcoguard_gpio::GpioError::BusOpen {
                path: settings.bus.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }

    fn open_watchdog(
        &self,
        _settings: &WatchdogSettings,
    ) -> HardwareWatchdogResult<Box<dyn WatchdogDevice>> {
        Ok(Box::new(self.hardware.open()?))
    }
}

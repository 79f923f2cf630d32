//! Prelude for tcoguard-hardware-watchdog.
//!
//! This module re-exports the most commonly used types for convenient importing.

pub use crate::config::{ResetPolicy, ResetPolicyBuilder};
pub use crate::error::{HardwareWatchdogError, HardwareWatchdogResult};
#[cfg(target_os = "linux")]
pub use crate::linux::LinuxWatchdog;
pub use crate::simulated::{DeviceEvent, SimulatedHardware, SimulatedWatchdog};
pub use crate::state::{WatchdogMetrics, WatchdogStatus};
pub use crate::sysfs::WatchdogAttributes;
pub use crate::watchdog::{DISARM_TOKEN, FEED_TOKEN, WatchdogDevice};

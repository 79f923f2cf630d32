//! # tcoguard-hardware-watchdog
//!
//! Handle on the chipset watchdog timer of a single-board computer.
//!
//! This crate provides:
//! - `WatchdogDevice` trait with a consuming graceful close (disarm token)
//!   and a consuming forced close (no token, reset pending)
//! - `LinuxWatchdog` for `/dev/watchdog` style character devices
//! - `SimulatedHardware` / `SimulatedWatchdog` for tests and hardware-free runs
//! - `ResetPolicy` carrying the timeout, feed cadence and hold threshold
//! - `WatchdogAttributes` for the read-only sysfs view
//!
//! ## Safety Guarantees
//!
//! - Opening a device arms it; nothing in this crate can feed a handle that
//!   has been closed, because both close operations consume it.
//! - `ResetPolicy` refuses a feed interval that is not strictly shorter than
//!   the timeout.
//!
//! ## Example
//!
//! ```rust
//! use tcoguard_hardware_watchdog::prelude::*;
//!
//! let hardware = SimulatedHardware::new(60);
//! let mut watchdog = Box::new(hardware.open().expect("chip present"));
//!
//! watchdog.set_timeout(30).expect("configurable timeout");
//! watchdog.feed().expect("feed");
//! watchdog.close_gracefully().expect("disarm");
//!
//! assert!(!hardware.is_armed());
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod prelude;
pub mod simulated;
pub mod state;
pub mod sysfs;
pub mod watchdog;

pub use config::{ResetPolicy, ResetPolicyBuilder};
pub use error::{HardwareWatchdogError, HardwareWatchdogResult};
#[cfg(target_os = "linux")]
pub use linux::LinuxWatchdog;
pub use simulated::{DeviceEvent, SimulatedHardware, SimulatedWatchdog};
pub use state::{WatchdogMetrics, WatchdogStatus};
pub use sysfs::WatchdogAttributes;
pub use watchdog::{DISARM_TOKEN, FEED_TOKEN, WatchdogDevice};

//! # tcoguard-service
//!
//! Supervisor daemon for the chipset watchdog and the expander-attached
//! reset switch.
//!
//! The daemon keeps the watchdog fed on a fixed cadence and blinks a
//! heartbeat LED. Holding the reset switch past the configured threshold
//! closes the watchdog without disarming it, so the hardware resets the
//! host. A clean stop disarms the watchdog and turns both LEDs off.
//!
//! - [`Supervisor`] composes everything and owns startup and cleanup
//! - [`owner`] serializes feeds and the forced close on one device
//! - [`heartbeat`] and [`switch_monitor`] are the two periodic tasks
//! - [`commands`] holds the operator subcommands

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]

pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod heartbeat;
pub mod indicators;
pub mod owner;
pub mod platform;
pub mod shutdown;
pub mod signals;
pub mod supervisor;
pub mod switch_monitor;

pub use config::{BoardPins, DEFAULT_CONFIG_PATH, ServiceConfig};
pub use error::{ServiceError, ServiceResult};
#[cfg(target_os = "linux")]
pub use platform::LinuxPlatform;
pub use platform::{Platform, SimulatedPlatform};
pub use supervisor::{ArmedWatchdog, Supervisor, arm_watchdog};

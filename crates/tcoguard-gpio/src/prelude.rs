//! Prelude for tcoguard-gpio.
//!
//! This module re-exports the most commonly used types for convenient importing.

pub use crate::actor::{ExpanderHandle, spawn as spawn_expander};
pub use crate::error::{GpioError, GpioResult};
#[cfg(target_os = "linux")]
pub use crate::i2c::I2cDevPort;
pub use crate::mock::MockExpander;
pub use crate::pca9555::{Level, Pca9555, PinRef};
pub use crate::port::RegisterPort;

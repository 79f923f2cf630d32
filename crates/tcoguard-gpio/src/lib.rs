//! # tcoguard-gpio
//!
//! PCA9555 I2C GPIO expander access for the reset switch and indicator LEDs.
//!
//! This crate provides:
//! - `RegisterPort` trait for byte-register bus access
//! - `I2cDevPort` over Linux `/dev/i2c-N`
//! - `MockExpander` register file for tests and hardware-free runs
//! - `Pca9555` pin-level driver (direction, level reads, output latches)
//! - `actor::spawn` / `ExpanderHandle`, the single owner of the bus
//!
//! ## Example
//!
//! ```rust
//! use tcoguard_gpio::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), GpioError> {
//! let chip = MockExpander::new();
//! let (expander, task) = spawn_expander(chip.clone());
//!
//! let status = PinRef::new(1, 2)?;
//! expander.configure_output(status).await?;
//! expander.set_output(status, true).await?;
//! assert!(chip.output_high(status));
//!
//! expander.release().await?;
//! # let _ = task.await;
//! # Ok(())
//! # }
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

pub mod actor;
pub mod error;
#[cfg(target_os = "linux")]
pub mod i2c;
pub mod mock;
pub mod pca9555;
pub mod port;
pub mod prelude;

pub use actor::{ExpanderHandle, spawn as spawn_expander};
pub use error::{GpioError, GpioResult};
#[cfg(target_os = "linux")]
pub use i2c::I2cDevPort;
pub use mock::MockExpander;
pub use pca9555::{DEFAULT_ADDRESS, Level, Pca9555, PinRef};
pub use port::RegisterPort;

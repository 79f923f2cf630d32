//! PCA9555 16-bit I/O expander register model.
//!
//! Two 8-pin ports, each with an input, output, polarity-inversion and
//! configuration register. A configuration bit of 1 makes the pin an input,
//! 0 an output. Polarity inversion is left at its power-on default.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GpioError, GpioResult};
use crate::port::RegisterPort;

/// Default 7-bit bus address with A0..A2 tied low.
pub const DEFAULT_ADDRESS: u16 = 0x20;

/// Input register of port 0.
pub const INPUT_PORT_0: u8 = 0x00;
/// Input register of port 1.
pub const INPUT_PORT_1: u8 = 0x01;
/// Output register of port 0.
pub const OUTPUT_PORT_0: u8 = 0x02;
/// Output register of port 1.
pub const OUTPUT_PORT_1: u8 = 0x03;
/// Configuration (direction) register of port 0.
pub const CONFIG_PORT_0: u8 = 0x06;
/// Configuration (direction) register of port 1.
pub const CONFIG_PORT_1: u8 = 0x07;

/// Number of registers on the chip.
pub const REGISTER_COUNT: usize = 8;

/// Electrical level of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Logic 0.
    Low,
    /// Logic 1.
    High,
}

impl Level {
    /// Level of `bit` in a register value.
    #[must_use]
    pub fn of_bit(value: u8, mask: u8) -> Self {
        if value & mask == 0 {
            Self::Low
        } else {
            Self::High
        }
    }
}

/// One pin of the expander, addressed as `port.bit`.
///
/// Only constructible through [`PinRef::new`], so every value names a pin
/// that exists on the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinRef {
    port: u8,
    bit: u8,
}

impl PinRef {
    /// Create a pin reference.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPin` unless `port` is 0 or 1 and `bit` is 0-7.
    pub fn new(port: u8, bit: u8) -> GpioResult<Self> {
        if port > 1 || bit > 7 {
            return Err(GpioError::InvalidPin { port, bit });
        }
        Ok(Self { port, bit })
    }

    /// Port number (0 or 1).
    #[must_use]
    pub fn port(self) -> u8 {
        self.port
    }

    /// Bit within the port (0-7).
    #[must_use]
    pub fn bit(self) -> u8 {
        self.bit
    }

    /// Single-bit mask for this pin within its port registers.
    #[must_use]
    pub fn mask(self) -> u8 {
        1 << self.bit
    }

    /// Input register holding this pin.
    #[must_use]
    pub fn input_register(self) -> u8 {
        if self.port == 0 { INPUT_PORT_0 } else { INPUT_PORT_1 }
    }

    /// Output register holding this pin.
    #[must_use]
    pub fn output_register(self) -> u8 {
        if self.port == 0 { OUTPUT_PORT_0 } else { OUTPUT_PORT_1 }
    }

    /// Configuration register holding this pin.
    #[must_use]
    pub fn config_register(self) -> u8 {
        if self.port == 0 { CONFIG_PORT_0 } else { CONFIG_PORT_1 }
    }
}

impl fmt::Display for PinRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.port, self.bit)
    }
}

/// Pin-level operations on a PCA9555 behind a [`RegisterPort`].
///
/// Every write is a read-modify-write of the whole 8-bit register, so a
/// single owner must serialize access; see [`crate::actor`].
#[derive(Debug)]
pub struct Pca9555<P> {
    port: P,
}

impl<P: RegisterPort> Pca9555<P> {
    /// Wrap a register port.
    pub fn new(port: P) -> Self {
        Self { port }
    }

    /// Make `pin` an input.
    ///
    /// # Errors
    ///
    /// Returns `PortAccess` if the configuration register cannot be updated.
    pub fn configure_input(&mut self, pin: PinRef) -> GpioResult<()> {
        self.modify(pin.config_register(), |config| config | pin.mask())
    }

    /// Make `pin` an output.
    ///
    /// # Errors
    ///
    /// Returns `PortAccess` if the configuration register cannot be updated.
    pub fn configure_output(&mut self, pin: PinRef) -> GpioResult<()> {
        self.modify(pin.config_register(), |config| config & !pin.mask())
    }

    /// Read the electrical level on `pin`.
    ///
    /// # Errors
    ///
    /// Returns `PortAccess` if the input register cannot be read.
    pub fn read_level(&mut self, pin: PinRef) -> GpioResult<Level> {
        let value = self.port.read_register(pin.input_register())?;
        Ok(Level::of_bit(value, pin.mask()))
    }

    /// Drive output `pin` high (`true`) or low.
    ///
    /// # Errors
    ///
    /// Returns `PortAccess` if the output register cannot be updated.
    pub fn set_output(&mut self, pin: PinRef, high: bool) -> GpioResult<()> {
        self.modify(pin.output_register(), |output| {
            if high {
                output | pin.mask()
            } else {
                output & !pin.mask()
            }
        })
    }

    fn modify(&mut self, register: u8, f: impl FnOnce(u8) -> u8) -> GpioResult<()> {
        let current = self.port.read_register(register)?;
        let next = f(current);
        if next != current {
            self.port.write_register(register, next)?;
        }
        Ok(())
    }
}

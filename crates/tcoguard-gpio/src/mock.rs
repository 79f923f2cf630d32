//! In-memory PCA9555 for tests and hardware-free runs.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{GpioError, GpioResult};
use crate::pca9555::{
    CONFIG_PORT_0, CONFIG_PORT_1, INPUT_PORT_0, INPUT_PORT_1, Level, OUTPUT_PORT_0, OUTPUT_PORT_1,
    PinRef, REGISTER_COUNT,
};
use crate::port::RegisterPort;

#[derive(Debug)]
struct Inner {
    registers: [u8; REGISTER_COUNT],
    writes: Vec<(u8, u8)>,
    failing: bool,
    fail_next: u32,
}

/// Shared register file standing in for the chip.
///
/// Clones observe the same registers, so a test can keep one clone while
/// handing another to the code under test. Power-on state matches the
/// datasheet: all pins inputs, output latches high, inputs pulled high.
#[derive(Debug, Clone)]
pub struct MockExpander {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MockExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExpander {
    /// Chip in its power-on state.
    #[must_use]
    pub fn new() -> Self {
        let mut registers = [0u8; REGISTER_COUNT];
        for register in [
            INPUT_PORT_0,
            INPUT_PORT_1,
            OUTPUT_PORT_0,
            OUTPUT_PORT_1,
            CONFIG_PORT_0,
            CONFIG_PORT_1,
        ] {
            if let Some(slot) = registers.get_mut(usize::from(register)) {
                *slot = 0xFF;
            }
        }
        Self {
            inner: Arc::new(Mutex::new(Inner {
                registers,
                writes: Vec::new(),
                failing: false,
                fail_next: 0,
            })),
        }
    }

    /// Current value of `register` (0 for addresses past the chip).
    #[must_use]
    pub fn register(&self, register: u8) -> u8 {
        self.inner
            .lock()
            .registers
            .get(usize::from(register))
            .copied()
            .unwrap_or(0)
    }

    /// Overwrite `register` without recording a bus write.
    pub fn set_register(&self, register: u8, value: u8) {
        if let Some(slot) = self.inner.lock().registers.get_mut(usize::from(register)) {
            *slot = value;
        }
    }

    /// Drive the external level seen on input `pin`.
    pub fn set_input(&self, pin: PinRef, level: Level) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.registers.get_mut(usize::from(pin.input_register())) {
            match level {
                Level::High => *slot |= pin.mask(),
                Level::Low => *slot &= !pin.mask(),
            }
        }
    }

    /// Whether output `pin` is latched high.
    #[must_use]
    pub fn output_high(&self, pin: PinRef) -> bool {
        self.register(pin.output_register()) & pin.mask() != 0
    }

    /// Whether `pin` is configured as an input.
    #[must_use]
    pub fn is_input(&self, pin: PinRef) -> bool {
        self.register(pin.config_register()) & pin.mask() != 0
    }

    /// Make every transaction fail until cleared, as if the chip were unplugged.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }

    /// Fail the next `count` transactions, then recover.
    pub fn fail_next(&self, count: u32) {
        self.inner.lock().fail_next = count;
    }

    /// Every successful register write, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.inner.lock().writes.clone()
    }

    fn check(inner: &mut Inner, register: u8) -> GpioResult<()> {
        if inner.failing {
            return Err(GpioError::port_access(
                register,
                io::Error::new(io::ErrorKind::NotConnected, "expander not responding"),
            ));
        }
        if inner.fail_next > 0 {
            inner.fail_next = inner.fail_next.saturating_sub(1);
            return Err(GpioError::port_access(
                register,
                io::Error::new(io::ErrorKind::TimedOut, "injected bus fault"),
            ));
        }
        Ok(())
    }
}

impl RegisterPort for MockExpander {
    fn read_register(&mut self, register: u8) -> GpioResult<u8> {
        let mut inner = self.inner.lock();
        Self::check(&mut inner, register)?;
        inner
            .registers
            .get(usize::from(register))
            .copied()
            .ok_or_else(|| {
                GpioError::port_access(register, io::Error::from(io::ErrorKind::InvalidInput))
            })
    }

    fn write_register(&mut self, register: u8, value: u8) -> GpioResult<()> {
        let mut inner = self.inner.lock();
        Self::check(&mut inner, register)?;
        let Some(slot) = inner.registers.get_mut(usize::from(register)) else {
            return Err(GpioError::port_access(
                register,
                io::Error::from(io::ErrorKind::InvalidInput),
            ));
        };
        *slot = value;
        inner.writes.push((register, value));
        Ok(())
    }
}

//! Byte-register access to a device on the bus.

use core::fmt::Debug;

use crate::error::GpioResult;

/// Single-register read and write on an addressed bus device.
///
/// Implementations block for the duration of one bus transaction, which is
/// well under a millisecond at 100 kHz.
pub trait RegisterPort: Send + Debug {
    /// Read one register.
    ///
    /// # Errors
    ///
    /// Returns `PortAccess` if the transaction fails.
    fn read_register(&mut self, register: u8) -> GpioResult<u8>;

    /// Write one register.
    ///
    /// # Errors
    ///
    /// Returns `PortAccess` if the transaction fails.
    fn write_register(&mut self, register: u8, value: u8) -> GpioResult<()>;
}

impl<P: RegisterPort + ?Sized> RegisterPort for Box<P> {
    fn read_register(&mut self, register: u8) -> GpioResult<u8> {
        (**self).read_register(register)
    }

    fn write_register(&mut self, register: u8, value: u8) -> GpioResult<()> {
        (**self).write_register(register, value)
    }
}

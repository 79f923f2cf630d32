//! Linux `i2c-dev` backend (`/dev/i2c-N`).
//!
//! The target address is bound once with `I2C_SLAVE`; afterwards plain
//! `read`/`write` on the descriptor become bus transactions.

#![expect(unsafe_code, reason = "I2C_SLAVE ioctl has no safe std wrapper")]

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{GpioError, GpioResult};
use crate::port::RegisterPort;

/// `I2C_SLAVE` from `include/uapi/linux/i2c-dev.h`.
const I2C_SLAVE: libc::c_ulong = 0x0703;

/// Register port over a kernel i2c-dev node.
#[derive(Debug)]
pub struct I2cDevPort {
    path: PathBuf,
    address: u16,
    file: File,
}

impl I2cDevPort {
    /// Open `bus` and bind it to the 7-bit `address`.
    ///
    /// # Errors
    ///
    /// Returns `BusOpen` if the node cannot be opened and `AddressSelect`
    /// if the kernel refuses the address.
    pub fn open(bus: impl AsRef<Path>, address: u16) -> GpioResult<Self> {
        let path = bus.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| GpioError::BusOpen {
                path: path.to_path_buf(),
                source,
            })?;

        // SAFETY: the descriptor is open for the lifetime of `file` and
        // I2C_SLAVE takes the address by value.
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), I2C_SLAVE, libc::c_ulong::from(address)) };
        if rc < 0 {
            return Err(GpioError::AddressSelect {
                address,
                source: std::io::Error::last_os_error(),
            });
        }

        debug!(bus = %path.display(), address = format_args!("{address:#04x}"), "Expander bus opened");
        Ok(Self {
            path: path.to_path_buf(),
            address,
            file,
        })
    }

    /// Bus node path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bound 7-bit address.
    #[must_use]
    pub fn address(&self) -> u16 {
        self.address
    }
}

impl RegisterPort for I2cDevPort {
    fn read_register(&mut self, register: u8) -> GpioResult<u8> {
        let mut value = [0u8; 1];
        self.file
            .write_all(&[register])
            .and_then(|()| self.file.read_exact(&mut value))
            .map_err(|e| GpioError::port_access(register, e))?;
        let [value] = value;
        trace!(register, value, "i2c read");
        Ok(value)
    }

    fn write_register(&mut self, register: u8, value: u8) -> GpioResult<()> {
        self.file
            .write_all(&[register, value])
            .map_err(|e| GpioError::port_access(register, e))?;
        trace!(register, value, "i2c write");
        Ok(())
    }
}

//! Error types for expander access.

use std::path::PathBuf;

use tcoguard_errors::{Classify, ErrorClass};

/// Errors that can occur while talking to the GPIO expander.
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    /// The I2C bus device could not be opened.
    #[error("I2C bus {} unavailable: {source}", path.display())]
    BusOpen {
        /// Bus device path.
        path: PathBuf,
        /// Underlying open error.
        #[source]
        source: std::io::Error,
    },

    /// Selecting the expander's bus address failed.
    #[error("Cannot address expander at {address:#04x}: {source}")]
    AddressSelect {
        /// 7-bit bus address.
        address: u16,
        /// Underlying ioctl error.
        #[source]
        source: std::io::Error,
    },

    /// A register read or write failed.
    #[error("Expander register {register:#04x} access failed: {source}")]
    PortAccess {
        /// Register address.
        register: u8,
        /// Underlying bus error.
        #[source]
        source: std::io::Error,
    },

    /// Pin outside the two 8-bit ports.
    #[error("Invalid pin {port}.{bit}: port must be 0-1, bit 0-7")]
    InvalidPin {
        /// Port number.
        port: u8,
        /// Offending bit.
        bit: u8,
    },

    /// The task owning the expander is gone.
    #[error("Expander owner task stopped")]
    ActorStopped,
}

impl GpioError {
    /// Create a port access error.
    #[must_use]
    pub fn port_access(register: u8, source: std::io::Error) -> Self {
        Self::PortAccess { register, source }
    }
}

impl Classify for GpioError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidPin { .. } => ErrorClass::Fatal,
            // Without the expander only the indicators are lost; switch reads
            // fail safe to "released" at the call site.
            Self::BusOpen { .. }
            | Self::AddressSelect { .. }
            | Self::PortAccess { .. }
            | Self::ActorStopped => ErrorClass::Cosmetic,
        }
    }
}

/// A specialized `Result` type for expander operations.
pub type GpioResult<T> = std::result::Result<T, GpioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GpioError::port_access(0x03, std::io::Error::other("NACK"));
        assert!(err.to_string().contains("0x03"));
        assert!(err.to_string().contains("NACK"));

        let err = GpioError::InvalidPin { port: 1, bit: 9 };
        assert_eq!(err.to_string(), "Invalid pin 1.9: port must be 0-1, bit 0-7");
    }

    #[test]
    fn test_port_errors_are_cosmetic() {
        let err = GpioError::port_access(0x01, std::io::Error::other("bus"));
        assert_eq!(err.class(), ErrorClass::Cosmetic);
        assert_eq!(GpioError::ActorStopped.class(), ErrorClass::Cosmetic);
        assert_eq!(
            GpioError::InvalidPin { port: 0, bit: 8 }.class(),
            ErrorClass::Fatal
        );
    }
}

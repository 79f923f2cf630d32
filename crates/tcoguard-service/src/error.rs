//! Service-level errors and process exit codes.

use std::path::PathBuf;

use tcoguard_gpio::GpioError;
use tcoguard_hardware_watchdog::HardwareWatchdogError;

/// Errors surfaced by the supervisor and the subcommands.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The configuration file exists but could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    ConfigRead {
        /// Config file path.
        path: PathBuf,
        /// Underlying read error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::ServiceConfig`].
    #[error("Failed to parse config file {}: {source}", path.display())]
    ConfigParse {
        /// Config file path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Watchdog device failure.
    #[error(transparent)]
    Watchdog(#[from] HardwareWatchdogError),

    /// Expander failure.
    #[error(transparent)]
    Gpio(#[from] GpioError),

    /// Installing a signal handler failed.
    #[error("Failed to install {signal} handler: {source}")]
    Signal {
        /// Signal name.
        signal: &'static str,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A forced close did not reset the host in time.
    #[error("Host still running {waited_secs}s after forced watchdog close; reset failed")]
    ResetFailed {
        /// Seconds waited after the close.
        waited_secs: u64,
    },
}

impl ServiceError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Process exit status for this error.
    ///
    /// 2 when no watchdog device is available, 3 for configuration problems,
    /// 1 for everything else.
    #[must_use]
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::Watchdog(HardwareWatchdogError::DeviceUnavailable { .. }) => 2,
            Self::ConfigRead { .. }
            | Self::ConfigParse { .. }
            | Self::InvalidConfig(_)
            | Self::Watchdog(HardwareWatchdogError::InvalidConfiguration(_))
            | Self::Gpio(GpioError::InvalidPin { .. }) => 3,
            _ => 1,
        }
    }
}

/// A specialized `Result` type for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

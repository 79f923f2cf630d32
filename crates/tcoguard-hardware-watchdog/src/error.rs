//! Error types for watchdog device operations.

use std::path::PathBuf;

use tcoguard_errors::{Classify, ErrorClass};

/// Errors that can occur while driving a watchdog device.
#[derive(Debug, thiserror::Error)]
pub enum HardwareWatchdogError {
    /// The device node is missing or could not be opened.
    #[error("Watchdog device {} unavailable: {source}", path.display())]
    DeviceUnavailable {
        /// Device path that was opened.
        path: PathBuf,
        /// Underlying open error.
        #[source]
        source: std::io::Error,
    },

    /// The driver refused to change the countdown length.
    #[error("Watchdog timeout of {requested}s not supported: {reason}")]
    ConfigurationUnsupported {
        /// Requested timeout in seconds.
        requested: u32,
        /// Driver-reported reason.
        reason: String,
    },

    /// Writing the keep-alive token failed.
    #[error("Watchdog feed failed: {0}")]
    FeedFailure(#[source] std::io::Error),

    /// Writing the disarm token failed; the timer is still counting.
    #[error("Watchdog disarm failed, timer remains armed: {0}")]
    DisarmFailed(#[source] std::io::Error),

    /// The handle was already closed, gracefully or forcefully.
    #[error("Watchdog handle is closed")]
    Closed,

    /// A device-control query failed.
    #[error("Watchdog query '{query}' failed: {source}")]
    QueryFailed {
        /// Name of the query.
        query: &'static str,
        /// Underlying ioctl error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid reset policy.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl HardwareWatchdogError {
    /// Create a device unavailable error.
    #[must_use]
    pub fn device_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DeviceUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration unsupported error.
    #[must_use]
    pub fn configuration_unsupported(requested: u32, reason: impl Into<String>) -> Self {
        Self::ConfigurationUnsupported {
            requested,
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

impl Classify for HardwareWatchdogError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::DeviceUnavailable { .. } | Self::InvalidConfiguration(_) => ErrorClass::Fatal,
            // The device is gone or its timer can no longer be stopped.
            Self::Closed | Self::DisarmFailed(_) => ErrorClass::Fatal,
            Self::ConfigurationUnsupported { .. } | Self::FeedFailure(_) => {
                ErrorClass::Recoverable
            }
            Self::QueryFailed { .. } => ErrorClass::Cosmetic,
        }
    }
}

/// A specialized `Result` type for watchdog device operations.
pub type HardwareWatchdogResult<T> = std::result::Result<T, HardwareWatchdogError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let err = HardwareWatchdogError::device_unavailable(
            "/dev/watchdog",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(err.to_string().contains("/dev/watchdog"));

        let err = HardwareWatchdogError::configuration_unsupported(30, "fixed by firmware");
        assert!(err.to_string().contains("30s"));
        assert!(err.to_string().contains("fixed by firmware"));

        assert_eq!(
            HardwareWatchdogError::Closed.to_string(),
            "Watchdog handle is closed"
        );
    }

    #[test]
    fn test_error_classes() {
        let err = HardwareWatchdogError::device_unavailable(
            "/dev/watchdog",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert_eq!(err.class(), ErrorClass::Fatal);

        let err = HardwareWatchdogError::configuration_unsupported(30, "fixed");
        assert_eq!(err.class(), ErrorClass::Recoverable);

        let err = HardwareWatchdogError::FeedFailure(io::Error::other("bus error"));
        assert_eq!(err.class(), ErrorClass::Recoverable);

        let err = HardwareWatchdogError::QueryFailed {
            query: "timeleft",
            source: io::Error::other("ENOTTY"),
        };
        assert_eq!(err.class(), ErrorClass::Cosmetic);
    }
}

//! Error classes and the disposition each one maps to.

use core::fmt;

/// How severe a failure is for the supervisor as a whole.
///
/// Ordered from least to most severe so classes can be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorClass {
    /// Only affects visual feedback (indicator writes).
    Cosmetic = 0,
    /// The operation can be retried on the next cycle.
    Recoverable = 1,
    /// No watchdog protection is possible; the supervisor must stop.
    Fatal = 2,
}

impl ErrorClass {
    /// The disposition the propagation policy assigns to this class.
    #[must_use]
    pub const fn disposition(self) -> Disposition {
        match self {
            ErrorClass::Cosmetic => Disposition::Swallow,
            ErrorClass::Recoverable => Disposition::Retry,
            ErrorClass::Fatal => Disposition::Propagate,
        }
    }

    /// Whether an error of this class leaves the supervisor running.
    #[must_use]
    pub const fn is_survivable(self) -> bool {
        !matches!(self, ErrorClass::Fatal)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Cosmetic => write!(f, "COSMETIC"),
            ErrorClass::Recoverable => write!(f, "RECOVERABLE"),
            ErrorClass::Fatal => write!(f, "FATAL"),
        }
    }
}

/// What the caller does with a failed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Drop the error after a debug log line.
    Swallow,
    /// Log a warning; the periodic caller tries again on its next tick.
    Retry,
    /// Hand the error back to the caller.
    Propagate,
}

/// Implemented by every error type that crosses a hardware seam.
pub trait Classify {
    /// The class of this particular error value.
    fn class(&self) -> ErrorClass;
}

//! The single propagation policy.

use core::fmt::Display;

use tracing::{debug, error, warn};

use crate::class::{Classify, Disposition};

/// Apply the propagation policy to `result`.
///
/// Returns `Ok(Some(value))` on success, `Ok(None)` when the error was
/// swallowed or deferred to the next cycle, and `Err` only for errors whose
/// class demands propagation.
///
/// # Errors
///
/// Returns the original error when its class disposition is
/// [`Disposition::Propagate`].
pub fn dispose<T, E>(result: Result<T, E>, context: &str) -> Result<Option<T>, E>
where
    E: Classify + Display,
{
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            let class = err.class();
            match class.disposition() {
                Disposition::Swallow => {
                    debug!(%class, "{context}: {err}");
                    Ok(None)
                }
                Disposition::Retry => {
                    warn!(%class, "{context}: {err}; retrying next cycle");
                    Ok(None)
                }
                Disposition::Propagate => {
                    error!(%class, "{context}: {err}");
                    Err(err)
                }
            }
        }
    }
}

/// Method form of [`dispose`].
pub trait DisposeExt<T, E> {
    /// See [`dispose`].
    ///
    /// # Errors
    ///
    /// Returns the original error when its class must propagate.
    fn dispose(self, context: &str) -> Result<Option<T>, E>;
}

impl<T, E> DisposeExt<T, E> for Result<T, E>
where
    E: Classify + Display,
{
    fn dispose(self, context: &str) -> Result<Option<T>, E> {
        dispose(self, context)
    }
}

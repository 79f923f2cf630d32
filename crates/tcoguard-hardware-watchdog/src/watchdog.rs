//! Watchdog device trait.
//!
//! A watchdog device is armed the moment it is opened. From then on the
//! hardware resets the host unless it is fed within the configured timeout,
//! regardless of what happens to this process. There are exactly two ways
//! to give the handle up:
//!
//! ```text
//! open ──► Armed ──feed()──► Armed
//!            │
//!            ├── close_gracefully() ──► Disarmed   (disarm token, then close)
//!            │
//!            └── close_forcefully() ──► ForcedClose (close only; reset pending)
//! ```
//!
//! Both close operations consume the handle, so a device that has been
//! closed cannot be fed again.

use std::fmt;
use std::path::Path;

use crate::error::HardwareWatchdogResult;

/// Byte written to keep the countdown alive. Any value but the disarm token works.
pub const FEED_TOKEN: u8 = b'\0';

/// The "magic close" byte. Written immediately before closing, it stops the timer.
pub const DISARM_TOKEN: u8 = b'V';

/// An open, armed hardware watchdog.
pub trait WatchdogDevice: Send + fmt::Debug {
    /// Path of the device node backing this handle.
    fn path(&self) -> &Path;

    /// Change the countdown length.
    ///
    /// Returns the timeout the driver actually applied, which may be rounded.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationUnsupported` if the driver rejects the request.
    /// Some platforms fix the timeout in firmware, so callers treat this as
    /// non-fatal.
    fn set_timeout(&mut self, secs: u32) -> HardwareWatchdogResult<u32>;

    /// Query the current countdown length in seconds.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` if the driver does not answer the query.
    fn timeout(&self) -> HardwareWatchdogResult<u32>;

    /// Seconds left before the hardware fires, when the driver reports it.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` if the query itself fails.
    fn time_left(&self) -> HardwareWatchdogResult<Option<u32>>;

    /// Write a keep-alive token, restarting the countdown at the full timeout.
    ///
    /// # Errors
    ///
    /// Returns `FeedFailure` if the write fails. The countdown keeps running.
    fn feed(&mut self) -> HardwareWatchdogResult<()>;

    /// Write the disarm token and close the device, stopping the timer.
    ///
    /// This is the only way to give up the handle without resetting the host.
    ///
    /// # Errors
    ///
    /// Returns `DisarmFailed` if the token could not be written. The device
    /// is closed regardless and the timer stays armed.
    fn close_gracefully(self: Box<Self>) -> HardwareWatchdogResult<()>;

    /// Close the device without the disarm token.
    ///
    /// The timer stays armed and the host resets once the remaining
    /// countdown elapses. There is no way back from this call.
    fn close_forcefully(self: Box<Self>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trait_is_object_safe_and_send() {
        fn assert_send<T: Send + ?Sized>() {}
        assert_send::<dyn WatchdogDevice>();
        assert_send::<Box<dyn WatchdogDevice>>();
    }

    #[test]
    fn test_feed_token_never_disarms() {
        assert_ne!(FEED_TOKEN, DISARM_TOKEN);
    }
}

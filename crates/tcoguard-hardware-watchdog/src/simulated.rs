//! In-memory watchdog for tests and hardware-free runs.
//!
//! [`SimulatedHardware`] models the chipset timer: it keeps counting down
//! after the handle is dropped, exactly like the real part, and records every
//! operation so tests can assert on the sequence of feeds and closes. Time
//! only moves when [`SimulatedHardware::advance`] is called.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{HardwareWatchdogError, HardwareWatchdogResult};
use crate::watchdog::WatchdogDevice;

/// Operations observed by the simulated chip, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Device opened (timer armed at the current timeout).
    Opened,
    /// Timeout changed to the given seconds.
    TimeoutSet(u32),
    /// Keep-alive token written.
    Fed,
    /// Keep-alive write failed.
    FeedFailed,
    /// Disarm token written and device closed.
    Disarmed,
    /// Device closed without the disarm token.
    ForcedClose,
    /// The countdown reached zero and the host was reset.
    Fired,
}

#[derive(Debug)]
struct Inner {
    present: bool,
    supports_timeout: bool,
    timeout: Duration,
    remaining: Duration,
    armed: bool,
    open: bool,
    fired: bool,
    failing_feeds: u32,
    events: Vec<DeviceEvent>,
}

/// Shared model of one chipset watchdog.
///
/// Cloning yields another view of the same chip.
#[derive(Debug, Clone)]
pub struct SimulatedHardware {
    path: PathBuf,
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedHardware {
    /// A present chip with a configurable timeout and the given driver default.
    #[must_use]
    pub fn new(driver_default_secs: u32) -> Self {
        let timeout = Duration::from_secs(u64::from(driver_default_secs));
        Self {
            path: PathBuf::from("/dev/watchdog-sim"),
            inner: Arc::new(Mutex::new(Inner {
                present: true,
                supports_timeout: true,
                timeout,
                remaining: timeout,
                armed: false,
                open: false,
                fired: false,
                failing_feeds: 0,
                events: Vec::new(),
            })),
        }
    }

    /// A chip whose timeout is fixed by firmware.
    #[must_use]
    pub fn with_fixed_timeout(driver_default_secs: u32) -> Self {
        let hardware = Self::new(driver_default_secs);
        hardware.inner.lock().supports_timeout = false;
        hardware
    }

    /// No chip at all; opening fails.
    #[must_use]
    pub fn absent() -> Self {
        let hardware = Self::new(30);
        hardware.inner.lock().present = false;
        hardware
    }

    /// Open the chip, arming the timer.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the chip is absent or already open.
    pub fn open(&self) -> HardwareWatchdogResult<SimulatedWatchdog> {
        let mut inner = self.inner.lock();
        if !inner.present {
            return Err(HardwareWatchdogError::device_unavailable(
                &self.path,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        if inner.open {
            return Err(HardwareWatchdogError::device_unavailable(
                &self.path,
                std::io::Error::from(std::io::ErrorKind::ResourceBusy),
            ));
        }
        inner.open = true;
        inner.armed = true;
        inner.remaining = inner.timeout;
        inner.events.push(DeviceEvent::Opened);
        Ok(SimulatedWatchdog {
            path: self.path.clone(),
            hardware: self.clone(),
        })
    }

    /// Make the next `count` feeds fail.
    pub fn fail_next_feeds(&self, count: u32) {
        self.inner.lock().failing_feeds = count;
    }

    /// Let `elapsed` pass on the chip's clock.
    pub fn advance(&self, elapsed: Duration) {
        let mut inner = self.inner.lock();
        if !inner.armed || inner.fired {
            return;
        }
        inner.remaining = inner.remaining.saturating_sub(elapsed);
        if inner.remaining.is_zero() {
            inner.fired = true;
            inner.events.push(DeviceEvent::Fired);
        }
    }

    /// Whether the countdown has run out and reset the host.
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.inner.lock().fired
    }

    /// Whether the timer is still counting.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.inner.lock().armed
    }

    /// Time left before the chip fires.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.inner.lock().remaining
    }

    /// Snapshot of every recorded operation.
    #[must_use]
    pub fn events(&self) -> Vec<DeviceEvent> {
        self.inner.lock().events.clone()
    }

    /// Number of times `event` was recorded.
    #[must_use]
    pub fn count(&self, event: DeviceEvent) -> usize {
        self.inner.lock().events.iter().filter(|e| **e == event).count()
    }
}

/// Open handle on a [`SimulatedHardware`] chip.
#[derive(Debug)]
pub struct SimulatedWatchdog {
    path: PathBuf,
    hardware: SimulatedHardware,
}

impl WatchdogDevice for SimulatedWatchdog {
    fn path(&self) -> &Path {
        &self.path
    }

    fn set_timeout(&mut self, secs: u32) -> HardwareWatchdogResult<u32> {
        let mut inner = self.hardware.inner.lock();
        if !inner.supports_timeout {
            return Err(HardwareWatchdogError::configuration_unsupported(
                secs,
                "timeout fixed by firmware",
            ));
        }
        inner.timeout = Duration::from_secs(u64::from(secs));
        inner.remaining = inner.timeout;
        inner.events.push(DeviceEvent::TimeoutSet(secs));
        Ok(secs)
    }

    fn timeout(&self) -> HardwareWatchdogResult<u32> {
        let secs = self.hardware.inner.lock().timeout.as_secs();
        Ok(u32::try_from(secs).unwrap_or(u32::MAX))
    }

    fn time_left(&self) -> HardwareWatchdogResult<Option<u32>> {
        let secs = self.hardware.inner.lock().remaining.as_secs();
        Ok(Some(u32::try_from(secs).unwrap_or(u32::MAX)))
    }

    fn feed(&mut self) -> HardwareWatchdogResult<()> {
        let mut inner = self.hardware.inner.lock();
        if inner.failing_feeds > 0 {
            inner.failing_feeds = inner.failing_feeds.saturating_sub(1);
            inner.events.push(DeviceEvent::FeedFailed);
            return Err(HardwareWatchdogError::FeedFailure(std::io::Error::other(
                "simulated write failure",
            )));
        }
        inner.remaining = inner.timeout;
        inner.events.push(DeviceEvent::Fed);
        Ok(())
    }

    fn close_gracefully(self: Box<Self>) -> HardwareWatchdogResult<()> {
        let mut inner = self.hardware.inner.lock();
        inner.open = false;
        inner.armed = false;
        inner.events.push(DeviceEvent::Disarmed);
        Ok(())
    }

    fn close_forcefully(self: Box<Self>) {
        let mut inner = self.hardware.inner.lock();
        inner.open = false;
        inner.events.push(DeviceEvent::ForcedClose);
    }
}

//! Linux watchdog character device (`/dev/watchdog`).
//!
//! Ioctl request codes follow the generic `_IOC` layout from
//! `include/uapi/linux/watchdog.h`.

#![expect(unsafe_code, reason = "watchdog ioctls have no safe std wrapper")]

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{HardwareWatchdogError, HardwareWatchdogResult};
use crate::watchdog::{DISARM_TOKEN, FEED_TOKEN, WatchdogDevice};

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT: u32 = 30;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const WATCHDOG_IOCTL_BASE: u8 = b'W';

const fn ioctl_code(direction: u32, kind: u8, nr: u8, size: usize) -> libc::c_ulong {
    ((direction << IOC_DIRSHIFT)
        | ((kind as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)) as libc::c_ulong
}

const WDIOC_SETTIMEOUT: libc::c_ulong = ioctl_code(
    IOC_READ | IOC_WRITE,
    WATCHDOG_IOCTL_BASE,
    6,
    std::mem::size_of::<libc::c_int>(),
);
const WDIOC_GETTIMEOUT: libc::c_ulong = ioctl_code(
    IOC_READ,
    WATCHDOG_IOCTL_BASE,
    7,
    std::mem::size_of::<libc::c_int>(),
);
const WDIOC_GETTIMELEFT: libc::c_ulong = ioctl_code(
    IOC_READ,
    WATCHDOG_IOCTL_BASE,
    10,
    std::mem::size_of::<libc::c_int>(),
);

/// Handle on a kernel watchdog device node.
///
/// Opening the node arms the timer at the driver's default timeout; call
/// [`WatchdogDevice::set_timeout`] and [`WatchdogDevice::feed`] right away.
#[derive(Debug)]
pub struct LinuxWatchdog {
    path: PathBuf,
    file: File,
}

impl LinuxWatchdog {
    /// Open and thereby arm the watchdog at `path`.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the node is missing or cannot be opened
    /// for writing (another process may already hold it).
    pub fn open(path: impl AsRef<Path>) -> HardwareWatchdogResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| HardwareWatchdogError::device_unavailable(path, e))?;
        info!(path = %path.display(), "Watchdog device opened, timer armed");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn read_int(&self, request: libc::c_ulong, query: &'static str) -> HardwareWatchdogResult<u32> {
        let mut value: libc::c_int = 0;
        // SAFETY: the fd is owned by `self.file` and stays open for the call;
        // `value` is a live c_int matching the request's declared size.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), request, &mut value) };
        if rc < 0 {
            return Err(HardwareWatchdogError::QueryFailed {
                query,
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(u32::try_from(value).unwrap_or(0))
    }
}

impl WatchdogDevice for LinuxWatchdog {
    fn path(&self) -> &Path {
        &self.path
    }

    fn set_timeout(&mut self, secs: u32) -> HardwareWatchdogResult<u32> {
        let mut value = libc::c_int::try_from(secs)
            .map_err(|e| HardwareWatchdogError::configuration_unsupported(secs, e.to_string()))?;
        // SAFETY: the fd is owned by `self.file`; the driver reads and writes
        // back exactly one c_int through the pointer.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), WDIOC_SETTIMEOUT, &mut value) };
        if rc < 0 {
            return Err(HardwareWatchdogError::configuration_unsupported(
                secs,
                std::io::Error::last_os_error().to_string(),
            ));
        }
        let applied = u32::try_from(value).unwrap_or(secs);
        debug!(requested = secs, applied, "Watchdog timeout set");
        Ok(applied)
    }

    fn timeout(&self) -> HardwareWatchdogResult<u32> {
        self.read_int(WDIOC_GETTIMEOUT, "timeout")
    }

    fn time_left(&self) -> HardwareWatchdogResult<Option<u32>> {
        match self.read_int(WDIOC_GETTIMELEFT, "timeleft") {
            Ok(secs) => Ok(Some(secs)),
            // Many drivers simply do not implement GETTIMELEFT.
            Err(HardwareWatchdogError::QueryFailed { source, .. })
                if source.raw_os_error() == Some(libc::ENOTTY)
                    || source.raw_os_error() == Some(libc::EOPNOTSUPP) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn feed(&mut self) -> HardwareWatchdogResult<()> {
        self.file
            .write_all(&[FEED_TOKEN])
            .map_err(HardwareWatchdogError::FeedFailure)
    }

    fn close_gracefully(mut self: Box<Self>) -> HardwareWatchdogResult<()> {
        let written = self.file.write_all(&[DISARM_TOKEN]);
        // Dropping the file closes it either way.
        drop(self);
        written.map_err(HardwareWatchdogError::DisarmFailed)
    }

    fn close_forcefully(self: Box<Self>) {
        drop(self);
    }
}

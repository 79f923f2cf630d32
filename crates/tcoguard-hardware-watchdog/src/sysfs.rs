//! Read-only watchdog attributes under `/sys/class/watchdog/watchdogN`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

/// Default sysfs directory of the first watchdog.
pub const DEFAULT_SYSFS_DIR: &str = "/sys/class/watchdog/watchdog0";

/// Snapshot of the attributes a driver chose to expose.
///
/// Every field is optional because drivers differ in what they publish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatchdogAttributes {
    /// Driver identity string, e.g. `iTCO_wdt`.
    pub identity: Option<String>,
    /// `active` or `inactive`.
    pub state: Option<String>,
    /// Current timeout in seconds.
    pub timeout_secs: Option<u32>,
    /// Seconds left before the timer fires.
    pub timeleft_secs: Option<u32>,
    /// Whether the driver was loaded with `nowayout`.
    pub nowayout: Option<bool>,
}

impl WatchdogAttributes {
    /// Read whatever attributes exist under `dir`.
    ///
    /// Missing or unreadable attributes are left as `None`.
    #[must_use]
    pub fn read(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let attrs = Self {
            identity: read_attr(dir, "identity"),
            state: read_attr(dir, "state"),
            timeout_secs: read_attr(dir, "timeout").and_then(|v| v.parse().ok()),
            timeleft_secs: read_attr(dir, "timeleft").and_then(|v| v.parse().ok()),
            nowayout: read_attr(dir, "nowayout").map(|v| v == "1"),
        };
        debug!(dir = %dir.display(), ?attrs, "Read watchdog sysfs attributes");
        attrs
    }

    /// Whether nothing at all was readable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn read_attr(dir: &Path, name: &str) -> Option<String> {
    let path: PathBuf = dir.join(name);
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

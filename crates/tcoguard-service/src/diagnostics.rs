//! Read-only platform checks used at startup and by `tcoguard info`.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tcoguard_hardware_watchdog::WatchdogAttributes;
use tracing::{debug, info, warn};

use crate::config::WatchdogSettings;

/// Kernel module list.
pub const PROC_MODULES: &str = "/proc/modules";

/// How many kernel log lines `info` shows.
pub const KERNEL_LOG_LINES: usize = 5;

/// Everything known about the watchdog without opening it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformReport {
    /// Expected driver module.
    pub module: String,
    /// Whether the module is loaded; `None` if the module list is unreadable.
    pub module_loaded: Option<bool>,
    /// Device node.
    pub device: PathBuf,
    /// Whether the device node exists.
    pub device_present: bool,
    /// Sysfs attributes, as far as the driver exposes them.
    pub attributes: WatchdogAttributes,
}

impl PlatformReport {
    /// Collect the report for `settings`, reading modules from `proc_modules`.
    #[must_use]
    pub fn collect(settings: &WatchdogSettings, proc_modules: impl AsRef<Path>) -> Self {
        Self {
            module: settings.module.clone(),
            module_loaded: module_loaded(proc_modules, &settings.module),
            device: settings.device.clone(),
            device_present: settings.device.exists(),
            attributes: WatchdogAttributes::read(&settings.sysfs_dir),
        }
    }

    /// Emit the report as startup log lines.
    pub fn log(&self) {
        match self.module_loaded {
            Some(true) => info!(module = %self.module, "Watchdog driver module loaded"),
            Some(false) => warn!(module = %self.module, "Watchdog driver module not loaded"),
            None => debug!(module = %self.module, "Kernel module list unavailable"),
        }
        if !self.device_present {
            warn!(device = %self.device.display(), "Watchdog device node missing");
        }
        if !self.attributes.is_empty() {
            info!(
                identity = self.attributes.identity.as_deref().unwrap_or("unknown"),
                timeout_secs = ?self.attributes.timeout_secs,
                timeleft_secs = ?self.attributes.timeleft_secs,
                nowayout = ?self.attributes.nowayout,
                "Watchdog driver attributes"
            );
        }
    }
}

/// Whether `module` appears in a `/proc/modules` style listing.
#[must_use]
pub fn module_loaded(proc_modules: impl AsRef<Path>, module: &str) -> Option<bool> {
    let listing = std::fs::read_to_string(proc_modules).ok()?;
    Some(parse_module_listing(&listing, module))
}

fn parse_module_listing(listing: &str, module: &str) -> bool {
    // Module names use underscores in the listing even if loaded with dashes.
    let wanted = module.replace('-', "_");
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|name| name == wanted)
}

/// Last `count` kernel log lines mentioning `needle` (case-insensitive).
///
/// # Errors
///
/// Returns an error if `dmesg` cannot be run or exits unsuccessfully,
/// typically for lack of privileges.
pub fn kernel_log_lines(needle: &str, count: usize) -> std::io::Result<Vec<String>> {
    let output = Command::new("dmesg").output()?;
    if !output.status.success() {
        return Err(std::io::Error::other(format!(
            "dmesg exited with {}",
            output.status
        )));
    }
    Ok(filter_log(&String::from_utf8_lossy(&output.stdout), needle, count))
}

fn filter_log(log: &str, needle: &str, count: usize) -> Vec<String> {
    let needle = needle.to_lowercase();
    let matching: Vec<&str> = log
        .lines()
        .filter(|line| line.to_lowercase().contains(&needle))
        .collect();
    let skip = matching.len().saturating_sub(count);
    matching
        .into_iter()
        .skip(skip)
        .map(str::to_string)
        .collect()
}

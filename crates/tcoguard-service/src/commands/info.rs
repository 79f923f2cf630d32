//! `tcoguard info`: report the watchdog platform without arming it.

use anyhow::Result;
use colored::Colorize;

use crate::config::ServiceConfig;
use crate::diagnostics::{KERNEL_LOG_LINES, PROC_MODULES, PlatformReport, kernel_log_lines};

/// Kernel log lines mentioning this are shown.
const KERNEL_LOG_NEEDLE: &str = "tco";

/// Print the platform report.
///
/// Never opens the device, so running it cannot arm the watchdog.
///
/// # Errors
///
/// Returns an error only if JSON output cannot be serialized.
pub fn execute(config: &ServiceConfig, json: bool) -> Result<()> {
    let report = PlatformReport::collect(&config.watchdog, PROC_MODULES);
    let kernel_log = kernel_log_lines(KERNEL_LOG_NEEDLE, KERNEL_LOG_LINES);

    if json {
        let output = serde_json::json!({
            "success": true,
            "platform": report,
            "kernel_log": kernel_log.as_ref().ok(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_human(&report);
    println!();
    println!("{}", "Kernel log:".bold());
    match kernel_log {
        Ok(lines) if lines.is_empty() => println!("  {}", "No matching entries".yellow()),
        Ok(lines) => {
            for line in lines {
                println!("  {line}");
            }
        }
        Err(e) => println!("  {} {}", "Unavailable:".yellow(), e),
    }
    Ok(())
}

fn print_human(report: &PlatformReport) {
    println!("{}", "Watchdog Platform:".bold());
    let module = match report.module_loaded {
        Some(true) => format!("{} loaded", "✓".green()),
        Some(false) => format!("{} not loaded", "✗".red()),
        None => format!("{}", "unknown".yellow()),
    };
    println!("  Module {}: {}", report.module, module);
    println!(
        "  Device {}: {}",
        report.device.display(),
        if report.device_present {
            format!("{} present", "✓".green())
        } else {
            format!("{} missing", "✗".red())
        }
    );
    let attrs = &report.attributes;
    if let Some(identity) = &attrs.identity {
        println!("  Identity: {identity}");
    }
    println!("  Timeout: {}", seconds(attrs.timeout_secs));
    println!("  Time left: {}", seconds(attrs.timeleft_secs));
    if let Some(nowayout) = attrs.nowayout {
        println!(
            "  Nowayout: {}",
            if nowayout { "Yes".red() } else { "No".green() }
        );
    }
}

fn seconds(value: Option<u32>) -> String {
    value.map_or_else(|| "n/a".to_string(), |secs| format!("{secs}s"))
}

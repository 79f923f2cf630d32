//! `tcoguard reset`: force a hardware reset on operator request.

use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::owner;
use crate::platform::Platform;
use crate::supervisor::arm_watchdog;
use crate::switch_monitor::ResetTrigger;

/// Arm the watchdog and close it without disarming.
///
/// On success the host resets and this never returns.
///
/// # Errors
///
/// Returns the open error when no device is available, a prompt error when
/// confirmation cannot be read, or `ResetFailed` when the host is still up
/// after the reset deadline.
pub async fn execute<P: Platform>(platform: &P, config: &ServiceConfig, yes: bool) -> Result<()> {
    if !yes {
        println!("{}", "⚠ HARDWARE RESET WARNING ⚠".yellow().bold());
        println!(
            "The host will be reset by the watchdog within {}s. Unsaved work is lost.",
            config.policy.timeout_secs
        );
        if !Confirm::new()
            .with_prompt("Force a hardware reset now?")
            .interact()?
        {
            println!("{}", "Reset cancelled".yellow());
            return Ok(());
        }
    }

    let armed = arm_watchdog(platform, config)?;
    let (watchdog, owner_task) = owner::spawn(armed.device, armed.first_feed);
    info!("Operator requested hardware reset");
    let pending = ResetTrigger::new(watchdog.clone(), config.policy.reset_deadline())
        .fire("operator request")
        .await;
    let err = pending.wait().await;

    drop(watchdog);
    if let Err(e) = owner_task.await {
        warn!(error = %e, "Watchdog owner task failed");
    }
    Err(err.into())
}

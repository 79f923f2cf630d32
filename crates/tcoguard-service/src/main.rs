//! tcoguard - chipset watchdog supervisor
//!
//! Runs the supervisor by default. `info` reports the watchdog platform and
//! `reset` forces a hardware reset on request.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tcoguard_service::commands;
use tcoguard_service::{DEFAULT_CONFIG_PATH, Platform, ServiceConfig, ServiceError, Supervisor};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default timeout of the in-memory watchdog used by `--simulate`.
const SIMULATED_DRIVER_TIMEOUT_SECS: u32 = 30;

#[derive(Parser, Debug)]
#[command(name = "tcoguard")]
#[command(about = "Keep the chipset watchdog fed and force a reset on a long switch hold")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use in-memory watchdog and expander instead of the real hardware
    #[arg(long, global = true)]
    simulate: bool,

    /// Output in JSON format where supported
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Report watchdog module, device and kernel log without arming it
    Info,

    /// Force a hardware reset through the watchdog
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn log_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    ["tcoguard", "tcoguard_service", "tcoguard_gpio", "tcoguard_hardware_watchdog", "tcoguard_errors"]
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match execute(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::from(exit_status(&e))
        }
    }
}

async fn execute(cli: &Cli) -> Result<()> {
    let config = ServiceConfig::load(&cli.config)
        .await
        .with_context(|| format!("Loading {}", cli.config.display()))?;

    if cli.command == Some(Commands::Info) {
        return commands::info::execute(&config, cli.json);
    }

    if cli.simulate {
        let platform = tcoguard_service::SimulatedPlatform::new(SIMULATED_DRIVER_TIMEOUT_SECS);
        return dispatch(cli, config, platform).await;
    }
    #[cfg(target_os = "linux")]
    {
        dispatch(cli, config, tcoguard_service::LinuxPlatform).await
    }
    #[cfg(not(target_os = "linux"))]
    {
        anyhow::bail!("Hardware access is only supported on Linux; use --simulate")
    }
}

async fn dispatch<P: Platform>(cli: &Cli, config: ServiceConfig, platform: P) -> Result<()> {
    match &cli.command {
        Some(Commands::Reset { yes }) => commands::reset::execute(&platform, &config, *yes).await,
        Some(Commands::Info) | None => {
            info!("Starting tcoguard v{}", env!("CARGO_PKG_VERSION"));
            Supervisor::new(config, platform)?.run().await?;
            Ok(())
        }
    }
}

fn print_error(error: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);
    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "Caused by:".yellow(), cause);
    }
}

fn exit_status(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<ServiceError>()
        .map_or(1, ServiceError::exit_status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcoguard_hardware_watchdog::HardwareWatchdogError;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_defaults_to_supervisor() -> TestResult {
        let cli = Cli::try_parse_from(["tcoguard"])?;
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(cli.verbose, 0);
        assert!(!cli.simulate);
        assert!(cli.command.is_none());
        Ok(())
    }

    #[test]
    fn parse_reset_with_global_flags() -> TestResult {
        let cli = Cli::try_parse_from([
            "tcoguard", "reset", "--yes", "-vv", "--simulate", "--config", "/tmp/x.json",
        ])?;
        assert_eq!(cli.command, Some(Commands::Reset { yes: true }));
        assert_eq!(cli.verbose, 2);
        assert!(cli.simulate);
        assert_eq!(cli.config, PathBuf::from("/tmp/x.json"));
        Ok(())
    }

    #[test]
    fn parse_info_json() -> TestResult {
        let cli = Cli::try_parse_from(["tcoguard", "info", "--json"])?;
        assert_eq!(cli.command, Some(Commands::Info));
        assert!(cli.json);
        Ok(())
    }

    #[test]
    fn parse_rejects_unknown_subcommand() {
        assert!(matches!(Cli::try_parse_from(["tcoguard", "explode"]), Err(_)));
    }

    #[test]
    fn test_log_filter_levels() {
        assert!(log_filter(0).contains("tcoguard_service=info"));
        assert!(log_filter(1).contains("tcoguard_gpio=debug"));
        assert!(log_filter(5).contains("tcoguard_hardware_watchdog=trace"));
    }

    #[test]
    fn test_exit_code_survives_context() {
        let err = anyhow::Error::from(ServiceError::from(HardwareWatchdogError::device_unavailable(
            "/dev/watchdog",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        )))
        .context("Starting");
        assert_eq!(exit_status(&err), 2);
        assert_eq!(exit_status(&anyhow::anyhow!("other")), 1);
    }
}

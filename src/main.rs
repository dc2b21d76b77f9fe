//! unlatch - gate detection and bypass engine
//!
//! Main entry point for the unlatch CLI.

mod cli;
mod cmd_config;
mod cmd_page;

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use unlatch_config::{Config, ConfigLoader, ConfigValidator};

use crate::cli::{Cli, Commands};
use crate::cmd_config::{handle_check_host_command, handle_validate_config_command};
use crate::cmd_page::{handle_detect_command, handle_run_command};

/// Get the .unlatch directory path.
fn unlatch_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".unlatch"))
        .unwrap_or_else(|| PathBuf::from(".unlatch"))
}

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.unlatch/logs/ with daily rotation; 30 files are kept.
fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = unlatch_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("unlatch")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The worker flushes on drop, so the guard lives for the whole process.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        // Console layer
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(true)
        )
        // File layer
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
        )
        .init();

    Ok(())
}

/// Load the configuration, falling back to defaults when the file is absent.
fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let config = if path.exists() {
        let config = ConfigLoader::load(path)?;
        info!(path = %path.display(), "Configuration loaded");
        config
    } else {
        warn!(path = %path.display(), "Config file not found, using defaults");
        Config::default()
    };

    let warnings = ConfigValidator::validate(&config)?.into_result()?;
    for warning in warnings {
        warn!(field = %warning.path, "{}", warning.message);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
        Some(Commands::Run { page, host, timeout_secs, new_session }) => {
            let config = load_config(&cli.config)?;
            handle_run_command(config, &page, host.as_deref(), timeout_secs, new_session).await
        }
        Some(Commands::Detect { page }) => {
            let config = load_config(&cli.config)?;
            handle_detect_command(config, &page).await
        }
        Some(Commands::CheckHost { host }) => {
            let config = load_config(&cli.config)?;
            handle_check_host_command(config, &host).await
        }
        Some(Commands::ValidateConfig) => handle_validate_config_command(&cli.config),
    }
}

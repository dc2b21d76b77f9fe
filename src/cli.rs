//! CLI definitions for unlatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// unlatch CLI.
#[derive(Parser)]
#[command(name = "unlatch")]
#[command(about = "Gate detection and bypass engine for link-shortener interstitials")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the engine against a page snapshot until it stops
    Run {
        /// Page snapshot (JSON)
        #[arg(long)]
        page: PathBuf,

        /// Override the host of the snapshot URL
        #[arg(long)]
        host: Option<String>,

        /// Give up waiting for a stop after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Clear stored toggles and the loop ledger before running
        #[arg(long)]
        new_session: bool,
    },

    /// Run a single detection pass and print the result
    Detect {
        /// Page snapshot (JSON)
        #[arg(long)]
        page: PathBuf,
    },

    /// Report whether a host is excluded or denylisted
    CheckHost {
        /// Hostname, e.g. www.youtube.com
        host: String,
    },

    /// Load and validate the configuration file
    ValidateConfig,
}

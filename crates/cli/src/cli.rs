//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Ad Tracker - fires ad tracking beacons against a live stream's metadata
#[derive(Parser, Debug)]
#[command(
    name = "ad-tracker",
    author,
    version,
    about = "Ad tracking beacon engine",
    long_about = "Fires ad tracking beacons for a live stream.\n\n\
                  Polls the stream's ad metadata, follows a replayed playback \n\
                  position, and delivers each tracking point once."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "AD_TRACKER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "AD_TRACKER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay clock samples into a live tracking session
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Fetch the metadata document once and print the schedule
    Inspect(InspectArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "AD_TRACKER_CONFIG"
    )]
    pub config: PathBuf,

    /// Clock sample script (JSON lines of samples or actions)
    #[arg(short, long, env = "AD_TRACKER_SAMPLES")]
    pub samples: PathBuf,

    /// Override the media URL from configuration
    #[arg(long, env = "AD_TRACKER_MEDIA_URL")]
    pub media_url: Option<String>,

    /// Override the metadata URL from configuration
    #[arg(long, env = "AD_TRACKER_METADATA_URL")]
    pub metadata_url: Option<String>,

    /// Replay speed multiplier for the sample script (1.0 = real time)
    #[arg(long, default_value = "1.0")]
    pub speed: f64,

    /// Session timeout in seconds (0 = run until the script ends)
    #[arg(long, default_value = "0", env = "AD_TRACKER_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and script, then exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "AD_TRACKER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `inspect` command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Position (ms) to fetch for; enables the range check and anchored fallback
    #[arg(long)]
    pub position: Option<f64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

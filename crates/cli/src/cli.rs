//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log Anchor - rate-limited batch submission of inference logs
#[derive(Parser, Debug)]
#[command(
    name = "log-anchor",
    author,
    version,
    about = "Rate-limited batch submission of inference logs",
    long_about = "Submits inference log records to a ledger sink in bounded chunks,\n\
                  keeping a minimum interval between consecutive sink calls and\n\
                  remembering the last committed record in a checkpoint."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LOG_ANCHOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "LOG_ANCHOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a batch of log records
    Submit(SubmitArgs),

    /// Read log records as JSON lines and submit them in accumulated batches
    Stream(StreamArgs),

    /// Validate configuration file without submitting
    Validate(ValidateArgs),

    /// Display configuration and checkpoint information
    Info(InfoArgs),
}

/// Arguments for the `submit` command
#[derive(Parser, Debug, Clone)]
pub struct SubmitArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "relay.toml", env = "LOG_ANCHOR_CONFIG")]
    pub config: PathBuf,

    /// Input file: a JSON array of records or a `{"logs": [...]}` body ("-" for stdin)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Override the maximum number of records per sink call
    #[arg(long, env = "BATCH_SIZE")]
    pub max_batch_size: Option<usize>,

    /// Override the minimum seconds between consecutive sink calls
    #[arg(long, env = "LOG_ANCHOR_MIN_INTERVAL_SECS")]
    pub min_interval_secs: Option<u64>,

    /// Ignore the checkpoint and submit every record
    #[arg(long)]
    pub no_checkpoint: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "LOG_ANCHOR_METRICS_PORT")]
    pub metrics_port: u16,

    /// Output the submission report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `stream` command
#[derive(Parser, Debug, Clone)]
pub struct StreamArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "relay.toml", env = "LOG_ANCHOR_CONFIG")]
    pub config: PathBuf,

    /// Input of newline-delimited JSON records ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    pub input: PathBuf,

    /// Override the seconds a partial batch may wait before it is flushed
    #[arg(long, env = "BATCH_TIMEOUT_SEC")]
    pub batch_timeout_secs: Option<u64>,

    /// Override the accumulator queue capacity
    #[arg(long, env = "QUEUE_MAX_SIZE")]
    pub queue_max_size: Option<usize>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "LOG_ANCHOR_METRICS_PORT")]
    pub metrics_port: u16,

    /// Output the stream report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "relay.toml", env = "LOG_ANCHOR_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml", env = "LOG_ANCHOR_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

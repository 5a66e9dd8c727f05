//! CLI argument parsing for story-cli.
//!
//! CLI flags override every other configuration source.

use clap::{Args, Parser, Subcommand};

/// Story clustering and threshold calibration
#[derive(Parser, Debug)]
#[command(name = "story-cli")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default <config dir>/story-cluster/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cluster the lookback window at one threshold and write a detailed report
    Run(RunArgs),

    /// Evaluate several thresholds against one loaded window
    Sweep(SweepArgs),

    /// Administrative commands
    Admin {
        /// Database path (default from config)
        #[arg(long)]
        db_path: Option<String>,

        #[command(subcommand)]
        command: AdminCommands,
    },
}

/// Options shared by `run` and `sweep`.
#[derive(Args, Debug, Clone, Default)]
pub struct WindowArgs {
    /// Lookback window in hours (capped at 168)
    #[arg(long)]
    pub hours: Option<u32>,

    /// Minimum members per cluster
    #[arg(long)]
    pub min_size: Option<usize>,

    /// Maximum span between earliest and latest member, in days
    #[arg(long)]
    pub max_day_span: Option<f64>,

    /// Override database path
    #[arg(long)]
    pub db_path: Option<String>,

    /// Override report directory
    #[arg(long)]
    pub report_dir: Option<String>,

    /// Print the report instead of writing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for `run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub window: WindowArgs,

    /// Cosine similarity threshold
    #[arg(short, long, allow_negative_numbers = true)]
    pub threshold: Option<f64>,

    /// Reconcile against the persisted clustering
    #[arg(long)]
    pub reconcile: bool,

    /// Skip reconciliation even when configuration enables it
    #[arg(long, conflicts_with = "reconcile")]
    pub no_reconcile: bool,

    /// Seed for coherence sampling (reproducible scores)
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for `sweep`.
#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub window: WindowArgs,

    /// Comma-separated thresholds (default from config)
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub thresholds: Vec<f64>,
}

/// Admin subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AdminCommands {
    /// Show database statistics
    Stats,

    /// Import items from a JSON-lines file
    ImportItems {
        /// Path to the JSON-lines file (one item per line)
        path: String,
    },

    /// Import a persisted clustering from JSON-lines files
    ImportClustering {
        /// Item assignments, one `{"item_id", "cluster_id"}` per line
        #[arg(long)]
        assignments: Option<String>,

        /// Cluster metadata, one `{"id", "member_count", ...}` per line
        #[arg(long)]
        clusters: Option<String>,
    },
}

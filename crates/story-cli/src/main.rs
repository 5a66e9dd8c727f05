//! story-cli
//!
//! Clusters short posts into stories by embedding similarity and calibrates
//! the similarity threshold.
//!
//! # Usage
//!
//! ```bash
//! story-cli run [--hours H] [--threshold T] [--min-size N] [--max-day-span D] [--reconcile | --no-reconcile]
//! story-cli sweep [--hours H] [--thresholds 0.8,0.9]
//! story-cli admin import-items items.jsonl
//! story-cli admin import-clustering --assignments a.jsonl --clusters c.jsonl
//! story-cli admin stats
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (<config dir>/story-cluster/config.toml)
//! 3. File given with --config
//! 4. Environment variables (STORY_*)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use story_cli::{handle_admin, run_command, sweep_command, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            run_command(cli.config.as_deref(), cli.log_level.as_deref(), args).await?;
        }
        Commands::Sweep(args) => {
            sweep_command(cli.config.as_deref(), cli.log_level.as_deref(), args).await?;
        }
        Commands::Admin { db_path, command } => {
            handle_admin(
                cli.config.as_deref(),
                cli.log_level.as_deref(),
                db_path,
                command,
            )?;
        }
    }

    Ok(())
}

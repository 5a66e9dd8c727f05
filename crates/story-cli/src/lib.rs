//! story-cli library exports.
//!
//! This crate provides the `story-cli` binary for the story clustering engine.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (run, sweep, admin)

pub mod cli;
pub mod commands;

pub use cli::{AdminCommands, Cli, Commands, RunArgs, SweepArgs, WindowArgs};
pub use commands::{
    apply_run_overrides, apply_sweep_overrides, execute_run, execute_sweep, handle_admin,
    import_assignments, import_clusters, import_items, latest_report_path, load_settings,
    open_storage, run_command, sweep_command,
};

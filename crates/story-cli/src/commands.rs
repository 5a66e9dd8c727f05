//! Command implementations for story-cli.
//!
//! Handles:
//! - run: Load the lookback window, cluster at one threshold, write a detailed report
//! - sweep: Evaluate several thresholds against the same window, write a sweep report
//! - admin: Import items and a persisted clustering, show store statistics

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use story_cluster::{
    FsReportSink, ReportMode, StorageSource, StoryPipeline, StoryReport, SweepReport,
    WrittenReport,
};
use story_storage::Storage;
use story_types::{Item, PersistedAssignment, PersistedClusterMeta, Settings};

use crate::cli::{AdminCommands, RunArgs, SweepArgs, WindowArgs};

/// Load configuration and apply the global CLI overrides.
pub fn load_settings(config_path: Option<&str>, log_level: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    Ok(settings)
}

/// Initialize logging to stderr. `RUST_LOG` wins over the configured level.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn apply_window(settings: &mut Settings, window: &WindowArgs) {
    if let Some(hours) = window.hours {
        settings.clustering.lookback_hours = hours;
    }
    if let Some(min_size) = window.min_size {
        settings.clustering.min_cluster_size = min_size;
    }
    if let Some(span) = window.max_day_span {
        settings.clustering.max_day_span = span;
    }
    if let Some(db_path) = &window.db_path {
        settings.db_path = db_path.clone();
    }
    if let Some(report_dir) = &window.report_dir {
        settings.report_dir = report_dir.clone();
    }
}

/// Apply `run` flags on top of loaded settings.
pub fn apply_run_overrides(settings: &mut Settings, args: &RunArgs) {
    apply_window(settings, &args.window);
    if let Some(threshold) = args.threshold {
        settings.clustering.threshold = threshold;
    }
    if args.reconcile {
        settings.clustering.reconcile = true;
    }
    if args.no_reconcile {
        settings.clustering.reconcile = false;
    }
    if let Some(seed) = args.seed {
        settings.clustering.coherence_seed = Some(seed);
    }
}

/// Apply `sweep` flags on top of loaded settings.
pub fn apply_sweep_overrides(settings: &mut Settings, args: &SweepArgs) {
    apply_window(settings, &args.window);
    if !args.thresholds.is_empty() {
        settings.clustering.sweep_thresholds = args.thresholds.clone();
    }
}

/// Open the item store, creating parent directories if needed.
pub fn open_storage(db_path: &Path) -> Result<Arc<Storage>> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let storage = Storage::open(db_path).context("Failed to open storage")?;
    Ok(Arc::new(storage))
}

fn pipeline_for(settings: &Settings, storage: Arc<Storage>) -> StoryPipeline {
    let source = Arc::new(StorageSource::new(storage));
    StoryPipeline::new(source.clone(), settings.clustering.clone()).with_persisted_store(source)
}

/// Detailed run against the configured store.
///
/// The report is written only after the whole run succeeded.
pub async fn execute_run(
    settings: &Settings,
    now: DateTime<Utc>,
    write: bool,
) -> Result<(StoryReport, Option<WrittenReport>)> {
    let storage = open_storage(&settings.expanded_db_path())?;
    let report = pipeline_for(settings, storage)
        .run_detailed(now)
        .await
        .context("Clustering run failed")?;

    let written = if write {
        let sink = FsReportSink::new(settings.expanded_report_dir());
        Some(
            sink.write_json(ReportMode::Detailed.prefix(), report.generated_at, &report)
                .context("Failed to write report")?,
        )
    } else {
        None
    };
    Ok((report, written))
}

/// Threshold sweep against the configured store.
pub async fn execute_sweep(
    settings: &Settings,
    now: DateTime<Utc>,
    write: bool,
) -> Result<(SweepReport, Option<WrittenReport>)> {
    let storage = open_storage(&settings.expanded_db_path())?;
    let thresholds = settings.clustering.sweep_thresholds.clone();
    let report = pipeline_for(settings, storage)
        .run_sweep(now, &thresholds)
        .await
        .context("Threshold sweep failed")?;

    let written = if write {
        let sink = FsReportSink::new(settings.expanded_report_dir());
        Some(
            sink.write_json(ReportMode::Sweep.prefix(), report.generated_at, &report)
                .context("Failed to write sweep report")?,
        )
    } else {
        None
    };
    Ok((report, written))
}

/// `story-cli run`
pub async fn run_command(
    config_path: Option<&str>,
    log_level: Option<&str>,
    args: RunArgs,
) -> Result<()> {
    let mut settings = load_settings(config_path, log_level)?;
    apply_run_overrides(&mut settings, &args);
    init_logging(&settings.log_level)?;

    info!("Database path: {}", settings.db_path);
    let (report, written) = execute_run(&settings, Utc::now(), !args.window.dry_run).await?;

    match written {
        Some(written) => print_run_summary(&report, &written.timestamped),
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

/// `story-cli sweep`
pub async fn sweep_command(
    config_path: Option<&str>,
    log_level: Option<&str>,
    args: SweepArgs,
) -> Result<()> {
    let mut settings = load_settings(config_path, log_level)?;
    apply_sweep_overrides(&mut settings, &args);
    init_logging(&settings.log_level)?;

    let (report, written) = execute_sweep(&settings, Utc::now(), !args.window.dry_run).await?;

    match written {
        Some(written) => print_sweep_table(&report, &written.timestamped),
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn print_run_summary(report: &StoryReport, path: &Path) {
    let s = &report.summary;
    println!("Run {} ({})", report.run_id, report.generated_at.to_rfc3339());
    println!("  Eligible items:    {}", s.eligible_items);
    println!("  Skipped items:     {}", s.skipped_items);
    println!("  Clusters:          {}", s.cluster_count);
    println!(
        "  Covered items:     {} ({:.1}%)",
        s.covered_items, s.coverage_pct
    );
    println!("  Story candidates:  {}", s.story_candidates);
    println!(
        "  Coherence avg/med: {} / {}",
        fmt_optional(s.average_coherence),
        fmt_optional(s.median_coherence)
    );
    println!(
        "  Anomalies:         {} mega, {} low-coherence",
        s.mega_clusters, s.low_coherence_clusters
    );
    if let Some(v) = &s.verdicts {
        println!(
            "  Verdicts:          {} exact, {} partial, {} split, {} new",
            v.exact_match, v.partial_match, v.split_in_persistent, v.all_new
        );
    }
    println!("Report: {}", path.display());
}

fn print_sweep_table(report: &SweepReport, path: &Path) {
    println!(
        "Sweep {} over {} eligible items (matrix {} ms)",
        report.run_id, report.eligible_items, report.matrix_ms
    );
    println!(
        "{:>9} {:>8} {:>6} {:>5} {:>6} {:>8} {:>8}",
        "threshold", "clusters", "mean", "max", "story", "covered", "ms"
    );
    for row in &report.rows {
        println!(
            "{:>9.2} {:>8} {:>6.2} {:>5} {:>6} {:>7.1}% {:>8}",
            row.threshold,
            row.cluster_count,
            row.mean_size,
            row.max_size,
            row.story_like_count,
            row.coverage * 100.0,
            row.elapsed_ms
        );
    }
    println!("Report: {}", path.display());
}

fn fmt_optional(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.3}", v))
        .unwrap_or_else(|| "n/a".to_string())
}

/// `story-cli admin ...`
pub fn handle_admin(
    config_path: Option<&str>,
    log_level: Option<&str>,
    db_path: Option<String>,
    command: AdminCommands,
) -> Result<()> {
    let mut settings = load_settings(config_path, log_level)?;
    if let Some(db_path) = db_path {
        settings.db_path = db_path;
    }
    init_logging(&settings.log_level)?;

    let storage = open_storage(&settings.expanded_db_path())?;

    match command {
        AdminCommands::Stats => {
            let stats = storage.get_stats().context("Failed to read statistics")?;
            println!("Database: {}", settings.expanded_db_path().display());
            println!("  Stored item versions:  {}", stats.item_count);
            println!("  Logical posts:         {}", stats.logical_post_count);
            println!("  Persisted assignments: {}", stats.assignment_count);
            println!("  Persisted clusters:    {}", stats.persisted_cluster_count);
            println!("  Disk usage:            {} bytes", stats.disk_usage_bytes);
        }
        AdminCommands::ImportItems { path } => {
            let count = import_items(&storage, Path::new(&path))?;
            println!("Imported {} items from {}", count, path);
        }
        AdminCommands::ImportClustering {
            assignments,
            clusters,
        } => {
            if assignments.is_none() && clusters.is_none() {
                anyhow::bail!("Nothing to import: pass --assignments and/or --clusters");
            }
            if let Some(path) = assignments {
                let count = import_assignments(&storage, Path::new(&path))?;
                println!("Imported {} assignments from {}", count, path);
            }
            if let Some(path) = clusters {
                let count = import_clusters(&storage, Path::new(&path))?;
                println!("Imported {} persisted clusters from {}", count, path);
            }
        }
    }

    storage.flush().context("Failed to flush storage")?;
    Ok(())
}

/// Parse a JSON-lines file, skipping blank lines.
fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid record", path.display(), index + 1))
        })
        .collect()
}

/// Import items; every line must parse before anything is written.
pub fn import_items(storage: &Storage, path: &Path) -> Result<usize> {
    let items: Vec<Item> = read_jsonl(path)?;
    for item in &items {
        storage
            .put_item(item)
            .with_context(|| format!("Failed to store item {}", item.id))?;
    }
    info!(count = items.len(), path = %path.display(), "Imported items");
    Ok(items.len())
}

/// Import persisted assignments.
pub fn import_assignments(storage: &Storage, path: &Path) -> Result<usize> {
    let assignments: Vec<PersistedAssignment> = read_jsonl(path)?;
    for assignment in &assignments {
        storage
            .put_assignment(assignment)
            .with_context(|| format!("Failed to store assignment for {}", assignment.item_id))?;
    }
    Ok(assignments.len())
}

/// Import persisted cluster metadata.
pub fn import_clusters(storage: &Storage, path: &Path) -> Result<usize> {
    let clusters: Vec<PersistedClusterMeta> = read_jsonl(path)?;
    for meta in &clusters {
        storage
            .put_persisted_cluster(meta)
            .with_context(|| format!("Failed to store persisted cluster {}", meta.id))?;
    }
    Ok(clusters.len())
}

/// Default path of the latest artifact for a report mode.
pub fn latest_report_path(settings: &Settings, mode: ReportMode) -> PathBuf {
    settings
        .expanded_report_dir()
        .join(format!("{}-latest.json", mode.prefix()))
}

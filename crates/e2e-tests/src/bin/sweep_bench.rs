use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use e2e_tests::{ingest_items, reference_now, seeded_settings, synthetic_items, TestHarness};
use story_types::{ClusteringSettings, DEFAULT_SWEEP_THRESHOLDS};

const DEFAULT_ITERATIONS: usize = 3;
const EMBEDDING_DIM: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "sweep_bench", about = "Story clustering threshold sweep benchmark")]
struct Args {
    #[arg(long, value_enum, default_value = "small")]
    tier: DatasetTier,
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    #[arg(long, default_value_t = 17)]
    seed: u64,
    /// Write the JSON summary here as well as printing it
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum DatasetTier {
    Small,
    Medium,
    Large,
}

impl DatasetTier {
    /// (topics, items per topic, noise items)
    fn shape(&self) -> (usize, usize, usize) {
        match self {
            DatasetTier::Small => (10, 8, 120),
            DatasetTier::Medium => (40, 10, 600),
            DatasetTier::Large => (120, 12, 2500),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StepMetrics {
    p50_ms: f64,
    p90_ms: f64,
    max_ms: f64,
    samples: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ThresholdOutcome {
    cluster_count: usize,
    covered_items: usize,
    story_like_count: usize,
    edge_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct BenchmarkOutput {
    tier: DatasetTier,
    iterations: usize,
    items: usize,
    generated_at: String,
    steps: BTreeMap<String, StepMetrics>,
    thresholds: BTreeMap<String, ThresholdOutcome>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();
    if args.iterations == 0 {
        return Err("--iterations must be at least 1".to_string());
    }

    let (topics, per_topic, noise) = args.tier.shape();
    let items = synthetic_items(args.seed, topics, per_topic, noise, EMBEDDING_DIM, 20.0);
    let harness = TestHarness::new();

    let ingest_started = Instant::now();
    ingest_items(&harness.storage, &items);
    let ingest_ms = ingest_started.elapsed().as_secs_f64() * 1000.0;

    let settings = ClusteringSettings {
        sweep_thresholds: DEFAULT_SWEEP_THRESHOLDS.to_vec(),
        ..seeded_settings()
    };
    let pipeline = harness.pipeline(settings.clone());

    let mut samples: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    samples.entry("ingest".to_string()).or_default().push(ingest_ms);
    let mut thresholds = BTreeMap::new();

    for _ in 0..args.iterations {
        let started = Instant::now();
        let report = pipeline
            .run_sweep(reference_now(), &settings.sweep_thresholds)
            .await
            .map_err(|e| format!("Sweep failed: {e}"))?;
        let total_ms = started.elapsed().as_secs_f64() * 1000.0;

        samples.entry("sweep_total".to_string()).or_default().push(total_ms);
        samples
            .entry("similarity_matrix".to_string())
            .or_default()
            .push(report.matrix_ms as f64);
        for row in &report.rows {
            let key = format!("{:.2}", row.threshold);
            samples
                .entry(format!("threshold_{}", key))
                .or_default()
                .push(row.elapsed_ms as f64);
            thresholds.insert(
                key,
                ThresholdOutcome {
                    cluster_count: row.cluster_count,
                    covered_items: row.covered_items,
                    story_like_count: row.story_like_count,
                    edge_count: row.edge_count,
                },
            );
        }
    }

    let output = BenchmarkOutput {
        tier: args.tier,
        iterations: args.iterations,
        items: items.len(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        steps: samples
            .iter()
            .map(|(step, values)| (step.clone(), summarize(values)))
            .collect(),
        thresholds,
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| format!("Failed to serialize output: {e}"))?;
    if let Some(path) = &args.out {
        fs::write(path, &json).map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
    }

    println!("{}", render_table(&output));
    println!("\n{}", json);
    Ok(())
}

fn summarize(values: &[f64]) -> StepMetrics {
    StepMetrics {
        p50_ms: percentile(values, 50.0),
        p90_ms: percentile(values, 90.0),
        max_ms: values.iter().copied().fold(0.0, f64::max),
        samples: values.len(),
    }
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (percentile / 100.0) * (sorted.len() - 1) as f64;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        return sorted[low];
    }
    let weight = rank - low as f64;
    sorted[low] * (1.0 - weight) + sorted[high] * weight
}

fn render_table(output: &BenchmarkOutput) -> String {
    let mut lines = vec![
        format!(
            "Sweep benchmark ({:?}, {} items, {} iterations)",
            output.tier, output.items, output.iterations
        ),
        format!("{:<22} {:>10} {:>10} {:>10}", "step", "p50 ms", "p90 ms", "max ms"),
    ];
    for (step, m) in &output.steps {
        lines.push(format!(
            "{:<22} {:>10.2} {:>10.2} {:>10.2}",
            step, m.p50_ms, m.p90_ms, m.max_ms
        ));
    }

    lines.push(String::new());
    lines.push(format!(
        "{:<10} {:>9} {:>9} {:>9} {:>9}",
        "threshold", "clusters", "covered", "stories", "edges"
    ));
    for (threshold, t) in &output.thresholds {
        lines.push(format!(
            "{:<10} {:>9} {:>9} {:>9} {:>9}",
            threshold, t.cluster_count, t.covered_items, t.story_like_count, t.edge_count
        ));
    }
    lines.join("\n")
}

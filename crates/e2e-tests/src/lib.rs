//! End-to-end test infrastructure for story-cluster.
//!
//! Provides a shared TestHarness and helper functions for E2E tests
//! covering the full store-to-report pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use story_cluster::{FsReportSink, StorageSource, StoryPipeline};
use story_storage::Storage;
use story_types::{ClusteringSettings, Item, PersistedAssignment, PersistedClusterMeta};

/// Shared test harness for E2E tests.
///
/// Provides storage, a report directory, and helper methods for setting up
/// end-to-end test scenarios.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Shared storage instance
    pub storage: Arc<Storage>,
    /// Directory for report artifacts
    pub report_dir: PathBuf,
}

impl TestHarness {
    /// Create a new test harness with temp directory and storage.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage = Arc::new(
            Storage::open(&temp_dir.path().join("db")).expect("Failed to open test storage"),
        );
        let report_dir = temp_dir.path().join("reports");

        Self {
            _temp_dir: temp_dir,
            storage,
            report_dir,
        }
    }

    /// Item source and persisted store backed by the harness storage.
    pub fn source(&self) -> Arc<StorageSource> {
        Arc::new(StorageSource::new(self.storage.clone()))
    }

    /// Pipeline over the harness storage, with reconciliation wired in.
    pub fn pipeline(&self, settings: ClusteringSettings) -> StoryPipeline {
        let source = self.source();
        StoryPipeline::new(source.clone(), settings).with_persisted_store(source)
    }

    /// Report sink writing into the harness report directory.
    pub fn sink(&self) -> FsReportSink {
        FsReportSink::new(self.report_dir.clone())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed reference time used as "now" by the scenarios.
pub fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()
}

/// Settings with seeded coherence sampling.
pub fn seeded_settings() -> ClusteringSettings {
    ClusteringSettings {
        coherence_seed: Some(42),
        ..ClusteringSettings::default()
    }
}

/// Create an eligible item `hours_ago` before [`reference_now`].
pub fn make_item(id: &str, author: &str, hours_ago: f64, text: &str, vector: Vec<f32>) -> Item {
    let created_at = reference_now() - Duration::milliseconds((hours_ago * 3_600_000.0) as i64);
    Item::new(id, id, created_at, text)
        .with_author(author)
        .with_normalized_text(text.to_lowercase())
        .with_embedding(vector)
}

/// Store items.
pub fn ingest_items(storage: &Storage, items: &[Item]) {
    for item in items {
        storage.put_item(item).expect("Failed to put item");
    }
}

/// Store a persisted clustering: assignments plus one metadata record per cluster.
pub fn persist_clustering(
    storage: &Storage,
    assignments: &[(&str, i64)],
    clusters: &[PersistedClusterMeta],
) {
    for (item_id, cluster_id) in assignments {
        storage
            .put_assignment(&PersistedAssignment {
                item_id: item_id.to_string(),
                cluster_id: *cluster_id,
            })
            .expect("Failed to put assignment");
    }
    for meta in clusters {
        storage
            .put_persisted_cluster(meta)
            .expect("Failed to put persisted cluster");
    }
}

/// Random unit vector of `dim` components.
pub fn random_unit_vector(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    let v: Vec<f32> = (0..dim).map(|_| rng.random_range(-1.0f32..1.0)).collect();
    normalize(v)
}

/// `base` plus uniform noise of magnitude `noise`, re-normalized.
pub fn perturb(rng: &mut StdRng, base: &[f32], noise: f32) -> Vec<f32> {
    normalize(
        base.iter()
            .map(|x| x + rng.random_range(-noise..noise))
            .collect(),
    )
}

fn normalize(v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v;
    }
    v.into_iter().map(|x| x / norm).collect()
}

/// Synthetic topical dataset: `topics` groups of `per_topic` items whose
/// vectors are noisy copies of a per-topic centroid, plus `noise_items`
/// unrelated items. Items are spread over the last `hours` hours.
pub fn synthetic_items(
    seed: u64,
    topics: usize,
    per_topic: usize,
    noise_items: usize,
    dim: usize,
    hours: f64,
) -> Vec<Item> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut items = Vec::with_capacity(topics * per_topic + noise_items);

    for t in 0..topics {
        let centroid = random_unit_vector(&mut rng, dim);
        for m in 0..per_topic {
            let vector = perturb(&mut rng, &centroid, 0.05);
            items.push(make_item(
                &format!("t{}-m{}", t, m),
                &format!("user{}", rng.random_range(0..50)),
                rng.random_range(0.0..hours),
                &format!("topic{} update number {}", t, m),
                vector,
            ));
        }
    }

    for n in 0..noise_items {
        items.push(make_item(
            &format!("noise-{}", n),
            &format!("lurker{}", n),
            rng.random_range(0.0..hours),
            &format!("unrelated chatter {}", n),
            random_unit_vector(&mut rng, dim),
        ));
    }

    items
}

//! End-to-end clustering runs.
//!
//! A pipeline loads one snapshot for the lookback window and then either
//! produces a detailed report at a single threshold or a sweep report over
//! several thresholds. Nothing is written here; callers hand the finished
//! report to a sink only after the run succeeded.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};
use ulid::Ulid;

use story_types::ClusteringSettings;

use crate::cluster::{normalize_clusters, Cluster, ClusterFilter};
use crate::coherence::CoherenceScorer;
use crate::error::ClusterError;
use crate::graph::{build_edges, SimilarityGraph};
use crate::loader::VectorLoader;
use crate::metrics::{MetricsEngine, StoryRules};
use crate::reconcile::{Reconciler, VerdictCounts};
use crate::report::{
    AnomalyRules, ClusterRecord, ReportMode, ReportSummary, RunParameters, StoryReport,
    SweepParameters, SweepReport,
};
use crate::snapshot::Snapshot;
use crate::source::{ItemSource, PersistedClusterStore};
use crate::sweep::SweepEvaluator;

/// Clusters found at one threshold.
#[derive(Debug, Clone)]
pub struct Detection {
    pub clusters: Vec<Cluster>,
    pub edge_count: usize,
}

/// Orchestrates loading, clustering, scoring and reconciliation.
pub struct StoryPipeline {
    source: Arc<dyn ItemSource>,
    persisted: Option<Arc<dyn PersistedClusterStore>>,
    settings: ClusteringSettings,
}

impl StoryPipeline {
    pub fn new(source: Arc<dyn ItemSource>, settings: ClusteringSettings) -> Self {
        Self {
            source,
            persisted: None,
            settings,
        }
    }

    /// Attach the persisted clustering used for reconciliation.
    pub fn with_persisted_store(mut self, store: Arc<dyn PersistedClusterStore>) -> Self {
        self.persisted = Some(store);
        self
    }

    pub fn settings(&self) -> &ClusteringSettings {
        &self.settings
    }

    fn filter(&self) -> ClusterFilter {
        ClusterFilter::new(self.settings.min_cluster_size, self.settings.max_day_span)
    }

    fn validate(&self) -> Result<(), ClusterError> {
        self.settings.validate().map_err(ClusterError::InvalidConfig)
    }

    /// Load the eligible items for the lookback window ending at `now`.
    #[instrument(skip(self))]
    pub async fn load_snapshot(&self, now: DateTime<Utc>) -> Result<Snapshot, ClusterError> {
        let hours = self.settings.effective_lookback_hours();
        if hours != self.settings.lookback_hours {
            warn!(
                requested = self.settings.lookback_hours,
                effective = hours,
                "Lookback window clamped"
            );
        }
        let since = now - Duration::hours(i64::from(hours));

        let items = VectorLoader::new(self.source.as_ref(), self.settings.page_size)
            .load(since)
            .await?;
        let snapshot = Snapshot::build(items);

        info!(
            eligible = snapshot.eligible_count(),
            embedded = snapshot.len(),
            skipped = snapshot.skipped(),
            "Built snapshot"
        );
        Ok(snapshot)
    }

    /// Build the graph at `threshold` and return the filtered clusters.
    pub fn detect(&self, snapshot: &Snapshot, threshold: f64) -> Detection {
        let edges = build_edges(snapshot.vectors(), threshold);
        let graph = SimilarityGraph::from_edges(snapshot.len(), &edges);
        let clusters = normalize_clusters(snapshot, graph.connected_components(), &self.filter());
        Detection {
            clusters,
            edge_count: graph.edge_count(),
        }
    }

    /// Detailed run at the configured threshold.
    ///
    /// Reconciliation runs when enabled in settings; it requires a persisted
    /// store and any lookup failure fails the run.
    #[instrument(skip(self))]
    pub async fn run_detailed(&self, now: DateTime<Utc>) -> Result<StoryReport, ClusterError> {
        self.validate()?;
        let persisted = match (self.settings.reconcile, &self.persisted) {
            (true, None) => {
                return Err(ClusterError::InvalidConfig(
                    "Reconciliation requested without a persisted clustering store".to_string(),
                ))
            }
            (true, Some(store)) => Some(store.clone()),
            (false, _) => None,
        };

        let snapshot = self.load_snapshot(now).await?;

        let started = Instant::now();
        let detection = self.detect(&snapshot, self.settings.threshold);
        info!(
            threshold = self.settings.threshold,
            edges = detection.edge_count,
            clusters = detection.clusters.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Detected clusters"
        );

        let mut engine = MetricsEngine::new(
            StoryRules {
                min_items: self.settings.story_min_items,
                min_authors: self.settings.story_min_authors,
            },
            self.settings.token_cap,
            CoherenceScorer::new(self.settings.coherence_sample_cap, self.settings.coherence_seed),
        );
        let metrics = engine.measure_all(&snapshot, &detection.clusters);

        let anomaly_rules = AnomalyRules::from_settings(&self.settings);
        let mut records: Vec<ClusterRecord> = detection
            .clusters
            .iter()
            .zip(&metrics)
            .map(|(cluster, m)| {
                ClusterRecord::new(
                    &snapshot,
                    cluster,
                    m,
                    self.settings.headline_samples,
                    &anomaly_rules,
                )
            })
            .collect();

        let mut verdict_counts = None;
        if let Some(store) = persisted {
            let verdicts = Reconciler::new(store.as_ref())
                .reconcile(&snapshot, &detection.clusters)
                .await?;
            records = records
                .into_iter()
                .zip(&verdicts)
                .map(|(record, verdict)| record.with_verdict(verdict))
                .collect();
            verdict_counts = Some(VerdictCounts::tally(&verdicts));
        }

        let mut summary = ReportSummary::from_records(&snapshot, &records);
        if let Some(counts) = verdict_counts {
            summary = summary.with_verdicts(counts);
        }

        info!(
            clusters = summary.cluster_count,
            covered = summary.covered_items,
            stories = summary.story_candidates,
            "Detailed run complete"
        );

        Ok(StoryReport {
            run_id: new_run_id(now),
            mode: ReportMode::Detailed,
            generated_at: now,
            parameters: RunParameters::from_settings(&self.settings),
            summary,
            clusters: records,
        })
    }

    /// Sweep the given thresholds against one snapshot.
    #[instrument(skip(self))]
    pub async fn run_sweep(
        &self,
        now: DateTime<Utc>,
        thresholds: &[f64],
    ) -> Result<SweepReport, ClusterError> {
        self.validate()?;
        if thresholds.is_empty() {
            return Err(ClusterError::InvalidInput(
                "Sweep needs at least one threshold".to_string(),
            ));
        }
        if let Some(bad) = thresholds.iter().find(|t| !(-1.0..=1.0).contains(*t)) {
            return Err(ClusterError::InvalidInput(format!(
                "Sweep threshold {} outside [-1, 1]",
                bad
            )));
        }

        let snapshot = self.load_snapshot(now).await?;
        let outcome = SweepEvaluator::new(self.filter(), self.settings.story_like_size)
            .run(&snapshot, thresholds);

        Ok(SweepReport {
            run_id: new_run_id(now),
            mode: ReportMode::Sweep,
            generated_at: now,
            parameters: SweepParameters {
                lookback_hours: self.settings.effective_lookback_hours(),
                thresholds: outcome.rows.iter().map(|r| r.threshold).collect(),
                min_cluster_size: self.settings.min_cluster_size,
                max_day_span: self.settings.max_day_span,
                story_like_size: self.settings.story_like_size,
            },
            eligible_items: snapshot.eligible_count(),
            skipped_items: snapshot.skipped(),
            matrix_ms: outcome.matrix_ms,
            rows: outcome.rows,
        })
    }
}

fn new_run_id(now: DateTime<Utc>) -> String {
    let timestamp_ms = now.timestamp_millis().max(0) as u64;
    Ulid::from_parts(timestamp_ms, rand::random()).to_string()
}

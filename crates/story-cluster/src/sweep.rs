//! Threshold sweep evaluator.
//!
//! Runs graph building, component extraction and filtering for several
//! thresholds against one snapshot. The similarity matrix is computed once
//! and re-filtered per threshold.

use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::cluster::{normalize_clusters, ClusterFilter};
use crate::graph::SimilarityGraph;
use crate::similarity::SimilarityMatrix;
use crate::snapshot::Snapshot;

/// Summary statistics for one threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub threshold: f64,
    pub cluster_count: usize,
    pub mean_size: f64,
    pub max_size: usize,
    /// Clusters with at least the story-like member count
    pub story_like_count: usize,
    /// Distinct items in any surviving cluster
    pub covered_items: usize,
    /// `covered_items` as a fraction of eligible items
    pub coverage: f64,
    pub edge_count: usize,
    pub elapsed_ms: u64,
}

/// Result of a full sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOutcome {
    /// Rows in ascending threshold order
    pub rows: Vec<SweepRow>,
    /// Time spent building the shared similarity matrix
    pub matrix_ms: u64,
}

/// Evaluates a list of thresholds against one snapshot.
#[derive(Debug, Clone)]
pub struct SweepEvaluator {
    filter: ClusterFilter,
    story_like_size: usize,
}

impl SweepEvaluator {
    pub fn new(filter: ClusterFilter, story_like_size: usize) -> Self {
        Self {
            filter,
            story_like_size,
        }
    }

    /// Run every threshold; duplicates are evaluated once.
    #[instrument(skip(self, snapshot), fields(items = snapshot.len()))]
    pub fn run(&self, snapshot: &Snapshot, thresholds: &[f64]) -> SweepOutcome {
        let started = Instant::now();
        let matrix = SimilarityMatrix::compute(snapshot.vectors());
        let matrix_ms = started.elapsed().as_millis() as u64;
        debug!(pairs = matrix.pair_count(), matrix_ms, "Computed similarity matrix");

        let mut ordered: Vec<f64> = thresholds.iter().copied().filter(|t| !t.is_nan()).collect();
        ordered.sort_by(|a, b| a.total_cmp(b));
        ordered.dedup();

        let rows: Vec<SweepRow> = ordered
            .into_iter()
            .map(|threshold| self.evaluate(snapshot, &matrix, threshold))
            .collect();

        info!(thresholds = rows.len(), matrix_ms, "Sweep complete");
        SweepOutcome { rows, matrix_ms }
    }

    fn evaluate(&self, snapshot: &Snapshot, matrix: &SimilarityMatrix, threshold: f64) -> SweepRow {
        let started = Instant::now();
        let graph = SimilarityGraph::from_matrix(matrix, threshold);
        let clusters = normalize_clusters(snapshot, graph.connected_components(), &self.filter);

        let sizes: Vec<usize> = clusters.iter().map(|c| c.member_count()).collect();
        let covered: HashSet<usize> = clusters
            .iter()
            .flat_map(|c| c.members.iter().copied())
            .collect();

        let cluster_count = sizes.len();
        let mean_size = if cluster_count == 0 {
            0.0
        } else {
            sizes.iter().sum::<usize>() as f64 / cluster_count as f64
        };
        let coverage = if snapshot.eligible_count() == 0 {
            0.0
        } else {
            covered.len() as f64 / snapshot.eligible_count() as f64
        };

        let row = SweepRow {
            threshold,
            cluster_count,
            mean_size,
            max_size: sizes.iter().copied().max().unwrap_or(0),
            story_like_count: sizes.iter().filter(|&&s| s >= self.story_like_size).count(),
            covered_items: covered.len(),
            coverage,
            edge_count: graph.edge_count(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        debug!(
            threshold,
            clusters = row.cluster_count,
            covered = row.covered_items,
            edges = row.edge_count,
            "Evaluated threshold"
        );
        row
    }
}

//! # story-cluster
//!
//! Story clustering and threshold calibration for short posts.
//!
//! Groups posts whose embeddings are similar into story clusters, scores
//! each cluster's lexical coherence, sweeps similarity thresholds and
//! reconciles fresh clusters against a previously persisted clustering.
//!
//! ## Pipeline
//!
//! Loader → similarity graph → connected components → size/span filter →
//! {coherence and classification, sweep} → reconciliation → report.
//!
//! ## Modules
//!
//! - `source`: External collaborator traits and the RocksDB-backed source
//! - `loader`: Paged loading of the eligible item set
//! - `snapshot`: Immutable parsed view shared by every threshold
//! - `similarity`: Cosine similarity and the pairwise matrix
//! - `graph`: Similarity edges and connected components
//! - `cluster`: Filtering and id assignment
//! - `tokenize` / `coherence` / `metrics`: Lexical coherence and story classification
//! - `sweep`: Threshold sweep statistics
//! - `reconcile`: Verdicts against the persisted clustering
//! - `report` / `pipeline`: Report records, sinks and end-to-end runs

pub mod cluster;
pub mod coherence;
pub mod error;
pub mod graph;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod similarity;
pub mod snapshot;
pub mod source;
pub mod sweep;
pub mod tokenize;

pub use cluster::{normalize_clusters, Cluster, ClusterFilter};
pub use coherence::CoherenceScorer;
pub use error::ClusterError;
pub use graph::{build_edges, SimilarityEdge, SimilarityGraph};
pub use loader::VectorLoader;
pub use metrics::{unique_author_count, ClusterMetrics, MetricsEngine, StoryRules};
pub use pipeline::{Detection, StoryPipeline};
pub use reconcile::{MappedCluster, ReconciliationVerdict, Reconciler, VerdictCounts};
pub use report::{
    ClusterRecord, FsReportSink, ReportMode, ReportSink, ReportSummary, StoryReport,
    SweepReport, WrittenReport,
};
pub use similarity::{cosine_similarity, SimilarityMatrix};
pub use snapshot::Snapshot;
pub use source::{ItemPage, ItemSource, PageRequest, PersistedClusterStore, StorageSource};
pub use sweep::{SweepEvaluator, SweepOutcome, SweepRow};
pub use tokenize::{jaccard, tokenize, TokenSet};

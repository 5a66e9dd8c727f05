//! Report records and the report sink.
//!
//! Reports are plain serde structs serialized as pretty JSON. The sink
//! writes a timestamped artifact and then overwrites the matching
//! `-latest` artifact.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use story_types::ClusteringSettings;

use crate::cluster::Cluster;
use crate::error::ClusterError;
use crate::metrics::ClusterMetrics;
use crate::reconcile::{MappedCluster, ReconciliationVerdict, VerdictCounts};
use crate::snapshot::Snapshot;
use crate::sweep::SweepRow;

/// Which pipeline produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    Detailed,
    Sweep,
}

impl ReportMode {
    /// File name prefix for artifacts of this mode.
    pub fn prefix(&self) -> &'static str {
        match self {
            ReportMode::Detailed => "clusters",
            ReportMode::Sweep => "sweep",
        }
    }
}

/// Input parameters echoed into a detailed report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    pub lookback_hours: u32,
    pub threshold: f64,
    pub min_cluster_size: usize,
    pub max_day_span: f64,
    pub reconcile: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coherence_seed: Option<u64>,
}

impl RunParameters {
    pub fn from_settings(settings: &ClusteringSettings) -> Self {
        Self {
            lookback_hours: settings.effective_lookback_hours(),
            threshold: settings.threshold,
            min_cluster_size: settings.min_cluster_size,
            max_day_span: settings.max_day_span,
            reconcile: settings.reconcile,
            coherence_seed: settings.coherence_seed,
        }
    }
}

/// Thresholds that flag a cluster as anomalous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyRules {
    pub mega_cluster_size: usize,
    pub low_coherence_threshold: f64,
    pub low_coherence_min_size: usize,
}

impl AnomalyRules {
    pub fn from_settings(settings: &ClusteringSettings) -> Self {
        Self {
            mega_cluster_size: settings.mega_cluster_size,
            low_coherence_threshold: settings.low_coherence_threshold,
            low_coherence_min_size: settings.low_coherence_min_size,
        }
    }

    pub fn flags(&self, member_count: usize, coherence: Option<f64>) -> ClusterFlags {
        ClusterFlags {
            mega: member_count >= self.mega_cluster_size,
            low_coherence: member_count >= self.low_coherence_min_size
                && coherence.is_some_and(|c| c < self.low_coherence_threshold),
        }
    }
}

/// Anomaly flags for one cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterFlags {
    pub mega: bool,
    pub low_coherence: bool,
}

/// Serialized reconciliation verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    /// `exact-match`, `partial-match`, `split-in-persistent` or `all-new`
    pub verdict: String,
    pub unassigned: usize,
    pub mapped: Vec<MappedCluster>,
}

impl From<&ReconciliationVerdict> for VerdictRecord {
    fn from(verdict: &ReconciliationVerdict) -> Self {
        Self {
            verdict: verdict.label().to_string(),
            unassigned: verdict.unassigned(),
            mapped: verdict.mapped().to_vec(),
        }
    }
}

/// One cluster in a detailed report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub id: u32,
    pub member_count: usize,
    pub unique_authors: usize,
    pub coherence: Option<f64>,
    pub is_story_candidate: bool,
    pub span_hours: f64,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    /// First distinct member headlines in timestamp order
    pub headlines: Vec<String>,
    pub member_ids: Vec<String>,
    pub flags: ClusterFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<VerdictRecord>,
}

impl ClusterRecord {
    pub fn new(
        snapshot: &Snapshot,
        cluster: &Cluster,
        metrics: &ClusterMetrics,
        headline_samples: usize,
        rules: &AnomalyRules,
    ) -> Self {
        let mut members: Vec<usize> = cluster.members.clone();
        members.sort_by(|&a, &b| {
            let (a, b) = (snapshot.item(a), snapshot.item(b));
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        });

        let mut seen = HashSet::new();
        let headlines: Vec<String> = members
            .iter()
            .map(|&i| snapshot.item(i).headline().trim().to_string())
            .filter(|h| !h.is_empty() && seen.insert(h.clone()))
            .take(headline_samples)
            .collect();

        Self {
            id: cluster.id,
            member_count: cluster.member_count(),
            unique_authors: metrics.unique_authors,
            coherence: metrics.coherence,
            is_story_candidate: metrics.is_story_candidate,
            span_hours: metrics.span_hours,
            earliest: cluster.earliest,
            latest: cluster.latest,
            headlines,
            member_ids: members.iter().map(|&i| snapshot.item(i).id.clone()).collect(),
            flags: rules.flags(cluster.member_count(), metrics.coherence),
            reconciliation: None,
        }
    }

    pub fn with_verdict(mut self, verdict: &ReconciliationVerdict) -> Self {
        self.reconciliation = Some(VerdictRecord::from(verdict));
        self
    }
}

/// Summary block of a detailed report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub eligible_items: usize,
    /// Items excluded for an unusable embedding
    pub skipped_items: usize,
    pub cluster_count: usize,
    pub covered_items: usize,
    pub coverage_pct: f64,
    pub story_candidates: usize,
    pub average_coherence: Option<f64>,
    pub median_coherence: Option<f64>,
    pub mega_clusters: usize,
    pub low_coherence_clusters: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdicts: Option<VerdictCounts>,
}

impl ReportSummary {
    pub fn from_records(snapshot: &Snapshot, records: &[ClusterRecord]) -> Self {
        let covered: HashSet<&str> = records
            .iter()
            .flat_map(|r| r.member_ids.iter().map(String::as_str))
            .collect();
        let coherences: Vec<f64> = records.iter().filter_map(|r| r.coherence).collect();
        let eligible = snapshot.eligible_count();

        Self {
            eligible_items: eligible,
            skipped_items: snapshot.skipped(),
            cluster_count: records.len(),
            covered_items: covered.len(),
            coverage_pct: if eligible == 0 {
                0.0
            } else {
                covered.len() as f64 * 100.0 / eligible as f64
            },
            story_candidates: records.iter().filter(|r| r.is_story_candidate).count(),
            average_coherence: mean(&coherences),
            median_coherence: median(&coherences),
            mega_clusters: records.iter().filter(|r| r.flags.mega).count(),
            low_coherence_clusters: records.iter().filter(|r| r.flags.low_coherence).count(),
            verdicts: None,
        }
    }

    pub fn with_verdicts(mut self, counts: VerdictCounts) -> Self {
        self.verdicts = Some(counts);
        self
    }
}

/// Output of a detailed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryReport {
    pub run_id: String,
    pub mode: ReportMode,
    pub generated_at: DateTime<Utc>,
    pub parameters: RunParameters,
    pub summary: ReportSummary,
    pub clusters: Vec<ClusterRecord>,
}

/// Input parameters echoed into a sweep report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepParameters {
    pub lookback_hours: u32,
    pub thresholds: Vec<f64>,
    pub min_cluster_size: usize,
    pub max_day_span: f64,
    pub story_like_size: usize,
}

/// Output of a threshold sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub run_id: String,
    pub mode: ReportMode,
    pub generated_at: DateTime<Utc>,
    pub parameters: SweepParameters,
    pub eligible_items: usize,
    pub skipped_items: usize,
    pub matrix_ms: u64,
    pub rows: Vec<SweepRow>,
}

/// Mean of the values; `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median of the values; `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Paths written for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    pub timestamped: PathBuf,
    pub latest: PathBuf,
}

/// Destination for serialized reports.
pub trait ReportSink: Send + Sync {
    /// Write `body` as both a timestamped and a latest artifact.
    fn write(
        &self,
        prefix: &str,
        generated_at: DateTime<Utc>,
        body: &[u8],
    ) -> Result<WrittenReport, ClusterError>;
}

/// Writes reports as JSON files into a directory.
#[derive(Debug, Clone)]
pub struct FsReportSink {
    dir: PathBuf,
}

impl FsReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `body` to a timestamped file that did not exist before.
    ///
    /// A run stamped with the same millisecond as an earlier artifact gets a
    /// numeric suffix instead of replacing it.
    fn write_new(&self, prefix: &str, stamp: &str, body: &[u8]) -> Result<PathBuf, ClusterError> {
        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => format!("{}-{}.json", prefix, stamp),
                n => format!("{}-{}-{}.json", prefix, stamp, n),
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(body)?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Serialize and write a report.
    pub fn write_json<T: Serialize>(
        &self,
        prefix: &str,
        generated_at: DateTime<Utc>,
        report: &T,
    ) -> Result<WrittenReport, ClusterError> {
        let body = serde_json::to_vec_pretty(report)?;
        self.write(prefix, generated_at, &body)
    }
}

impl ReportSink for FsReportSink {
    fn write(
        &self,
        prefix: &str,
        generated_at: DateTime<Utc>,
        body: &[u8],
    ) -> Result<WrittenReport, ClusterError> {
        fs::create_dir_all(&self.dir)?;

        let stamp = generated_at.format("%Y%m%dT%H%M%S%3fZ").to_string();
        let timestamped = self.write_new(prefix, &stamp, body)?;
        let latest = self.dir.join(format!("{}-latest.json", prefix));

        // Swap the latest artifact in whole so readers never see a partial file
        let staging = self.dir.join(format!(".{}-latest.json.tmp", prefix));
        fs::write(&staging, body)?;
        fs::rename(&staging, &latest)?;

        info!(path = %timestamped.display(), bytes = body.len(), "Wrote report");
        Ok(WrittenReport { timestamped, latest })
    }
}

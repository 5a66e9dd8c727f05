//! Cluster filtering and normalization.
//!
//! Turns raw components into clusters: drops those that are too small or
//! span too long, then orders the survivors by earliest member timestamp
//! and assigns dense 1-based ids.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::snapshot::Snapshot;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Size and span limits applied to every component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterFilter {
    /// Minimum member count
    pub min_size: usize,
    /// Maximum span between earliest and latest member, in days
    pub max_day_span: f64,
}

impl ClusterFilter {
    pub fn new(min_size: usize, max_day_span: f64) -> Self {
        Self {
            min_size,
            max_day_span,
        }
    }

    /// Whether a component with these properties survives.
    pub fn accepts(&self, member_count: usize, span_days: f64) -> bool {
        member_count >= self.min_size && span_days <= self.max_day_span
    }
}

/// A filtered, numbered cluster of snapshot indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Dense 1-based id, ordered by earliest timestamp
    pub id: u32,
    /// Snapshot indices, ascending
    pub members: Vec<usize>,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

impl Cluster {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Span between earliest and latest member in hours.
    pub fn span_hours(&self) -> f64 {
        (self.latest - self.earliest).num_milliseconds() as f64 / MILLIS_PER_HOUR
    }

    /// Span between earliest and latest member in days.
    pub fn span_days(&self) -> f64 {
        self.span_hours() / 24.0
    }
}

/// Filter components and assign ids.
///
/// Survivors are stably sorted by earliest timestamp, so ties keep the
/// order in which components were supplied.
pub fn normalize_clusters(
    snapshot: &Snapshot,
    components: Vec<Vec<usize>>,
    filter: &ClusterFilter,
) -> Vec<Cluster> {
    let total = components.len();
    let mut survivors: Vec<Cluster> = components
        .into_iter()
        .filter_map(|members| {
            let mut times = members.iter().map(|&i| snapshot.item(i).created_at);
            let first = times.next()?;
            let (earliest, latest) =
                times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));

            let cluster = Cluster {
                id: 0,
                members,
                earliest,
                latest,
            };
            filter
                .accepts(cluster.member_count(), cluster.span_days())
                .then_some(cluster)
        })
        .collect();

    survivors.sort_by_key(|c| c.earliest);
    for (index, cluster) in survivors.iter_mut().enumerate() {
        cluster.id = index as u32 + 1;
    }

    debug!(
        components = total,
        kept = survivors.len(),
        "Filtered components"
    );
    survivors
}

//! Reconciliation against a persisted clustering.
//!
//! Each fresh cluster's members are looked up in the persisted assignment
//! table. The verdict describes how the fresh cluster relates to the
//! persisted clusters its members already belong to.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use story_types::{PersistedClusterId, PersistedClusterMeta};

use crate::cluster::Cluster;
use crate::error::ClusterError;
use crate::snapshot::Snapshot;
use crate::source::PersistedClusterStore;

/// Item ids per assignment lookup call.
const LOOKUP_CHUNK: usize = 500;

/// A persisted cluster that shares members with a fresh cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedCluster {
    pub persisted_id: PersistedClusterId,
    /// Fresh members assigned to this persisted cluster
    pub overlap: usize,
    pub headline: Option<String>,
    /// Total members of the persisted cluster, when metadata exists
    pub total_members: Option<usize>,
    pub is_story: Option<bool>,
}

impl MappedCluster {
    fn new(persisted_id: PersistedClusterId, overlap: usize) -> Self {
        Self {
            persisted_id,
            overlap,
            headline: None,
            total_members: None,
            is_story: None,
        }
    }

    fn with_meta(mut self, meta: Option<&PersistedClusterMeta>) -> Self {
        if let Some(meta) = meta {
            self.headline = meta.headline.clone();
            self.total_members = Some(meta.member_count);
            self.is_story = Some(meta.is_story);
        }
        self
    }
}

/// How a fresh cluster relates to the persisted clustering.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationVerdict {
    /// Every member maps to the same single persisted cluster
    ExactMatch { cluster: MappedCluster },
    /// Some members are unassigned and others map to persisted clusters
    PartialMatch {
        unassigned: usize,
        mapped: Vec<MappedCluster>,
    },
    /// Every member is assigned, across more than one persisted cluster
    SplitInPersistent { mapped: Vec<MappedCluster> },
    /// No member is assigned
    AllNew { unassigned: usize },
}

impl ReconciliationVerdict {
    /// Classify from the unassigned count and the ranked mapped list.
    ///
    /// Any unassigned member makes the verdict partial unless nothing is
    /// mapped at all.
    pub fn classify(unassigned: usize, mut mapped: Vec<MappedCluster>) -> Self {
        if mapped.is_empty() {
            return Self::AllNew { unassigned };
        }
        if unassigned > 0 {
            return Self::PartialMatch { unassigned, mapped };
        }
        if mapped.len() == 1 {
            if let Some(cluster) = mapped.pop() {
                return Self::ExactMatch { cluster };
            }
        }
        Self::SplitInPersistent { mapped }
    }

    /// Stable kebab-case label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExactMatch { .. } => "exact-match",
            Self::PartialMatch { .. } => "partial-match",
            Self::SplitInPersistent { .. } => "split-in-persistent",
            Self::AllNew { .. } => "all-new",
        }
    }

    pub fn unassigned(&self) -> usize {
        match self {
            Self::PartialMatch { unassigned, .. } | Self::AllNew { unassigned } => *unassigned,
            Self::ExactMatch { .. } | Self::SplitInPersistent { .. } => 0,
        }
    }

    /// Mapped persisted clusters, highest overlap first.
    pub fn mapped(&self) -> &[MappedCluster] {
        match self {
            Self::ExactMatch { cluster } => std::slice::from_ref(cluster),
            Self::PartialMatch { mapped, .. } | Self::SplitInPersistent { mapped } => mapped,
            Self::AllNew { .. } => &[],
        }
    }
}

/// Counts of each verdict across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictCounts {
    pub exact_match: usize,
    pub partial_match: usize,
    pub split_in_persistent: usize,
    pub all_new: usize,
}

impl VerdictCounts {
    pub fn tally<'a>(verdicts: impl IntoIterator<Item = &'a ReconciliationVerdict>) -> Self {
        let mut counts = Self::default();
        for verdict in verdicts {
            match verdict {
                ReconciliationVerdict::ExactMatch { .. } => counts.exact_match += 1,
                ReconciliationVerdict::PartialMatch { .. } => counts.partial_match += 1,
                ReconciliationVerdict::SplitInPersistent { .. } => counts.split_in_persistent += 1,
                ReconciliationVerdict::AllNew { .. } => counts.all_new += 1,
            }
        }
        counts
    }
}

/// Compares fresh clusters to the persisted clustering.
pub struct Reconciler<'a> {
    store: &'a dyn PersistedClusterStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn PersistedClusterStore) -> Self {
        Self { store }
    }

    /// Produce one verdict per cluster, in cluster order.
    ///
    /// Any lookup failure aborts reconciliation for the whole run.
    #[instrument(skip_all, fields(clusters = clusters.len()))]
    pub async fn reconcile(
        &self,
        snapshot: &Snapshot,
        clusters: &[Cluster],
    ) -> Result<Vec<ReconciliationVerdict>, ClusterError> {
        let item_ids: Vec<String> = clusters
            .iter()
            .flat_map(|c| c.members.iter().map(|&i| snapshot.item(i).id.clone()))
            .collect();

        let mut assignments: HashMap<String, PersistedClusterId> = HashMap::new();
        for chunk in item_ids.chunks(LOOKUP_CHUNK) {
            assignments.extend(self.store.assignments(chunk).await?);
        }

        let persisted_ids: Vec<PersistedClusterId> = assignments
            .values()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let metas = if persisted_ids.is_empty() {
            HashMap::new()
        } else {
            self.store.cluster_meta(&persisted_ids).await?
        };

        debug!(
            items = item_ids.len(),
            assigned = assignments.len(),
            persisted = persisted_ids.len(),
            "Fetched persisted clustering"
        );

        let verdicts: Vec<ReconciliationVerdict> = clusters
            .iter()
            .map(|cluster| {
                let mut overlap: HashMap<PersistedClusterId, usize> = HashMap::new();
                let mut unassigned = 0;
                for &member in &cluster.members {
                    match assignments.get(&snapshot.item(member).id) {
                        Some(id) => *overlap.entry(*id).or_insert(0) += 1,
                        None => unassigned += 1,
                    }
                }

                let mut mapped: Vec<MappedCluster> = overlap
                    .into_iter()
                    .map(|(id, count)| MappedCluster::new(id, count).with_meta(metas.get(&id)))
                    .collect();
                mapped.sort_by(|a, b| {
                    b.overlap
                        .cmp(&a.overlap)
                        .then_with(|| a.persisted_id.cmp(&b.persisted_id))
                });

                ReconciliationVerdict::classify(unassigned, mapped)
            })
            .collect();

        let counts = VerdictCounts::tally(&verdicts);
        info!(
            exact = counts.exact_match,
            partial = counts.partial_match,
            split = counts.split_in_persistent,
            all_new = counts.all_new,
            "Reconciled clusters"
        );
        Ok(verdicts)
    }
}

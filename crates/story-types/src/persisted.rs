//! Records describing a previously persisted clustering.
//!
//! These are read-only baselines; the engine never writes them back.

use serde::{Deserialize, Serialize};

/// Identifier of a persisted cluster.
pub type PersistedClusterId = i64;

/// Item to persisted cluster mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAssignment {
    /// Item identifier
    pub item_id: String,
    /// Persisted cluster the item was assigned to
    pub cluster_id: PersistedClusterId,
}

/// Metadata for a persisted cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedClusterMeta {
    /// Persisted cluster identifier
    pub id: PersistedClusterId,
    /// Stored headline, if one was generated
    #[serde(default)]
    pub headline: Option<String>,
    /// Total members in the persisted cluster
    pub member_count: usize,
    /// Whether the persisted cluster was flagged as a story
    #[serde(default)]
    pub is_story: bool,
}

impl PersistedClusterMeta {
    /// Create metadata with no headline.
    pub fn new(id: PersistedClusterId, member_count: usize, is_story: bool) -> Self {
        Self {
            id,
            headline: None,
            member_count,
            is_story,
        }
    }

    /// Set the headline.
    pub fn with_headline(mut self, headline: impl Into<String>) -> Self {
        self.headline = Some(headline.into());
        self
    }
}

//! External collaborators consumed by the engine.
//!
//! The eligible-items query and the persisted clustering lookups live behind
//! traits so a run can read from the local RocksDB store or from any other
//! backend that honours the same contract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use story_storage::Storage;
use story_types::{Item, PersistedClusterId, PersistedClusterMeta};

use crate::error::ClusterError;

/// Request for one page of the eligible-items query.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Lower time bound of the lookback window
    pub since: DateTime<Utc>,
    /// Resume point returned by the previous page
    pub cursor: Option<String>,
    /// Maximum items per page
    pub limit: usize,
}

/// One page of eligible items.
#[derive(Debug, Clone, Default)]
pub struct ItemPage {
    pub items: Vec<Item>,
    /// `None` when no further page exists
    pub next_cursor: Option<String>,
}

/// Eligible-items query.
///
/// Implementations return only latest-version original posts with an
/// embedding and normalized text present.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Fetch one page of eligible items.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Source` if the page cannot be fetched.
    async fn fetch_page(&self, request: PageRequest) -> Result<ItemPage, ClusterError>;
}

/// Read access to a previously persisted clustering.
#[async_trait]
pub trait PersistedClusterStore: Send + Sync {
    /// Persisted cluster id per item; unassigned items are absent.
    async fn assignments(
        &self,
        item_ids: &[String],
    ) -> Result<HashMap<String, PersistedClusterId>, ClusterError>;

    /// Metadata per persisted cluster id; unknown ids are absent.
    async fn cluster_meta(
        &self,
        cluster_ids: &[PersistedClusterId],
    ) -> Result<HashMap<PersistedClusterId, PersistedClusterMeta>, ClusterError>;
}

/// Both collaborators backed by the local RocksDB store.
#[derive(Clone)]
pub struct StorageSource {
    storage: Arc<Storage>,
}

impl StorageSource {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ItemSource for StorageSource {
    async fn fetch_page(&self, request: PageRequest) -> Result<ItemPage, ClusterError> {
        let storage = self.storage.clone();
        let since_ms = request.since.timestamp_millis();

        let scan = tokio::task::spawn_blocking(move || {
            storage.get_items_page(since_ms, request.cursor.as_deref(), request.limit)
        })
        .await
        .map_err(|e| ClusterError::Source(format!("Scan task failed: {}", e)))?
        .map_err(|e| ClusterError::Source(e.to_string()))?;

        Ok(ItemPage {
            items: scan.items,
            next_cursor: scan.next_cursor,
        })
    }
}

#[async_trait]
impl PersistedClusterStore for StorageSource {
    async fn assignments(
        &self,
        item_ids: &[String],
    ) -> Result<HashMap<String, PersistedClusterId>, ClusterError> {
        let storage = self.storage.clone();
        let ids = item_ids.to_vec();

        tokio::task::spawn_blocking(move || storage.get_assignments(&ids))
            .await
            .map_err(|e| ClusterError::PersistedLookup(format!("Lookup task failed: {}", e)))?
            .map_err(|e| ClusterError::PersistedLookup(e.to_string()))
    }

    async fn cluster_meta(
        &self,
        cluster_ids: &[PersistedClusterId],
    ) -> Result<HashMap<PersistedClusterId, PersistedClusterMeta>, ClusterError> {
        let storage = self.storage.clone();
        let ids = cluster_ids.to_vec();

        tokio::task::spawn_blocking(move || storage.get_persisted_clusters(&ids))
            .await
            .map_err(|e| ClusterError::PersistedLookup(format!("Lookup task failed: {}", e)))?
            .map_err(|e| ClusterError::PersistedLookup(e.to_string()))
    }
}

//! RocksDB wrapper for the story item store.
//!
//! Provides:
//! - Database open with column family setup
//! - Versioned item writes with an atomic latest-version pointer
//! - Paged lookback scans returning only eligible items
//! - Batched reads of the persisted clustering

use std::collections::HashMap;
use std::path::Path;

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use story_types::{Item, PersistedAssignment, PersistedClusterId, PersistedClusterMeta};

use crate::column_families::{
    build_cf_descriptors, CF_ASSIGNMENTS, CF_ITEMS, CF_ITEM_LATEST, CF_PERSISTED_CLUSTERS,
};
use crate::error::StorageError;
use crate::keys::{AssignmentKey, ItemKey, LatestKey, PersistedClusterKey};

/// Pointer from a logical post to its newest stored version.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LatestPointer {
    item_id: String,
    version: u32,
}

/// One page of a lookback scan.
#[derive(Debug, Default)]
pub struct ItemScan {
    /// Eligible items in key order
    pub items: Vec<Item>,
    /// Key to resume after; `None` once the scan is exhausted
    pub next_cursor: Option<String>,
    /// Raw entries visited, including ineligible ones
    pub scanned: usize,
}

/// Main storage interface for the item store
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    // ==================== Item Methods ====================

    /// Store an item version.
    ///
    /// The latest-version pointer for the item's logical post moves to this
    /// item when its version is at least the currently recorded one. Both
    /// writes land in one batch.
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub fn put_item(&self, item: &Item) -> Result<ItemKey, StorageError> {
        let items_cf = self.cf(CF_ITEMS)?;
        let latest_cf = self.cf(CF_ITEM_LATEST)?;

        let key = ItemKey::new(item.timestamp_ms(), item.id.clone());
        let latest_key = LatestKey::new(item.external_id.clone());

        let mut batch = WriteBatch::default();
        batch.put_cf(items_cf, key.to_bytes(), item.to_bytes()?);

        let current: Option<LatestPointer> = match self.db.get_cf(latest_cf, latest_key.to_bytes())? {
            Some(bytes) => Some(serde_json::from_slice(&bytes)?),
            None => None,
        };
        let advance = current.map_or(true, |p| item.version >= p.version);
        if advance {
            let pointer = LatestPointer {
                item_id: item.id.clone(),
                version: item.version,
            };
            batch.put_cf(latest_cf, latest_key.to_bytes(), serde_json::to_vec(&pointer)?);
        }

        self.db.write(batch)?;
        debug!(advance, version = item.version, "Stored item");
        Ok(key)
    }

    /// Get an item version by timestamp and id.
    pub fn get_item(&self, key: &ItemKey) -> Result<Option<Item>, StorageError> {
        let items_cf = self.cf(CF_ITEMS)?;
        match self.db.get_cf(items_cf, key.to_bytes())? {
            Some(bytes) => Ok(Some(Item::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Scan one page of eligible items at or after `since_ms`.
    ///
    /// Eligible means: newest version of its logical post, an original post
    /// (no retweet/reply/quote), embedding present and normalized text
    /// non-empty. `cursor` is the `next_cursor` of the previous page.
    #[instrument(skip(self))]
    pub fn get_items_page(
        &self,
        since_ms: i64,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ItemScan, StorageError> {
        let items_cf = self.cf(CF_ITEMS)?;
        let latest_cf = self.cf(CF_ITEM_LATEST)?;

        let start = match cursor {
            Some(c) => c.as_bytes().to_vec(),
            None => ItemKey::prefix_start(since_ms),
        };

        let limit = limit.max(1);
        let mut scan = ItemScan::default();
        let mut last_key: Option<String> = None;
        let mut exhausted = true;

        let iter = self
            .db
            .iterator_cf(items_cf, IteratorMode::From(&start, Direction::Forward));

        for entry in iter {
            let (key, value) = entry?;
            if !key.starts_with(b"item:") {
                break;
            }
            // The cursor itself was returned on the previous page
            if cursor.is_some() && key.as_ref() == start.as_slice() {
                continue;
            }
            if scan.items.len() >= limit {
                exhausted = false;
                break;
            }

            scan.scanned += 1;
            let item = Item::from_bytes(&value)?;
            if item.is_eligible() && self.is_latest(latest_cf, &item)? {
                scan.items.push(item);
            }
            last_key = Some(String::from_utf8_lossy(&key).to_string());
        }

        scan.next_cursor = if exhausted { None } else { last_key };

        debug!(
            returned = scan.items.len(),
            scanned = scan.scanned,
            more = scan.next_cursor.is_some(),
            "Scanned item page"
        );
        Ok(scan)
    }

    fn is_latest(&self, latest_cf: &rocksdb::ColumnFamily, item: &Item) -> Result<bool, StorageError> {
        let key = LatestKey::new(item.external_id.clone());
        match self.db.get_cf(latest_cf, key.to_bytes())? {
            Some(bytes) => {
                let pointer: LatestPointer = serde_json::from_slice(&bytes)?;
                Ok(pointer.item_id == item.id)
            }
            None => Ok(true),
        }
    }

    // ==================== Persisted Clustering Methods ====================

    /// Record a persisted assignment.
    pub fn put_assignment(&self, assignment: &PersistedAssignment) -> Result<(), StorageError> {
        let cf = self.cf(CF_ASSIGNMENTS)?;
        let key = AssignmentKey::new(assignment.item_id.clone());
        self.db
            .put_cf(cf, key.to_bytes(), assignment.cluster_id.to_string().as_bytes())?;
        Ok(())
    }

    /// Record persisted cluster metadata.
    pub fn put_persisted_cluster(&self, meta: &PersistedClusterMeta) -> Result<(), StorageError> {
        let cf = self.cf(CF_PERSISTED_CLUSTERS)?;
        let key = PersistedClusterKey::new(meta.id);
        self.db.put_cf(cf, key.to_bytes(), serde_json::to_vec(meta)?)?;
        Ok(())
    }

    /// Look up persisted assignments for a batch of item ids.
    ///
    /// Unassigned items are absent from the result.
    #[instrument(skip(self, item_ids), fields(count = item_ids.len()))]
    pub fn get_assignments(
        &self,
        item_ids: &[String],
    ) -> Result<HashMap<String, PersistedClusterId>, StorageError> {
        let cf = self.cf(CF_ASSIGNMENTS)?;
        let keys: Vec<Vec<u8>> = item_ids
            .iter()
            .map(|id| AssignmentKey::new(id.clone()).to_bytes())
            .collect();

        let mut assignments = HashMap::new();
        let values = self.db.multi_get_cf(keys.iter().map(|k| (cf, k)));
        for (item_id, value) in item_ids.iter().zip(values) {
            if let Some(bytes) = value? {
                let text = String::from_utf8_lossy(&bytes);
                let cluster_id: PersistedClusterId = text.trim().parse().map_err(|e| {
                    StorageError::Serialization(format!(
                        "Invalid cluster id for {}: {}",
                        item_id, e
                    ))
                })?;
                assignments.insert(item_id.clone(), cluster_id);
            }
        }
        Ok(assignments)
    }

    /// Look up metadata for a batch of persisted cluster ids.
    ///
    /// Unknown ids are absent from the result.
    #[instrument(skip(self, cluster_ids), fields(count = cluster_ids.len()))]
    pub fn get_persisted_clusters(
        &self,
        cluster_ids: &[PersistedClusterId],
    ) -> Result<HashMap<PersistedClusterId, PersistedClusterMeta>, StorageError> {
        let cf = self.cf(CF_PERSISTED_CLUSTERS)?;
        let keys: Vec<Vec<u8>> = cluster_ids
            .iter()
            .map(|id| PersistedClusterKey::new(*id).to_bytes())
            .collect();

        let mut metas = HashMap::new();
        let values = self.db.multi_get_cf(keys.iter().map(|k| (cf, k)));
        for (cluster_id, value) in cluster_ids.iter().zip(values) {
            if let Some(bytes) = value? {
                let meta: PersistedClusterMeta = serde_json::from_slice(&bytes)?;
                metas.insert(*cluster_id, meta);
            }
        }
        Ok(metas)
    }

    // ===== Admin Operations =====

    /// Flush memtables to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    /// Get database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        Ok(StorageStats {
            item_count: self.count_cf_entries(self.cf(CF_ITEMS)?)?,
            logical_post_count: self.count_cf_entries(self.cf(CF_ITEM_LATEST)?)?,
            assignment_count: self.count_cf_entries(self.cf(CF_ASSIGNMENTS)?)?,
            persisted_cluster_count: self.count_cf_entries(self.cf(CF_PERSISTED_CLUSTERS)?)?,
            disk_usage_bytes: self.get_disk_usage(),
        })
    }

    fn count_cf_entries(&self, cf: &rocksdb::ColumnFamily) -> Result<u64, StorageError> {
        let mut count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn get_disk_usage(&self) -> u64 {
        std::fs::read_dir(self.db.path())
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|e| e.metadata().ok())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0)
    }
}

/// Statistics about the storage.
#[derive(Debug, Default)]
pub struct StorageStats {
    /// Stored item versions
    pub item_count: u64,
    /// Distinct logical posts (latest-version pointers)
    pub logical_post_count: u64,
    /// Persisted item assignments
    pub assignment_count: u64,
    /// Persisted clusters
    pub persisted_cluster_count: u64,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_families::ALL_CF_NAMES;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    fn make_item(id: &str, external_id: &str, minutes: i64) -> Item {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        Item::new(id, external_id, base + Duration::minutes(minutes), format!("text {}", id))
            .with_normalized_text(format!("headline {}", id))
            .with_embedding(vec![1.0f32, 0.0])
    }

    fn collect_all(storage: &Storage, since_ms: i64, limit: usize) -> Vec<String> {
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = storage
                .get_items_page(since_ms, cursor.as_deref(), limit)
                .unwrap();
            ids.extend(page.items.into_iter().map(|i| i.id));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        ids
    }

    #[test]
    fn test_open_creates_column_families() {
        let (storage, _temp) = create_test_storage();
        for cf_name in ALL_CF_NAMES {
            assert!(
                storage.db.cf_handle(cf_name).is_some(),
                "CF {} should exist",
                cf_name
            );
        }
    }

    #[test]
    fn test_put_and_get_item() {
        let (storage, _temp) = create_test_storage();
        let item = make_item("a", "tw-a", 0);
        let key = storage.put_item(&item).unwrap();

        let loaded = storage.get_item(&key).unwrap().unwrap();
        assert_eq!(loaded.id, "a");
        assert_eq!(loaded.external_id, "tw-a");
    }

    #[test]
    fn test_page_respects_since() {
        let (storage, _temp) = create_test_storage();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            storage
                .put_item(&make_item(id, &format!("tw-{}", id), i as i64 * 60))
                .unwrap();
        }

        let since = make_item("x", "x", 60).timestamp_ms();
        let ids = collect_all(&storage, since, 10);
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_paging_visits_every_item_once() {
        let (storage, _temp) = create_test_storage();
        for i in 0..7 {
            storage
                .put_item(&make_item(&format!("i{}", i), &format!("tw-{}", i), i))
                .unwrap();
        }

        let first = storage.get_items_page(0, None, 3).unwrap();
        assert_eq!(first.items.len(), 3);
        assert!(first.next_cursor.is_some());

        let ids = collect_all(&storage, 0, 3);
        assert_eq!(ids, vec!["i0", "i1", "i2", "i3", "i4", "i5", "i6"]);
    }

    #[test]
    fn test_page_excludes_ineligible_items() {
        let (storage, _temp) = create_test_storage();
        storage.put_item(&make_item("ok", "tw-ok", 0)).unwrap();

        let mut retweet = make_item("rt", "tw-rt", 1);
        retweet.is_retweet = true;
        storage.put_item(&retweet).unwrap();

        let mut quote = make_item("qt", "tw-qt", 2);
        quote.is_quote = true;
        storage.put_item(&quote).unwrap();

        let mut no_vector = make_item("nv", "tw-nv", 3);
        no_vector.embedding = None;
        storage.put_item(&no_vector).unwrap();

        let mut no_text = make_item("nt", "tw-nt", 4);
        no_text.normalized_text = None;
        storage.put_item(&no_text).unwrap();

        assert_eq!(collect_all(&storage, 0, 10), vec!["ok"]);
    }

    #[test]
    fn test_superseded_versions_are_excluded() {
        let (storage, _temp) = create_test_storage();
        storage
            .put_item(&make_item("v1", "tw-1", 0).with_version(1))
            .unwrap();
        storage
            .put_item(&make_item("v2", "tw-1", 5).with_version(2))
            .unwrap();
        // An older version arriving late must not take the pointer back
        storage
            .put_item(&make_item("v0", "tw-1", 10).with_version(0))
            .unwrap();

        assert_eq!(collect_all(&storage, 0, 10), vec!["v2"]);
    }

    #[test]
    fn test_assignment_lookup() {
        let (storage, _temp) = create_test_storage();
        storage
            .put_assignment(&PersistedAssignment {
                item_id: "a".to_string(),
                cluster_id: 7,
            })
            .unwrap();
        storage
            .put_assignment(&PersistedAssignment {
                item_id: "b".to_string(),
                cluster_id: 9,
            })
            .unwrap();

        let ids = vec!["a".to_string(), "b".to_string(), "missing".to_string()];
        let assignments = storage.get_assignments(&ids).unwrap();
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments.get("a"), Some(&7));
        assert_eq!(assignments.get("b"), Some(&9));
        assert!(!assignments.contains_key("missing"));
    }

    #[test]
    fn test_persisted_cluster_lookup() {
        let (storage, _temp) = create_test_storage();
        let meta = PersistedClusterMeta::new(7, 3, true).with_headline("Fed holds rates");
        storage.put_persisted_cluster(&meta).unwrap();

        let metas = storage.get_persisted_clusters(&[7, 8]).unwrap();
        assert_eq!(metas.len(), 1);
        assert_eq!(metas.get(&7), Some(&meta));
    }

    #[test]
    fn test_stats() {
        let (storage, _temp) = create_test_storage();
        storage
            .put_item(&make_item("v1", "tw-1", 0).with_version(1))
            .unwrap();
        storage
            .put_item(&make_item("v2", "tw-1", 1).with_version(2))
            .unwrap();
        storage
            .put_persisted_cluster(&PersistedClusterMeta::new(1, 2, false))
            .unwrap();

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.item_count, 2);
        assert_eq!(stats.logical_post_count, 1);
        assert_eq!(stats.assignment_count, 0);
        assert_eq!(stats.persisted_cluster_count, 1);
    }
}

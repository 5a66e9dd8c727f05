//! Key encoding and decoding for storage layer.
//!
//! Item key format: `item:{timestamp_ms}:{item_id}`
//! - timestamp_ms: milliseconds since Unix epoch, zero-padded to 13 digits
//! - item_id: stable identifier of the stored version (may contain `:`)
//!
//! This format enables lookback scans via RocksDB forward iteration.

use crate::error::StorageError;
use story_types::PersistedClusterId;

/// Key for item storage
/// Format: item:{timestamp_ms:013}:{item_id}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemKey {
    /// Source timestamp in milliseconds (pre-epoch values clamp to 0)
    pub timestamp_ms: i64,
    /// Item identifier
    pub item_id: String,
}

impl ItemKey {
    /// Create an item key from timestamp and id
    pub fn new(timestamp_ms: i64, item_id: impl Into<String>) -> Self {
        Self {
            timestamp_ms: timestamp_ms.max(0),
            item_id: item_id.into(),
        }
    }

    /// Encode key to bytes for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("item:{:013}:{}", self.timestamp_ms, self.item_id).into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;

        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("item"), Some(ts), Some(item_id)) if !item_id.is_empty() => {
                let timestamp_ms: i64 = ts
                    .parse()
                    .map_err(|e| StorageError::Key(format!("Invalid timestamp: {}", e)))?;
                Ok(Self {
                    timestamp_ms,
                    item_id: item_id.to_string(),
                })
            }
            _ => Err(StorageError::Key(format!("Invalid item key format: {}", s))),
        }
    }

    /// Generate prefix for time range scan start
    pub fn prefix_start(start_ms: i64) -> Vec<u8> {
        format!("item:{:013}:", start_ms.max(0)).into_bytes()
    }
}

/// Key for latest-version pointers
/// Format: latest:{external_id}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestKey {
    pub external_id: String,
}

impl LatestKey {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("latest:{}", self.external_id).into_bytes()
    }
}

/// Key for persisted assignments
/// Format: assign:{item_id}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentKey {
    pub item_id: String,
}

impl AssignmentKey {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("assign:{}", self.item_id).into_bytes()
    }
}

/// Key for persisted cluster metadata
/// Format: cluster:{id}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedClusterKey {
    pub cluster_id: PersistedClusterId,
}

impl PersistedClusterKey {
    pub fn new(cluster_id: PersistedClusterId) -> Self {
        Self { cluster_id }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("cluster:{}", self.cluster_id).into_bytes()
    }
}

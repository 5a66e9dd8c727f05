//! Storage layer for the story clustering engine.
//!
//! Provides RocksDB-backed storage with:
//! - Column family isolation for items, version pointers and the persisted clustering
//! - Time-prefixed item keys for efficient lookback scans
//! - Cursor-based paging so callers never pull the whole window at once
//! - Batched point lookups for reconciliation

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;

pub use db::{ItemScan, Storage, StorageStats};
pub use error::StorageError;
pub use keys::{AssignmentKey, ItemKey, LatestKey, PersistedClusterKey};

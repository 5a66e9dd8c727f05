//! Column family definitions for RocksDB.
//!
//! Each column family isolates data with different access patterns:
//! - items: Item versions keyed by source timestamp (range scans)
//! - item_latest: Latest version pointer per logical post (point reads)
//! - assignments: Persisted item to cluster mapping (batched point reads)
//! - persisted_clusters: Persisted cluster metadata (batched point reads)

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for item versions
pub const CF_ITEMS: &str = "items";

/// Column family name for latest-version pointers
pub const CF_ITEM_LATEST: &str = "item_latest";

/// Column family name for persisted cluster assignments
pub const CF_ASSIGNMENTS: &str = "assignments";

/// Column family name for persisted cluster metadata
pub const CF_PERSISTED_CLUSTERS: &str = "persisted_clusters";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[
    CF_ITEMS,
    CF_ITEM_LATEST,
    CF_ASSIGNMENTS,
    CF_PERSISTED_CLUSTERS,
];

/// Create column family options for items (embeddings dominate, compress them)
fn items_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_ITEMS, items_options()),
        ColumnFamilyDescriptor::new(CF_ITEM_LATEST, Options::default()),
        ColumnFamilyDescriptor::new(CF_ASSIGNMENTS, Options::default()),
        ColumnFamilyDescriptor::new(CF_PERSISTED_CLUSTERS, Options::default()),
    ]
}

//! # story-types
//!
//! Shared records for the story clustering engine.
//!
//! ## Core Types
//! - `Item`: A short post with its embedding and metadata
//! - `EmbeddingField`: Stored embedding in either accepted encoding
//! - `PersistedClusterMeta`: A previously persisted cluster, used as a reconciliation baseline
//! - `PersistedAssignment`: Item to persisted cluster mapping
//!
//! ## Configuration
//! - `Settings`: Layered configuration (defaults, config file, env, CLI)
//! - `ClusteringSettings`: Thresholds, filters and report knobs for a run

pub mod config;
pub mod error;
pub mod item;
pub mod persisted;

pub use config::{ClusteringSettings, Settings, DEFAULT_SWEEP_THRESHOLDS, MAX_LOOKBACK_HOURS};
pub use error::StoryError;
pub use item::{EmbeddingField, Item};
pub use persisted::{PersistedAssignment, PersistedClusterId, PersistedClusterMeta};

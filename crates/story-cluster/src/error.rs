//! Clustering engine error types.

use thiserror::Error;

/// Errors that can occur during a clustering run.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Item source page fetch failed
    #[error("Item source error: {0}")]
    Source(String),

    /// Persisted clustering lookup failed
    #[error("Persisted lookup error: {0}")]
    PersistedLookup(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Report sink I/O error
    #[error("Report I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

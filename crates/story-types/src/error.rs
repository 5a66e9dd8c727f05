//! Error types for the story clustering system.

use thiserror::Error;

/// Errors raised while loading shared settings.
#[derive(Debug, Error)]
pub enum StoryError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

//! Item type for short social posts.
//!
//! Items are read-only within the engine. They carry the raw text, the
//! normalized headline used for lexical scoring, and an embedding in one
//! of the accepted encodings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored embedding in either accepted encoding.
///
/// Upstream writers emit either a JSON array serialized into a string
/// column or a numeric array that was already decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingField {
    /// Pre-decoded numeric array
    Values(Vec<f64>),
    /// JSON array text, e.g. `"[0.1, 0.2]"`
    Encoded(String),
}

impl EmbeddingField {
    /// Decode into a float vector.
    ///
    /// Returns `None` when the payload does not decode, is empty, or holds
    /// a non-finite component.
    pub fn parse(&self) -> Option<Vec<f32>> {
        let values: Vec<f64> = match self {
            EmbeddingField::Values(values) => values.clone(),
            EmbeddingField::Encoded(text) => serde_json::from_str(text.trim()).ok()?,
        };

        if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
            return None;
        }

        Some(values.into_iter().map(|v| v as f32).collect())
    }
}

impl From<Vec<f32>> for EmbeddingField {
    fn from(values: Vec<f32>) -> Self {
        EmbeddingField::Values(values.into_iter().map(f64::from).collect())
    }
}

/// A single short post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier of this stored version
    pub id: String,

    /// Identifier of the logical post on the source platform
    pub external_id: String,

    /// Author handle, if known
    #[serde(default)]
    pub author: Option<String>,

    /// Raw text as posted
    pub text: String,

    /// Normalized headline used for lexical coherence
    #[serde(default)]
    pub normalized_text: Option<String>,

    /// Source timestamp (when the post was made)
    pub created_at: DateTime<Utc>,

    /// Embedding vector, absent until generated upstream
    #[serde(default)]
    pub embedding: Option<EmbeddingField>,

    /// Version of the logical post; higher supersedes lower
    #[serde(default)]
    pub version: u32,

    #[serde(default)]
    pub is_retweet: bool,

    #[serde(default)]
    pub is_reply: bool,

    #[serde(default)]
    pub is_quote: bool,
}

impl Item {
    /// Create a new original post with no embedding.
    pub fn new(
        id: impl Into<String>,
        external_id: impl Into<String>,
        created_at: DateTime<Utc>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            external_id: external_id.into(),
            author: None,
            text: text.into(),
            normalized_text: None,
            created_at,
            embedding: None,
            version: 0,
            is_retweet: false,
            is_reply: false,
            is_quote: false,
        }
    }

    /// Set the author handle.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the normalized headline.
    pub fn with_normalized_text(mut self, normalized: impl Into<String>) -> Self {
        self.normalized_text = Some(normalized.into());
        self
    }

    /// Set the embedding.
    pub fn with_embedding(mut self, embedding: impl Into<EmbeddingField>) -> Self {
        self.embedding = Some(embedding.into());
        self
    }

    /// Set the version of the logical post.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Get timestamp as milliseconds since Unix epoch
    pub fn timestamp_ms(&self) -> i64 {
        self.created_at.timestamp_millis()
    }

    /// Headline shown in reports: normalized text, falling back to raw text.
    pub fn headline(&self) -> &str {
        match self.normalized_text.as_deref() {
            Some(normalized) if !normalized.trim().is_empty() => normalized,
            _ => &self.text,
        }
    }

    /// Normalized author handle (lowercase, no leading `@`), if present.
    pub fn author_key(&self) -> Option<String> {
        self.author
            .as_deref()
            .map(|a| a.trim().trim_start_matches('@').to_lowercase())
            .filter(|a| !a.is_empty())
    }

    /// Whether this item is an original post (not a retweet, reply or quote).
    pub fn is_original(&self) -> bool {
        !(self.is_retweet || self.is_reply || self.is_quote)
    }

    /// Whether this item can enter the eligible pool, ignoring versioning.
    pub fn is_eligible(&self) -> bool {
        self.is_original()
            && self.embedding.is_some()
            && self
                .normalized_text
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty())
    }

    /// Serialize item to JSON bytes for storage
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize item from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

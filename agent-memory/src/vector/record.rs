//! Stored text fragments and search hits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::embeddings::EmbeddingVector;
use crate::{MemoryError, MemoryResult};

/// A text fragment indexed by its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    id: String,
    content: String,
    embedding: EmbeddingVector,
    #[serde(default)]
    metadata: Map<String, Value>,
    timestamp: DateTime<Utc>,
}

impl VectorRecord {
    /// Creates a record stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidRecord`] when `id` is blank.
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        embedding: EmbeddingVector,
    ) -> MemoryResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(MemoryError::InvalidRecord("vector record id must not be empty"));
        }
        Ok(Self {
            id,
            content: content.into(),
            embedding,
            metadata: Map::new(),
            timestamp: Utc::now(),
        })
    }

    /// Replaces the metadata bag.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Overrides the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Caller-supplied identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Source text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Stored embedding.
    #[must_use]
    pub fn embedding(&self) -> &EmbeddingVector {
        &self.embedding
    }

    /// Opaque metadata.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Time of the last upsert.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub(crate) fn to_hit(&self, similarity: f32) -> VectorHit {
        VectorHit {
            id: self.id.clone(),
            content: self.content.clone(),
            metadata: self.metadata.clone(),
            timestamp: self.timestamp,
            similarity,
        }
    }
}

/// A search result. The embedding is never returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    /// Record identifier.
    pub id: String,
    /// Source text.
    pub content: String,
    /// Record metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Time of the last upsert.
    pub timestamp: DateTime<Utc>,
    /// Cosine similarity to the query.
    pub similarity: f32,
}

//! Linear-scan similarity index over vector records.

use serde::{Deserialize, Serialize};

use super::record::{VectorHit, VectorRecord};
use crate::embeddings::{EmbeddingVector, cosine_similarity};
use crate::{MemoryError, MemoryResult};

/// Ordered collection of records sharing one dimensionality.
///
/// Persisted as a plain JSON array of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorIndex {
    records: Vec<VectorRecord>,
}

impl VectorIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    /// Dimensionality established by the stored records.
    #[must_use]
    pub fn dimensions(&self) -> Option<usize> {
        self.records.first().map(|record| record.embedding().len())
    }

    /// Looks up a record by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&VectorRecord> {
        self.records.iter().find(|record| record.id() == id)
    }

    /// Replaces the record with the same id, or appends it. Returns `true`
    /// when an existing record was replaced.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DimensionMismatch`] when the embedding length
    /// differs from the other stored records. The index is left untouched.
    pub fn upsert(&mut self, record: VectorRecord) -> MemoryResult<bool> {
        let expected = self
            .records
            .iter()
            .find(|existing| existing.id() != record.id())
            .map(|existing| existing.embedding().len());
        if let Some(expected) = expected {
            let actual = record.embedding().len();
            if actual != expected {
                return Err(MemoryError::DimensionMismatch { expected, actual });
            }
        }

        match self.records.iter_mut().find(|existing| existing.id() == record.id()) {
            Some(existing) => {
                *existing = record;
                Ok(true)
            }
            None => {
                self.records.push(record);
                Ok(false)
            }
        }
    }

    /// Removes a record. Returns `true` when it existed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.id() != id);
        self.records.len() != before
    }

    /// Ranks every record by cosine similarity to `query`, keeps those scoring
    /// strictly above `threshold`, and returns at most `limit` of them.
    /// Equal scores keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DimensionMismatch`] when `query` does not match
    /// the stored dimensionality.
    pub fn search(
        &self,
        query: &EmbeddingVector,
        limit: usize,
        threshold: f32,
    ) -> MemoryResult<Vec<VectorHit>> {
        if let Some(expected) = self.dimensions() {
            if query.len() != expected {
                return Err(MemoryError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut scored: Vec<(f32, &VectorRecord)> = self
            .records
            .iter()
            .filter(|record| record.embedding().len() == query.len())
            .map(|record| (cosine_similarity(record.embedding(), query), record))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .filter(|(similarity, _)| *similarity > threshold)
            .take(limit)
            .map(|(similarity, record)| record.to_hit(similarity))
            .collect())
    }
}

//! Embedding vectors and the provider seam used to produce them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{MemoryError, MemoryResult};

/// Wrapper type around an immutable floating-point embedding.
#[derive(Clone, PartialEq)]
pub struct EmbeddingVector {
    values: Arc<[f32]>,
}

impl EmbeddingVector {
    /// Creates a new embedding from owned values.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidRecord`] when the supplied vector is empty
    /// or contains non-finite values.
    pub fn new(values: Vec<f32>) -> MemoryResult<Self> {
        if values.is_empty() {
            return Err(MemoryError::InvalidRecord(
                "embedding vector must not be empty",
            ));
        }
        if !values.iter().all(|value| value.is_finite()) {
            return Err(MemoryError::InvalidRecord(
                "embedding vector contains non-finite values",
            ));
        }
        Ok(Self {
            values: Arc::<[f32]>::from(values.into_boxed_slice()),
        })
    }

    /// Creates an embedding by copying the provided slice.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidRecord`] if the slice is empty or contains
    /// non-finite values.
    pub fn from_slice(values: &[f32]) -> MemoryResult<Self> {
        Self::new(values.to_vec())
    }

    /// Returns an immutable view of the embedding data.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Returns the dimensionality of the embedding.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`: [`EmbeddingVector::new`] rejects empty inputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn dot(&self, other: &Self) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| f64::from(*a) * f64::from(*b))
            .sum()
    }

    fn magnitude(&self) -> f64 {
        self.values
            .iter()
            .map(|value| f64::from(*value).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl std::fmt::Debug for EmbeddingVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingVector")
            .field("dimensions", &self.len())
            .finish()
    }
}

impl Serialize for EmbeddingVector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.values.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EmbeddingVector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<f32>::deserialize(deserializer)?;
        Self::new(values).map_err(serde::de::Error::custom)
    }
}

/// Cosine similarity of two embeddings.
///
/// Sums are accumulated in `f64`, so large finite components do not overflow.
/// Returns `0.0` when either vector has zero magnitude. Callers are expected
/// to compare vectors of equal dimensionality; extra trailing components of
/// the longer vector are ignored by the dot product.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn cosine_similarity(lhs: &EmbeddingVector, rhs: &EmbeddingVector) -> f32 {
    let denominator = lhs.magnitude() * rhs.magnitude();
    if denominator == 0.0 {
        0.0
    } else {
        (lhs.dot(rhs) / denominator) as f32
    }
}

/// External collaborator mapping text to an embedding.
///
/// Implementations may be slow or network bound. The gateway always calls
/// them outside of any store lock and under its own timeout, so providers
/// should not retry internally.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Produces an embedding for the supplied text.
    async fn embed(&self, text: &str) -> MemoryResult<EmbeddingVector>;
}

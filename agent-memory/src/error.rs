//! Error types for the memory subsystem.

use std::time::Duration;

use serde_json::Error as SerdeError;
use thiserror::Error;

/// Errors emitted by memory components.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The provided configuration was invalid.
    #[error("invalid memory configuration: {0}")]
    InvalidConfig(&'static str),
    /// Underlying I/O failure while reading or writing snapshot files.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
    /// A persisted snapshot could not be decoded.
    ///
    /// Loaders log this and fall back to an empty store; it is not surfaced
    /// through the gateway.
    #[error("{store} snapshot is corrupt: {reason}")]
    StorageCorruption {
        /// Store whose snapshot failed to decode.
        store: &'static str,
        /// Decoder diagnostic.
        reason: String,
    },
    /// A triple in a merge batch failed validation. No triple of the batch
    /// was applied.
    #[error("invalid triple at index {index}: {reason}")]
    InvalidTriple {
        /// Position of the offending triple in the submitted batch.
        index: usize,
        /// Human-readable reason describing the failure.
        reason: &'static str,
    },
    /// An embedding's length disagrees with the store's dimensionality.
    #[error("embedding dimension mismatch: store holds {expected}-d vectors, got {actual}")]
    DimensionMismatch {
        /// Dimensionality established by the stored records.
        expected: usize,
        /// Dimensionality of the rejected embedding.
        actual: usize,
    },
    /// Vector record fields failed validation.
    #[error("invalid memory record: {0}")]
    InvalidRecord(&'static str),
    /// Text operation that requires an embedding provider was invoked without one.
    #[error("embedding provider not configured")]
    MissingEmbedder,
    /// Embedding provider reported a failure.
    #[error("embedding provider error: {reason}")]
    Embedding {
        /// Human-readable reason describing the failure.
        reason: String,
    },
    /// Embedding provider did not answer in time.
    #[error("embedding provider timed out after {0:?}")]
    EmbeddingTimeout(Duration),
}

impl MemoryError {
    /// Helper to construct embedding provider errors from string-like values.
    #[must_use]
    pub fn embedding(reason: impl Into<String>) -> Self {
        Self::Embedding {
            reason: reason.into(),
        }
    }
}

/// Result type alias for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

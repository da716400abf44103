//! Long-term memory for conversational agents.
//!
//! Two independent stores sit behind [`MemoryGateway`]:
//!
//! - a temporal knowledge graph ([`graph`]) holding subject, predicate,
//!   object facts whose history is kept when exclusive facts change, and
//! - a vector store ([`vector`]) recalling text fragments by cosine
//!   similarity of their embeddings.
//!
//! Each store persists its full state as one JSON snapshot through a
//! [`SnapshotStore`] and serializes its writers, publishing a new snapshot
//! only after it was saved.

#![warn(missing_docs, clippy::pedantic)]

pub mod api;
pub mod config;
pub mod embeddings;
mod error;
pub mod gateway;
pub mod graph;
pub mod persistence;
pub mod vector;

pub use api::{Ack, MemoryRequest, MemoryResponse};
pub use config::MemoryConfig;
pub use embeddings::{EmbeddingProvider, EmbeddingVector, cosine_similarity};
pub use error::{MemoryError, MemoryResult};
pub use gateway::{MemoryGateway, MemoryGatewayBuilder, MemoryStats};
pub use graph::{Edge, GraphStore, MergeOutcome, Node, Subgraph, Triple, TripleInput};
pub use persistence::{FileSnapshot, MemorySnapshot, SnapshotStore};
pub use vector::{VectorHit, VectorRecord, VectorStore};

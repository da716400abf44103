//! JSON request/response surface for tool layers.
//!
//! Transports are out of scope here: whatever carries the request (HTTP,
//! RPC call, in-process tool) deserializes a [`MemoryRequest`], hands it to
//! [`MemoryGateway::dispatch`] and serializes the [`MemoryResponse`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::MemoryResult;
use crate::embeddings::EmbeddingVector;
use crate::gateway::MemoryGateway;
use crate::graph::{MergeOutcome, Subgraph, TripleInput};
use crate::vector::{VectorHit, VectorRecord};

/// Operation requested by a tool layer, tagged by `op`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum MemoryRequest {
    /// Merge a batch of triples.
    MergeTriples {
        /// Facts to merge, validated as a whole.
        triples: Vec<TripleInput>,
    },
    /// Traverse the graph from an entity.
    #[serde(rename_all = "camelCase")]
    QueryEntity {
        /// Root entity label.
        entity: String,
        /// Traversal depth; configured default when absent.
        #[serde(default)]
        depth: Option<usize>,
        /// Follow expired edges too.
        #[serde(default)]
        include_history: bool,
    },
    /// Export the graph for visualization.
    #[serde(rename_all = "camelCase")]
    ExportGraph {
        /// Visibility window for expired edges, in seconds.
        #[serde(default)]
        max_age_secs: Option<u64>,
    },
    /// Insert or replace a vector record.
    UpsertVector {
        /// Record identifier.
        id: String,
        /// Source text.
        content: String,
        /// Precomputed embedding.
        embedding: EmbeddingVector,
        /// Optional metadata bag.
        #[serde(default)]
        metadata: Option<Map<String, Value>>,
    },
    /// Similarity search with a precomputed embedding.
    SearchVectors {
        /// Query embedding.
        embedding: EmbeddingVector,
        /// Maximum hits; configured default when absent.
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Read a single vector record.
    GetVector {
        /// Record identifier.
        id: String,
    },
    /// Empty both stores.
    Wipe,
}

/// Acknowledgement for operations without a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Always `true`; failures are reported as errors instead.
    pub success: bool,
}

/// Result of a [`MemoryRequest`], serialized without a wrapper.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MemoryResponse {
    /// Counts from `mergeTriples`.
    Merged(MergeOutcome),
    /// Nodes and edges from `queryEntity` or `exportGraph`.
    Graph(Subgraph),
    /// Ranked hits from `searchVectors`.
    Hits(Vec<VectorHit>),
    /// Record from `getVector`, `null` when absent.
    Record(Option<VectorRecord>),
    /// Acknowledgement from `upsertVector` or `wipe`.
    Ack(Ack),
}

impl MemoryGateway {
    /// Executes a tool-layer request.
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying gateway operation.
    pub async fn dispatch(&self, request: MemoryRequest) -> MemoryResult<MemoryResponse> {
        let response = match request {
            MemoryRequest::MergeTriples { triples } => {
                MemoryResponse::Merged(self.merge_triples(triples).await?)
            }
            MemoryRequest::QueryEntity {
                entity,
                depth,
                include_history,
            } => MemoryResponse::Graph(self.query_entity(&entity, depth, include_history).await),
            MemoryRequest::ExportGraph { max_age_secs } => {
                let max_age = max_age_secs.map(Duration::from_secs);
                MemoryResponse::Graph(self.export_graph(max_age).await)
            }
            MemoryRequest::UpsertVector {
                id,
                content,
                embedding,
                metadata,
            } => {
                self.upsert_vector(id, content, embedding, metadata).await?;
                MemoryResponse::Ack(Ack { success: true })
            }
            MemoryRequest::SearchVectors { embedding, limit } => {
                MemoryResponse::Hits(self.search_vectors(&embedding, limit).await?)
            }
            MemoryRequest::GetVector { id } => MemoryResponse::Record(self.get_vector(&id).await),
            MemoryRequest::Wipe => {
                self.wipe().await?;
                MemoryResponse::Ack(Ack { success: true })
            }
        };
        Ok(response)
    }

    /// Decodes a JSON request, executes it and encodes the response.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Serialization`](crate::MemoryError::Serialization)
    /// for malformed requests, otherwise the error of the operation.
    pub async fn dispatch_json(&self, request: Value) -> MemoryResult<Value> {
        let request: MemoryRequest = serde_json::from_value(request)?;
        let response = self.dispatch(request).await?;
        Ok(serde_json::to_value(response)?)
    }
}

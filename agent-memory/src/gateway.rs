//! Single entry point coordinating the graph and vector stores.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MemoryConfig;
use crate::embeddings::{EmbeddingProvider, EmbeddingVector};
use crate::graph::{
    GraphRules, GraphStore, KnowledgeGraph, MergeOutcome, Subgraph, Triple, TripleInput,
};
use crate::persistence::{FileSnapshot, MemorySnapshot, SnapshotStore};
use crate::vector::{VectorHit, VectorIndex, VectorRecord, VectorStore};
use crate::{MemoryError, MemoryResult};

/// Builder for [`MemoryGateway`] instances.
pub struct MemoryGatewayBuilder {
    config: MemoryConfig,
    graph_backend: Option<Arc<dyn SnapshotStore>>,
    vector_backend: Option<Arc<dyn SnapshotStore>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl MemoryGatewayBuilder {
    /// Starts a new builder using the supplied configuration.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            graph_backend: None,
            vector_backend: None,
            embedder: None,
        }
    }

    /// Overrides where the graph snapshot lives. Defaults to
    /// [`MemoryConfig::graph_path`].
    #[must_use]
    pub fn with_graph_backend(mut self, backend: Arc<dyn SnapshotStore>) -> Self {
        self.graph_backend = Some(backend);
        self
    }

    /// Overrides where the vector snapshot lives. Defaults to
    /// [`MemoryConfig::vector_path`].
    #[must_use]
    pub fn with_vector_backend(mut self, backend: Arc<dyn SnapshotStore>) -> Self {
        self.vector_backend = Some(backend);
        self
    }

    /// Keeps both snapshots in process memory.
    #[must_use]
    pub fn in_memory(self) -> Self {
        self.with_graph_backend(Arc::new(MemorySnapshot::new()))
            .with_vector_backend(Arc::new(MemorySnapshot::new()))
    }

    /// Installs the embedding provider used by text operations.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Validates the configuration and opens both stores.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] when the configuration fails
    /// validation. Unreadable snapshots do not fail the build; the affected
    /// store starts empty.
    pub async fn build(self) -> MemoryResult<MemoryGateway> {
        self.config.validate()?;

        let graph_backend = self
            .graph_backend
            .unwrap_or_else(|| Arc::new(FileSnapshot::new(self.config.graph_path())));
        let vector_backend = self
            .vector_backend
            .unwrap_or_else(|| Arc::new(FileSnapshot::new(self.config.vector_path())));

        let graph = GraphStore::open(graph_backend, GraphRules::from_config(&self.config)).await;
        let vectors = VectorStore::open(vector_backend, self.config.similarity_threshold()).await;

        Ok(MemoryGateway {
            config: Arc::new(self.config),
            graph: Arc::new(graph),
            vectors: Arc::new(vectors),
            embedder: self.embedder,
        })
    }
}

/// Store sizes reported by [`MemoryGateway::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    /// Graph nodes.
    pub nodes: usize,
    /// Graph edges, including expired history.
    pub edges: usize,
    /// Graph edges without an expiry.
    pub active_edges: usize,
    /// Vector records.
    pub vectors: usize,
    /// Dimensionality of the stored vectors, once established.
    pub dimensions: Option<usize>,
}

/// Memory facade used by the agent tool layer.
///
/// Each store has its own writer lock, so graph and vector operations never
/// block each other. Embedding generation happens before any lock is taken.
#[derive(Clone)]
pub struct MemoryGateway {
    config: Arc<MemoryConfig>,
    graph: Arc<GraphStore>,
    vectors: Arc<VectorStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl MemoryGateway {
    /// Creates a builder for a gateway.
    #[must_use]
    pub fn builder(config: MemoryConfig) -> MemoryGatewayBuilder {
        MemoryGatewayBuilder::new(config)
    }

    /// Opens a file-backed gateway rooted at [`MemoryConfig::data_dir`].
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] when the configuration fails
    /// validation.
    pub async fn open(config: MemoryConfig) -> MemoryResult<Self> {
        Self::builder(config).build().await
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Returns the graph store.
    #[must_use]
    pub fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }

    /// Returns the vector store.
    #[must_use]
    pub fn vectors(&self) -> &Arc<VectorStore> {
        &self.vectors
    }

    /// Validates the whole batch, then merges it as one persisted unit.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidTriple`] naming the first malformed
    /// triple (nothing is applied), or a persistence error.
    pub async fn merge_triples<I>(&self, triples: I) -> MemoryResult<MergeOutcome>
    where
        I: IntoIterator<Item = TripleInput>,
    {
        let triples = Triple::parse_batch(triples)?;
        self.graph.merge(&triples).await
    }

    /// Traverses the graph from `entity`. `depth` defaults to
    /// [`MemoryConfig::default_query_depth`].
    pub async fn query_entity(
        &self,
        entity: &str,
        depth: Option<usize>,
        include_history: bool,
    ) -> Subgraph {
        let depth = depth.unwrap_or(self.config.default_query_depth());
        self.graph.query(entity, depth, include_history).await
    }

    /// Exports active edges and recently expired ones. `max_age` defaults to
    /// [`MemoryConfig::export_max_age`].
    pub async fn export_graph(&self, max_age: Option<Duration>) -> Subgraph {
        let max_age = max_age.unwrap_or(self.config.export_max_age());
        self.graph.export(max_age).await
    }

    /// Inserts or replaces a vector record.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DimensionMismatch`] or
    /// [`MemoryError::InvalidRecord`] without touching the store, or a
    /// persistence error.
    pub async fn upsert_vector(
        &self,
        id: impl Into<String>,
        content: impl Into<String>,
        embedding: EmbeddingVector,
        metadata: Option<Map<String, Value>>,
    ) -> MemoryResult<()> {
        self.vectors
            .upsert(id, content, embedding, metadata.unwrap_or_default())
            .await
    }

    /// Similarity search with the configured threshold. `limit` defaults to
    /// [`MemoryConfig::default_search_limit`].
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DimensionMismatch`] when the query does not
    /// match the stored vectors.
    pub async fn search_vectors(
        &self,
        embedding: &EmbeddingVector,
        limit: Option<usize>,
    ) -> MemoryResult<Vec<VectorHit>> {
        let limit = limit.unwrap_or(self.config.default_search_limit());
        self.vectors.search(embedding, limit, None).await
    }

    /// Targeted read of a vector record.
    pub async fn get_vector(&self, id: &str) -> Option<VectorRecord> {
        self.vectors.get(id).await
    }

    /// Deletes a vector record, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures.
    pub async fn remove_vector(&self, id: &str) -> MemoryResult<bool> {
        self.vectors.remove(id).await
    }

    /// Embeds `content` and stores it, generating an id when none is given.
    /// Returns the record id.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::MissingEmbedder`],
    /// [`MemoryError::EmbeddingTimeout`] or the provider's error when no
    /// embedding is available; the store is not written in that case.
    pub async fn remember(
        &self,
        content: impl Into<String>,
        metadata: Option<Map<String, Value>>,
        id: Option<String>,
    ) -> MemoryResult<String> {
        let content = content.into();
        let embedding = self.embed(&content).await?;
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        self.upsert_vector(id.clone(), content, embedding, metadata)
            .await?;
        Ok(id)
    }

    /// Embeds `text` and searches the vector store with it.
    ///
    /// # Errors
    ///
    /// Same embedding errors as [`remember`](Self::remember), plus
    /// [`MemoryError::DimensionMismatch`] when the provider's output does not
    /// match the stored vectors.
    pub async fn recall(&self, text: &str, limit: Option<usize>) -> MemoryResult<Vec<VectorHit>> {
        let embedding = self.embed(text).await?;
        self.search_vectors(&embedding, limit).await
    }

    async fn embed(&self, text: &str) -> MemoryResult<EmbeddingVector> {
        let embedder = self.embedder.as_ref().ok_or(MemoryError::MissingEmbedder)?;
        let deadline = self.config.embed_timeout();
        match timeout(deadline, embedder.embed(text)).await {
            Ok(Ok(embedding)) => Ok(embedding),
            Ok(Err(err)) => {
                warn!(%err, "embedding provider failed; nothing written");
                Err(err)
            }
            Err(_) => {
                warn!(?deadline, "embedding provider timed out; nothing written");
                Err(MemoryError::EmbeddingTimeout(deadline))
            }
        }
    }

    /// Replaces both stores with empty instances and persists them.
    ///
    /// Both writer locks are held for the duration, so no mutation of either
    /// store interleaves with the wipe. The emptied states are published only
    /// after both snapshots were saved.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures and leaves both stores as they were.
    /// If the vector save fails after the graph was emptied on disk, the
    /// previous graph snapshot is written back; should that also fail, the
    /// empty graph is published so memory matches what is stored.
    pub async fn wipe(&self) -> MemoryResult<()> {
        let graph = self.graph.lock().await;
        let vectors = self.vectors.lock().await;

        let previous_graph = graph.scratch().await;
        let empty_graph = KnowledgeGraph::new();
        let empty_index = VectorIndex::new();
        graph.persist(&empty_graph).await?;
        if let Err(err) = vectors.persist(&empty_index).await {
            match graph.persist(&previous_graph).await {
                Ok(()) => warn!(%err, "vector wipe failed; graph snapshot restored"),
                Err(restore) => {
                    warn!(%err, %restore, "vector wipe failed; graph stays wiped");
                    graph.publish(empty_graph).await;
                }
            }
            return Err(err);
        }

        graph.publish(empty_graph).await;
        vectors.publish(empty_index).await;
        info!("memory wiped");
        Ok(())
    }

    /// Re-reads both stores from their backends.
    pub async fn reload(&self) {
        self.graph.reload().await;
        self.vectors.reload().await;
    }

    /// Reports store sizes.
    pub async fn stats(&self) -> MemoryStats {
        let graph = self.graph.snapshot().await;
        let vectors = self.vectors.snapshot().await;
        MemoryStats {
            nodes: graph.nodes().len(),
            edges: graph.edges().len(),
            active_edges: graph.active_edge_count(),
            vectors: vectors.len(),
            dimensions: vectors.dimensions(),
        }
    }
}

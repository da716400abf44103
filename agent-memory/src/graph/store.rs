//! Persisted, concurrently accessible knowledge graph.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tracing::debug;

use super::knowledge::{GraphRules, KnowledgeGraph};
use super::model::{MergeOutcome, Subgraph};
use super::triple::Triple;
use crate::MemoryResult;
use crate::persistence::{SnapshotCell, SnapshotStore, SnapshotWriter};

const STORE: &str = "graph";

/// Knowledge graph behind a single-writer snapshot cell.
///
/// Merges are serialized and persisted once per batch; queries read the last
/// published snapshot and never wait for a writer.
pub struct GraphStore {
    cell: SnapshotCell<KnowledgeGraph>,
    rules: GraphRules,
}

impl GraphStore {
    /// Opens the store, loading whatever `backend` holds. Missing or corrupt
    /// snapshots yield an empty graph.
    pub async fn open(backend: Arc<dyn SnapshotStore>, rules: GraphRules) -> Self {
        Self {
            cell: SnapshotCell::open(STORE, backend).await,
            rules,
        }
    }

    /// Returns the merge rules in effect.
    #[must_use]
    pub fn rules(&self) -> &GraphRules {
        &self.rules
    }

    /// Merges a validated batch atomically and persists it once.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError`](crate::MemoryError) when the snapshot cannot be
    /// persisted; the published graph is then left unchanged.
    pub async fn merge(&self, triples: &[Triple]) -> MemoryResult<MergeOutcome> {
        if triples.is_empty() {
            return Ok(MergeOutcome::default());
        }

        let outcome = self
            .cell
            .update(|graph| Ok(graph.merge(triples, &self.rules, Utc::now())))
            .await?;
        debug!(
            triples = triples.len(),
            new_nodes = outcome.new_nodes,
            new_edges = outcome.new_edges,
            "merged triple batch"
        );
        Ok(outcome)
    }

    /// Bounded breadth-first traversal from `entity`.
    pub async fn query(&self, entity: &str, depth: usize, include_history: bool) -> Subgraph {
        self.cell.current().await.query(entity, depth, include_history)
    }

    /// Active edges plus those expired within `max_age`.
    pub async fn export(&self, max_age: Duration) -> Subgraph {
        let max_age = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
        self.cell.current().await.export(max_age, Utc::now())
    }

    /// Latest published graph.
    pub async fn snapshot(&self) -> Arc<KnowledgeGraph> {
        self.cell.current().await
    }

    /// Re-reads the backend.
    pub async fn reload(&self) {
        self.cell.reload().await;
    }

    pub(crate) async fn lock(&self) -> SnapshotWriter<'_, KnowledgeGraph> {
        self.cell.lock().await
    }
}

//! Persisted, concurrently accessible vector index.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use super::index::VectorIndex;
use super::record::{VectorHit, VectorRecord};
use crate::MemoryResult;
use crate::embeddings::EmbeddingVector;
use crate::persistence::{SnapshotCell, SnapshotStore, SnapshotWriter};

const STORE: &str = "vector";

/// Vector index behind a single-writer snapshot cell.
pub struct VectorStore {
    cell: SnapshotCell<VectorIndex>,
    threshold: f32,
}

impl VectorStore {
    /// Opens the store, loading whatever `backend` holds. Missing or corrupt
    /// snapshots yield an empty index.
    pub async fn open(backend: Arc<dyn SnapshotStore>, threshold: f32) -> Self {
        Self {
            cell: SnapshotCell::open(STORE, backend).await,
            threshold,
        }
    }

    /// Default similarity threshold used by [`search`](Self::search).
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Inserts or fully replaces the record with `id`, stamping it now.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidRecord`](crate::MemoryError::InvalidRecord)
    /// for a blank id and
    /// [`MemoryError::DimensionMismatch`](crate::MemoryError::DimensionMismatch)
    /// when the embedding length differs from the stored records. Persistence
    /// failures are propagated; in every error case the store is unchanged.
    pub async fn upsert(
        &self,
        id: impl Into<String>,
        content: impl Into<String>,
        embedding: EmbeddingVector,
        metadata: Map<String, Value>,
    ) -> MemoryResult<()> {
        let record = VectorRecord::new(id, content, embedding)?.with_metadata(metadata);
        let id = record.id().to_owned();
        let replaced = self.cell.update(move |index| index.upsert(record)).await?;
        debug!(%id, replaced, "vector record upserted");
        Ok(())
    }

    /// Similarity search. `threshold` falls back to the store default.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DimensionMismatch`](crate::MemoryError::DimensionMismatch)
    /// when the query does not match the stored dimensionality.
    pub async fn search(
        &self,
        query: &EmbeddingVector,
        limit: usize,
        threshold: Option<f32>,
    ) -> MemoryResult<Vec<VectorHit>> {
        let threshold = threshold.unwrap_or(self.threshold);
        self.cell.current().await.search(query, limit, threshold)
    }

    /// Targeted read by id.
    pub async fn get(&self, id: &str) -> Option<VectorRecord> {
        self.cell.current().await.get(id).cloned()
    }

    /// Deletes a record. Returns `false`, without writing, when it is absent.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures.
    pub async fn remove(&self, id: &str) -> MemoryResult<bool> {
        if self.get(id).await.is_none() {
            return Ok(false);
        }
        let removed = self.cell.update(|index| Ok(index.remove(id))).await?;
        debug!(%id, removed, "vector record removed");
        Ok(removed)
    }

    /// Latest published index.
    pub async fn snapshot(&self) -> Arc<VectorIndex> {
        self.cell.current().await
    }

    /// Re-reads the backend.
    pub async fn reload(&self) {
        self.cell.reload().await;
    }

    pub(crate) async fn lock(&self) -> SnapshotWriter<'_, VectorIndex> {
        self.cell.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryError;
    use crate::persistence::{FileSnapshot, MemorySnapshot};

    fn embedding(values: &[f32]) -> EmbeddingVector {
        EmbeddingVector::from_slice(values).unwrap()
    }

    #[tokio::test]
    async fn upsert_and_search_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        let store = VectorStore::open(Arc::new(FileSnapshot::new(&path)), 0.4).await;

        let mut metadata = Map::new();
        metadata.insert("topic".into(), Value::from("travel"));
        store
            .upsert("trip", "Alice flew to Lisbon", embedding(&[1.0, 0.0]), metadata)
            .await
            .unwrap();
        store
            .upsert("food", "Alice likes ramen", embedding(&[0.0, 1.0]), Map::new())
            .await
            .unwrap();

        let reopened = VectorStore::open(Arc::new(FileSnapshot::new(&path)), 0.4).await;
        let hits = reopened.search(&embedding(&[1.0, 0.0]), 5, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "trip");
        assert_eq!(hits[0].metadata["topic"], "travel");

        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn upsert_by_existing_id_replaces_whole_record() {
        let backend = Arc::new(MemorySnapshot::new());
        let store = VectorStore::open(backend.clone(), 0.4).await;

        let mut metadata = Map::new();
        metadata.insert("topic".into(), Value::from("travel"));
        store
            .upsert("note", "Alice lives in Lisbon", embedding(&[1.0, 0.0]), metadata)
            .await
            .unwrap();
        let first = store.get("note").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let mut metadata = Map::new();
        metadata.insert("source".into(), Value::from("chat"));
        store
            .upsert("note", "Alice lives in Porto", embedding(&[0.0, 1.0]), metadata)
            .await
            .unwrap();

        let reopened = VectorStore::open(backend, 0.4).await;
        assert_eq!(reopened.snapshot().await.len(), 1);
        let second = reopened.get("note").await.unwrap();
        assert_eq!(second.content(), "Alice lives in Porto");
        assert_eq!(second.embedding().as_slice(), &[0.0_f32, 1.0]);
        assert_eq!(second.metadata().get("source"), Some(&Value::from("chat")));
        assert!(second.metadata().get("topic").is_none());
        assert!(second.timestamp() > first.timestamp());
    }

    #[tokio::test]
    async fn mismatched_upsert_does_not_persist() {
        let backend = Arc::new(MemorySnapshot::new());
        let store = VectorStore::open(backend.clone(), 0.4).await;
        store
            .upsert("a", "first", embedding(&[1.0, 0.0]), Map::new())
            .await
            .unwrap();

        let err = store
            .upsert("b", "second", embedding(&[1.0, 0.0, 0.0]), Map::new())
            .await
            .expect_err("dimension mismatch");
        assert!(matches!(err, MemoryError::DimensionMismatch { .. }));
        assert_eq!(backend.save_count(), 1);
        assert!(store.get("b").await.is_none());
    }

    #[tokio::test]
    async fn threshold_override_applies() {
        let store = VectorStore::open(Arc::new(MemorySnapshot::new()), 0.4).await;
        store
            .upsert("a", "text", embedding(&[1.0, 0.0]), Map::new())
            .await
            .unwrap();
        store
            .upsert("b", "text", embedding(&[0.0, 1.0]), Map::new())
            .await
            .unwrap();

        let all = store
            .search(&embedding(&[1.0, 0.0]), 5, Some(-0.5))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn remove_skips_write_when_absent() {
        let backend = Arc::new(MemorySnapshot::new());
        let store = VectorStore::open(backend.clone(), 0.4).await;
        assert!(!store.remove("ghost").await.unwrap());
        assert_eq!(backend.save_count(), 0);

        store
            .upsert("a", "text", embedding(&[1.0]), Map::new())
            .await
            .unwrap();
        assert!(store.remove("a").await.unwrap());
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        std::fs::write(&path, "[{\"id\": 1}").unwrap();

        let store = VectorStore::open(Arc::new(FileSnapshot::new(&path)), 0.4).await;
        assert!(store.search(&embedding(&[1.0]), 5, None).await.unwrap().is_empty());
    }
}

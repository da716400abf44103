//! Durable snapshot persistence and the single-writer cell built on it.
//!
//! Every store keeps its whole state as one JSON document. A
//! [`SnapshotStore`] moves that document to and from durable storage; a
//! [`SnapshotCell`] owns the published in-memory copy and serializes
//! mutations so that a load, mutate, save cycle never interleaves with
//! another writer of the same store.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::{MemoryError, MemoryResult};

/// Backend holding the serialized snapshot of a single store.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Reads the stored snapshot, returning `None` when nothing was saved yet.
    async fn load(&self) -> MemoryResult<Option<Bytes>>;

    /// Replaces the stored snapshot. Implementations must never leave a
    /// partially written document behind.
    async fn save(&self, snapshot: Bytes) -> MemoryResult<()>;

    /// Human-readable location used in log output.
    fn describe(&self) -> String;
}

/// Snapshot stored as a single file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    /// Creates a backend for the provided path. The file and its parent
    /// directories are created lazily on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| OsString::from("snapshot"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn replace_with(&self, staging: &Path, snapshot: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(staging).await?;
        file.write_all(snapshot).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(staging, &self.path).await
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshot {
    async fn load(&self) -> MemoryResult<Option<Bytes>> {
        match fs::read(&self.path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, snapshot: Bytes) -> MemoryResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let staging = self.staging_path();
        if let Err(err) = self.replace_with(&staging, &snapshot).await {
            if let Err(cleanup) = fs::remove_file(&staging).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(path = %staging.display(), %cleanup, "staging file left behind");
                }
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Snapshot kept in process memory. Useful for ephemeral gateways and tests.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    contents: Mutex<Option<Bytes>>,
    saves: AtomicUsize,
}

impl MemorySnapshot {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that already holds the supplied document.
    #[must_use]
    pub fn with_contents(contents: impl Into<Bytes>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
            saves: AtomicUsize::new(0),
        }
    }

    /// Returns the currently stored document.
    pub async fn contents(&self) -> Option<Bytes> {
        self.contents.lock().await.clone()
    }

    /// Overwrites the stored document without going through a store.
    pub async fn overwrite(&self, contents: impl Into<Bytes>) {
        *self.contents.lock().await = Some(contents.into());
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Acquire)
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshot {
    async fn load(&self) -> MemoryResult<Option<Bytes>> {
        Ok(self.contents.lock().await.clone())
    }

    async fn save(&self, snapshot: Bytes) -> MemoryResult<()> {
        *self.contents.lock().await = Some(snapshot);
        self.saves.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_owned()
    }
}

/// Decodes a snapshot document.
pub(crate) fn decode<T: DeserializeOwned>(store: &'static str, bytes: &[u8]) -> MemoryResult<T> {
    serde_json::from_slice(bytes).map_err(|err| MemoryError::StorageCorruption {
        store,
        reason: err.to_string(),
    })
}

/// Loads a snapshot, degrading to the empty state when it is absent,
/// unreadable or corrupt.
pub(crate) async fn load_or_default<T>(store: &'static str, backend: &dyn SnapshotStore) -> T
where
    T: DeserializeOwned + Default,
{
    let bytes = match backend.load().await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!(store, location = %backend.describe(), "no snapshot found; starting empty");
            return T::default();
        }
        Err(err) => {
            let location = backend.describe();
            warn!(store, %location, %err, "snapshot unreadable; starting empty");
            return T::default();
        }
    };

    match decode(store, &bytes) {
        Ok(state) => state,
        Err(err) => {
            let location = backend.describe();
            warn!(store, %location, %err, "discarding corrupt snapshot; starting empty");
            T::default()
        }
    }
}

/// Single-writer cell holding the published state of one store.
///
/// Readers get the last successfully persisted state without touching the
/// writer lock. Writers mutate a private copy and publish it only after the
/// backend accepted it.
pub(crate) struct SnapshotCell<T> {
    store: &'static str,
    backend: Arc<dyn SnapshotStore>,
    writer: Mutex<()>,
    published: RwLock<Arc<T>>,
}

impl<T> SnapshotCell<T>
where
    T: Clone + Default + Serialize + DeserializeOwned + Send + Sync,
{
    pub(crate) async fn open(store: &'static str, backend: Arc<dyn SnapshotStore>) -> Self {
        let state: T = load_or_default(store, backend.as_ref()).await;
        info!(store, location = %backend.describe(), "store opened");
        Self {
            store,
            backend,
            writer: Mutex::new(()),
            published: RwLock::new(Arc::new(state)),
        }
    }

    /// Latest published state.
    pub(crate) async fn current(&self) -> Arc<T> {
        Arc::clone(&*self.published.read().await)
    }

    /// Waits for exclusive write access.
    pub(crate) async fn lock(&self) -> SnapshotWriter<'_, T> {
        SnapshotWriter {
            cell: self,
            _guard: self.writer.lock().await,
        }
    }

    /// Applies `mutate` to a copy of the current state, persists the result
    /// and publishes it. Nothing is persisted or published when `mutate`
    /// fails.
    pub(crate) async fn update<R, F>(&self, mutate: F) -> MemoryResult<R>
    where
        F: FnOnce(&mut T) -> MemoryResult<R>,
    {
        let writer = self.lock().await;
        let mut scratch = writer.scratch().await;
        let outcome = mutate(&mut scratch)?;
        writer.commit(scratch).await?;
        Ok(outcome)
    }

    /// Re-reads the backend and publishes what it holds.
    pub(crate) async fn reload(&self) {
        let writer = self.lock().await;
        let state: T = load_or_default(self.store, self.backend.as_ref()).await;
        writer.publish(state).await;
        info!(store = self.store, "store reloaded");
    }
}

/// Exclusive write access to a [`SnapshotCell`].
pub(crate) struct SnapshotWriter<'a, T> {
    cell: &'a SnapshotCell<T>,
    _guard: MutexGuard<'a, ()>,
}

impl<T> SnapshotWriter<'_, T>
where
    T: Clone + Default + Serialize + DeserializeOwned + Send + Sync,
{
    /// Private copy of the published state.
    pub(crate) async fn scratch(&self) -> T {
        T::clone(&*self.cell.current().await)
    }

    /// Saves `state` to the backend without publishing it.
    pub(crate) async fn persist(&self, state: &T) -> MemoryResult<()> {
        let bytes = serde_json::to_vec(state)?;
        self.cell.backend.save(Bytes::from(bytes)).await?;
        debug!(store = self.cell.store, "snapshot persisted");
        Ok(())
    }

    /// Makes `state` visible to readers and releases the writer lock.
    pub(crate) async fn publish(self, state: T) {
        *self.cell.published.write().await = Arc::new(state);
    }

    /// Persists then publishes `state`.
    pub(crate) async fn commit(self, state: T) -> MemoryResult<()> {
        self.persist(&state).await?;
        self.publish(state).await;
        Ok(())
    }
}

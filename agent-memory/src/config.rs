//! Configuration for the memory gateway and its stores.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::graph::normalize_relation;
use crate::{MemoryError, MemoryResult};

const DEFAULT_EXCLUSIVE_RELATIONS: [&str; 10] = [
    "LIVES_IN",
    "LOCATED_IN",
    "WORKS_AT",
    "WORKS_FOR",
    "MARRIED_TO",
    "BORN_IN",
    "HAS_STATUS",
    "HAS_ROLE",
    "CURRENT_LOCATION",
    "AGE",
];

/// Settings shared by the gateway, graph store and vector store.
///
/// Every field has a default, so a partial JSON document is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryConfig {
    data_dir: PathBuf,
    graph_file: String,
    vector_file: String,
    exclusive_relations: BTreeSet<String>,
    reinforcement_step: f64,
    similarity_threshold: f32,
    default_search_limit: usize,
    default_query_depth: usize,
    export_max_age_ms: u64,
    embed_timeout_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/memory"),
            graph_file: "graph.json".to_owned(),
            vector_file: "vectors.json".to_owned(),
            exclusive_relations: DEFAULT_EXCLUSIVE_RELATIONS
                .iter()
                .map(|relation| (*relation).to_owned())
                .collect(),
            reinforcement_step: 0.1,
            similarity_threshold: 0.4,
            default_search_limit: 5,
            default_query_depth: 1,
            export_max_age_ms: 7 * 24 * 60 * 60 * 1000,
            embed_timeout_ms: 10_000,
        }
    }
}

impl MemoryConfig {
    /// Creates a default configuration rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Loads a JSON configuration file and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Io`] when the file cannot be read,
    /// [`MemoryError::Serialization`] when it is not valid JSON, and
    /// [`MemoryError::InvalidConfig`] when a value is out of range.
    pub fn from_json_file(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let raw = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] describing the first offending value.
    pub fn validate(&self) -> MemoryResult<()> {
        if self.graph_file.trim().is_empty() || self.vector_file.trim().is_empty() {
            return Err(MemoryError::InvalidConfig("snapshot file names must not be empty"));
        }
        if !self.reinforcement_step.is_finite() || self.reinforcement_step < 0.0 {
            return Err(MemoryError::InvalidConfig(
                "reinforcement step must be a finite, non-negative number",
            ));
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(MemoryError::InvalidConfig(
                "similarity threshold must lie within [-1, 1]",
            ));
        }
        if self.default_search_limit == 0 {
            return Err(MemoryError::InvalidConfig("default search limit must be non-zero"));
        }
        Ok(())
    }

    /// Sets the directory holding the snapshot files.
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Replaces the set of exclusive relations.
    #[must_use]
    pub fn with_exclusive_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusive_relations = relations.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the weight added to an edge each time it is reinforced.
    #[must_use]
    pub fn with_reinforcement_step(mut self, step: f64) -> Self {
        self.reinforcement_step = step;
        self
    }

    /// Sets the minimum similarity (exclusive) a search hit must exceed.
    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Sets the number of hits returned when a search omits its limit.
    #[must_use]
    pub fn with_default_search_limit(mut self, limit: usize) -> Self {
        self.default_search_limit = limit;
        self
    }

    /// Sets the traversal depth used when a query omits its depth.
    #[must_use]
    pub fn with_default_query_depth(mut self, depth: usize) -> Self {
        self.default_query_depth = depth;
        self
    }

    /// Sets how long expired edges remain visible in graph exports.
    #[must_use]
    pub fn with_export_max_age(mut self, max_age: Duration) -> Self {
        self.export_max_age_ms = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the deadline applied to embedding provider calls.
    #[must_use]
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the snapshot directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the full path of the graph snapshot.
    #[must_use]
    pub fn graph_path(&self) -> PathBuf {
        self.data_dir.join(&self.graph_file)
    }

    /// Returns the full path of the vector snapshot.
    #[must_use]
    pub fn vector_path(&self) -> PathBuf {
        self.data_dir.join(&self.vector_file)
    }

    /// Returns the exclusive relations in normalized form.
    #[must_use]
    pub fn exclusive_relations(&self) -> BTreeSet<String> {
        self.exclusive_relations
            .iter()
            .map(|relation| normalize_relation(relation))
            .filter(|relation| !relation.is_empty())
            .collect()
    }

    /// Returns the edge reinforcement increment.
    #[must_use]
    pub const fn reinforcement_step(&self) -> f64 {
        self.reinforcement_step
    }

    /// Returns the default search threshold.
    #[must_use]
    pub const fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// Returns the default search limit.
    #[must_use]
    pub const fn default_search_limit(&self) -> usize {
        self.default_search_limit
    }

    /// Returns the default traversal depth.
    #[must_use]
    pub const fn default_query_depth(&self) -> usize {
        self.default_query_depth
    }

    /// Returns the export window for expired edges.
    #[must_use]
    pub const fn export_max_age(&self) -> Duration {
        Duration::from_millis(self.export_max_age_ms)
    }

    /// Returns the embedding provider deadline.
    #[must_use]
    pub const fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }
}

//! Persisted graph entities and query results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Node type assigned when a triple does not name one.
pub const DEFAULT_NODE_TYPE: &str = "ENTITY";

/// An entity in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Normalized (lower-case) key.
    pub id: String,
    /// Display label, in the casing it was first seen with.
    pub label: String,
    /// Free-form type tag.
    #[serde(rename = "type", default = "default_node_type")]
    pub kind: String,
    /// When the node was first referenced.
    pub created: DateTime<Utc>,
    /// When the node was last referenced.
    pub last_seen: DateTime<Utc>,
}

fn default_node_type() -> String {
    DEFAULT_NODE_TYPE.to_owned()
}

/// A time-stamped relation between two nodes.
///
/// An edge without an `expired` timestamp is active. Expired edges are kept
/// as history and are never removed by normal operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Id of the subject node.
    pub source: String,
    /// Id of the object node.
    pub target: String,
    /// Normalized (upper-case) predicate.
    pub relation: String,
    /// Reinforcement counter, starting at `1.0`.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// When the fact was first recorded.
    pub created: DateTime<Utc>,
    /// When the fact was last reinforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    /// When the fact stopped being true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired: Option<DateTime<Utc>>,
}

fn default_weight() -> f64 {
    1.0
}

impl Edge {
    /// Returns `true` when the edge has not been expired.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.expired.is_none()
    }

    /// Returns `true` when `id` is either endpoint.
    #[must_use]
    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }

    /// Returns the endpoint opposite to `id`. Self-loops yield `id` itself.
    #[must_use]
    pub fn neighbor_of(&self, id: &str) -> &str {
        if self.source == id {
            &self.target
        } else {
            &self.source
        }
    }
}

/// A slice of the graph: the result of a traversal query or an export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    /// Discovered nodes keyed by id.
    pub nodes: BTreeMap<String, Node>,
    /// Discovered edges, deduplicated, in discovery order.
    pub edges: Vec<Edge>,
}

impl Subgraph {
    /// Returns `true` when neither nodes nor edges were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Counts of entities created by a merge batch. Reinforcements are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    /// Nodes created by the batch.
    pub new_nodes: usize,
    /// Edges created by the batch.
    pub new_edges: usize,
}

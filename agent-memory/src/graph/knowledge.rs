//! In-memory temporal knowledge graph.
//!
//! This is the pure data structure behind [`GraphStore`](super::GraphStore):
//! it knows nothing about locking or persistence and takes the current time
//! as an argument so that history can be exercised deterministically.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::model::{DEFAULT_NODE_TYPE, Edge, MergeOutcome, Node, Subgraph};
use super::triple::{Triple, normalize_id};
use crate::config::MemoryConfig;

/// Merge behaviour knobs derived from [`MemoryConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRules {
    exclusive_relations: BTreeSet<String>,
    reinforcement_step: f64,
}

impl GraphRules {
    /// Creates rules from normalized exclusive relations and a reinforcement step.
    #[must_use]
    pub fn new(exclusive_relations: BTreeSet<String>, reinforcement_step: f64) -> Self {
        Self {
            exclusive_relations,
            reinforcement_step,
        }
    }

    /// Derives the rules from a configuration.
    #[must_use]
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.exclusive_relations(), config.reinforcement_step())
    }

    /// Returns `true` when a subject may hold only one active object for `relation`.
    #[must_use]
    pub fn is_exclusive(&self, relation: &str) -> bool {
        self.exclusive_relations.contains(relation)
    }

    /// Weight added on reinforcement.
    #[must_use]
    pub const fn reinforcement_step(&self) -> f64 {
        self.reinforcement_step
    }
}

impl Default for GraphRules {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}

/// Nodes and append-only edge history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeGraph {
    nodes: BTreeMap<String, Node>,
    edges: Vec<Edge>,
}

impl KnowledgeGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All nodes keyed by id.
    #[must_use]
    pub fn nodes(&self) -> &BTreeMap<String, Node> {
        &self.nodes
    }

    /// All edges, active and expired, in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Looks up a node by label or id.
    #[must_use]
    pub fn node(&self, entity: &str) -> Option<&Node> {
        self.nodes.get(&normalize_id(entity))
    }

    /// Number of edges without an expiry.
    #[must_use]
    pub fn active_edge_count(&self) -> usize {
        self.edges.iter().filter(|edge| edge.is_active()).count()
    }

    /// Applies a batch of triples in order.
    ///
    /// Exclusive relations expire competing active edges of the same subject
    /// before the triple itself is inserted or reinforced.
    pub fn merge(
        &mut self,
        triples: &[Triple],
        rules: &GraphRules,
        now: DateTime<Utc>,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for triple in triples {
            let kind = triple.source_type();
            if self.touch_node(triple.source_id(), triple.source_label(), kind, now) {
                outcome.new_nodes += 1;
            }
            let kind = triple.target_type();
            if self.touch_node(triple.target_id(), triple.target_label(), kind, now) {
                outcome.new_nodes += 1;
            }

            if rules.is_exclusive(triple.relation()) {
                self.edges
                    .iter_mut()
                    .filter(|edge| {
                        edge.is_active()
                            && edge.source == triple.source_id()
                            && edge.relation == triple.relation()
                            && edge.target != triple.target_id()
                    })
                    .for_each(|edge| edge.expired = Some(now));
            }

            let existing = self.edges.iter_mut().find(|edge| {
                edge.is_active()
                    && edge.source == triple.source_id()
                    && edge.target == triple.target_id()
                    && edge.relation == triple.relation()
            });

            match existing {
                Some(edge) => {
                    edge.weight += rules.reinforcement_step();
                    edge.last_seen = Some(now);
                }
                None => {
                    self.edges.push(Edge {
                        source: triple.source_id().to_owned(),
                        target: triple.target_id().to_owned(),
                        relation: triple.relation().to_owned(),
                        weight: 1.0,
                        created: now,
                        last_seen: None,
                        expired: None,
                    });
                    outcome.new_edges += 1;
                }
            }
        }

        outcome
    }

    /// Returns `true` when the node was created.
    fn touch_node(
        &mut self,
        id: &str,
        label: &str,
        kind: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        if let Some(node) = self.nodes.get_mut(id) {
            node.last_seen = now;
            if let Some(kind) = kind {
                kind.clone_into(&mut node.kind);
            }
            return false;
        }

        self.nodes.insert(
            id.to_owned(),
            Node {
                id: id.to_owned(),
                label: label.to_owned(),
                kind: kind.unwrap_or(DEFAULT_NODE_TYPE).to_owned(),
                created: now,
                last_seen: now,
            },
        );
        true
    }

    /// Breadth-first traversal from `entity`.
    ///
    /// Nodes reached at level `depth` are included but not expanded, so
    /// `depth == 0` yields the root alone. Expired edges are followed only
    /// when `include_history` is set. An unknown root yields an empty result.
    #[must_use]
    pub fn query(&self, entity: &str, depth: usize, include_history: bool) -> Subgraph {
        let Some((root, root_node)) = self.nodes.get_key_value(&normalize_id(entity)) else {
            return Subgraph::default();
        };

        let mut result = Subgraph::default();
        result.nodes.insert(root.clone(), root_node.clone());

        let incident = self.incident_edges(include_history);
        let mut visited: HashSet<&str> = HashSet::from([root.as_str()]);
        let mut collected: HashSet<usize> = HashSet::new();
        let mut frontier: VecDeque<(&str, usize)> = VecDeque::from([(root.as_str(), 0)]);

        while let Some((id, level)) = frontier.pop_front() {
            if level >= depth {
                continue;
            }
            let Some(indices) = incident.get(id) else {
                continue;
            };

            for &index in indices {
                let edge = &self.edges[index];
                if collected.insert(index) {
                    result.edges.push(edge.clone());
                }

                let neighbor = edge.neighbor_of(id);
                if visited.contains(neighbor) {
                    continue;
                }
                if let Some((key, node)) = self.nodes.get_key_value(neighbor) {
                    visited.insert(key.as_str());
                    result.nodes.insert(key.clone(), node.clone());
                    frontier.push_back((key.as_str(), level + 1));
                }
            }
        }

        result
    }

    /// Edge indices per endpoint, restricted to active edges unless
    /// `include_history` is set.
    fn incident_edges(&self, include_history: bool) -> HashMap<&str, Vec<usize>> {
        let mut incident: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, edge) in self.edges.iter().enumerate() {
            if !include_history && !edge.is_active() {
                continue;
            }
            incident.entry(edge.source.as_str()).or_default().push(index);
            if edge.target != edge.source {
                incident.entry(edge.target.as_str()).or_default().push(index);
            }
        }
        incident
    }

    /// Active edges plus edges that expired within `max_age` of `now`, and
    /// exactly the nodes those edges reference.
    #[must_use]
    pub fn export(&self, max_age: TimeDelta, now: DateTime<Utc>) -> Subgraph {
        let cutoff = now.checked_sub_signed(max_age);
        let mut result = Subgraph::default();

        for edge in &self.edges {
            let visible = match (edge.expired, cutoff) {
                (None, _) | (Some(_), None) => true,
                (Some(expired), Some(cutoff)) => expired > cutoff,
            };
            if !visible {
                continue;
            }

            for endpoint in [&edge.source, &edge.target] {
                if let Some(node) = self.nodes.get(endpoint) {
                    result.nodes.entry(endpoint.clone()).or_insert_with(|| node.clone());
                }
            }
            result.edges.push(edge.clone());
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn triple(source: &str, relation: &str, target: &str) -> Triple {
        Triple::new(source, relation, target).unwrap()
    }

    fn merge(
        graph: &mut KnowledgeGraph,
        facts: &[(&str, &str, &str)],
        now: DateTime<Utc>,
    ) -> MergeOutcome {
        let triples: Vec<_> = facts.iter().map(|(s, r, t)| triple(s, r, t)).collect();
        graph.merge(&triples, &GraphRules::default(), now)
    }

    fn ids(subgraph: &Subgraph) -> Vec<&str> {
        subgraph.nodes.keys().map(String::as_str).collect()
    }

    #[test]
    fn exclusive_relation_expires_previous_object() {
        let mut graph = KnowledgeGraph::new();
        merge(&mut graph, &[("A", "LOCATED_IN", "X")], t0());
        let later = t0() + TimeDelta::hours(1);
        merge(&mut graph, &[("A", "LOCATED_IN", "Y")], later);

        let active: Vec<_> = graph.edges().iter().filter(|e| e.is_active()).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].target, "y");

        let old = graph.edges().iter().find(|e| e.target == "x").unwrap();
        assert_eq!(old.expired, Some(later));

        let current = graph.query("A", 1, false);
        assert_eq!(ids(&current), vec!["a", "y"]);
        assert_eq!(current.edges.len(), 1);

        let history = graph.query("a", 1, true);
        assert_eq!(ids(&history), vec!["a", "x", "y"]);
        assert_eq!(history.edges.len(), 2);
    }

    #[test]
    fn exclusive_relation_reasserting_same_object_reinforces() {
        let mut graph = KnowledgeGraph::new();
        merge(&mut graph, &[("A", "LIVES_IN", "Paris"), ("A", "LIVES_IN", "paris")], t0());
        assert_eq!(graph.edges().len(), 1);
        assert!(graph.edges()[0].is_active());
    }

    #[test]
    fn exclusivity_is_scoped_to_subject() {
        let mut graph = KnowledgeGraph::new();
        merge(&mut graph, &[("A", "LIVES_IN", "Paris"), ("B", "LIVES_IN", "Rome")], t0());
        assert_eq!(graph.active_edge_count(), 2);
    }

    #[test]
    fn non_exclusive_relations_accumulate() {
        let mut graph = KnowledgeGraph::new();
        merge(&mut graph, &[("A", "KNOWS", "B"), ("A", "KNOWS", "C")], t0());
        assert_eq!(graph.active_edge_count(), 2);
    }

    #[test]
    fn reinforcement_keeps_structure() {
        let mut graph = KnowledgeGraph::new();
        let first = merge(&mut graph, &[("A", "KNOWS", "B")], t0());
        assert_eq!(first, MergeOutcome { new_nodes: 2, new_edges: 1 });

        let later = t0() + TimeDelta::minutes(5);
        let second = merge(&mut graph, &[("a", "knows", "b")], later);
        assert_eq!(second, MergeOutcome::default());

        assert_eq!(graph.edges().len(), 1);
        let edge = &graph.edges()[0];
        assert!((edge.weight - 1.1).abs() < 1e-9);
        assert_eq!(edge.last_seen, Some(later));
        assert_eq!(edge.created, t0());
        assert_eq!(graph.node("A").unwrap().last_seen, later);
        assert_eq!(graph.node("A").unwrap().created, t0());
    }

    #[test]
    fn first_label_casing_is_kept() {
        let mut graph = KnowledgeGraph::new();
        merge(&mut graph, &[("Alice", "KNOWS", "Bob"), ("ALICE", "KNOWS", "Carol")], t0());
        assert_eq!(graph.node("alice").unwrap().label, "Alice");
        assert_eq!(graph.nodes().len(), 3);
    }

    #[test]
    fn node_types_come_from_triples() {
        let mut graph = KnowledgeGraph::new();
        let typed = triple("Bob", "WORKS_AT", "Acme").with_target_type("ORGANIZATION");
        graph.merge(&[typed], &GraphRules::default(), t0());
        assert_eq!(graph.node("acme").unwrap().kind, "ORGANIZATION");
        assert_eq!(graph.node("bob").unwrap().kind, DEFAULT_NODE_TYPE);
    }

    #[test]
    fn self_loops_follow_the_same_rules() {
        let mut graph = KnowledgeGraph::new();
        let outcome = merge(&mut graph, &[("A", "LIKES", "A"), ("A", "LIKES", "A")], t0());
        assert_eq!(outcome, MergeOutcome { new_nodes: 1, new_edges: 1 });
        assert!((graph.edges()[0].weight - 1.1).abs() < 1e-9);

        let result = graph.query("A", 3, false);
        assert_eq!(ids(&result), vec!["a"]);
        assert_eq!(result.edges.len(), 1);
    }

    #[test]
    fn traversal_respects_depth() {
        let mut graph = KnowledgeGraph::new();
        merge(&mut graph, &[("A", "NEXT", "B"), ("B", "NEXT", "C"), ("C", "NEXT", "D")], t0());

        let two = graph.query("A", 2, false);
        assert_eq!(ids(&two), vec!["a", "b", "c"]);
        assert!(two.edges.iter().all(|e| e.target != "d"));

        let zero = graph.query("A", 0, false);
        assert_eq!(ids(&zero), vec!["a"]);
        assert!(zero.edges.is_empty());
    }

    #[test]
    fn traversal_follows_incoming_edges() {
        let mut graph = KnowledgeGraph::new();
        merge(&mut graph, &[("B", "KNOWS", "A")], t0());
        let result = graph.query("A", 1, false);
        assert_eq!(ids(&result), vec!["a", "b"]);
    }

    #[test]
    fn traversal_deduplicates_edges() {
        let mut graph = KnowledgeGraph::new();
        merge(&mut graph, &[("A", "KNOWS", "B"), ("B", "KNOWS", "C"), ("C", "KNOWS", "A")], t0());
        let result = graph.query("A", 5, false);
        assert_eq!(result.nodes.len(), 3);
        assert_eq!(result.edges.len(), 3);
    }

    #[test]
    fn unknown_root_is_empty() {
        let mut graph = KnowledgeGraph::new();
        merge(&mut graph, &[("A", "KNOWS", "B")], t0());
        assert!(graph.query("nonexistent", 3, true).is_empty());
    }

    #[test]
    fn export_ages_out_expired_edges() {
        let mut graph = KnowledgeGraph::new();
        merge(&mut graph, &[("A", "LOCATED_IN", "X"), ("A", "LOCATED_IN", "Y")], t0());
        let week = TimeDelta::days(7);

        let recent = graph.export(week, t0() + TimeDelta::hours(1));
        assert_eq!(recent.edges.len(), 2);
        assert!(recent.nodes.contains_key("x"));

        let stale = graph.export(week, t0() + TimeDelta::days(8));
        assert_eq!(stale.edges.len(), 1);
        assert_eq!(ids(&stale), vec!["a", "y"]);
        assert!(graph.node("x").is_some());
    }

    #[test]
    fn export_drops_isolated_nodes() {
        let mut graph = KnowledgeGraph::new();
        merge(&mut graph, &[("A", "HAS_STATUS", "busy"), ("A", "HAS_STATUS", "idle")], t0());
        merge(&mut graph, &[("B", "KNOWS", "C")], t0());

        let export = graph.export(TimeDelta::days(7), t0() + TimeDelta::days(30));
        assert_eq!(ids(&export), vec!["a", "b", "c", "idle"]);
    }

    #[test]
    fn export_with_unbounded_age_keeps_history() {
        let mut graph = KnowledgeGraph::new();
        merge(&mut graph, &[("A", "AGE", "30"), ("A", "AGE", "31")], t0());
        let export = graph.export(TimeDelta::MAX, t0() + TimeDelta::days(3650));
        assert_eq!(export.edges.len(), 2);
    }

    #[test]
    fn empty_snapshot_shape() {
        let json = serde_json::to_string(&KnowledgeGraph::new()).unwrap();
        assert_eq!(json, r#"{"nodes":{},"edges":[]}"#);
    }
}

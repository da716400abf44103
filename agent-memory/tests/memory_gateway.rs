use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use agent_memory::{EmbeddingVector, MemoryConfig, MemoryGateway, Subgraph, TripleInput};
use serde_json::{Map, Value, json};

async fn open(dir: &Path) -> MemoryGateway {
    MemoryGateway::open(MemoryConfig::new(dir)).await.unwrap()
}

fn node_ids(graph: &Subgraph) -> BTreeSet<&str> {
    graph.nodes.keys().map(String::as_str).collect()
}

fn embedding(values: &[f32]) -> EmbeddingVector {
    EmbeddingVector::from_slice(values).unwrap()
}

#[tokio::test]
async fn exclusive_relation_keeps_history() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = open(dir.path()).await;

    gateway
        .merge_triples([TripleInput::new("A", "LOCATED_IN", "X")])
        .await
        .unwrap();
    gateway
        .merge_triples([TripleInput::new("A", "LOCATED_IN", "Y")])
        .await
        .unwrap();

    let snapshot = gateway.graph().snapshot().await;
    let active: Vec<_> = snapshot.edges().iter().filter(|e| e.is_active()).collect();
    assert_eq!(active.len(), 1);
    assert_eq!((active[0].source.as_str(), active[0].target.as_str()), ("a", "y"));
    let expired = snapshot.edges().iter().find(|e| e.target == "x").unwrap();
    assert!(expired.expired.is_some());

    let current = gateway.query_entity("A", Some(1), false).await;
    assert_eq!(node_ids(&current), BTreeSet::from(["a", "y"]));

    let history = gateway.query_entity("A", Some(1), true).await;
    assert_eq!(node_ids(&history), BTreeSet::from(["a", "x", "y"]));
}

#[tokio::test]
async fn reinforcement_does_not_grow_the_graph() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = open(dir.path()).await;

    let first = gateway
        .merge_triples([TripleInput::new("A", "KNOWS", "B")])
        .await
        .unwrap();
    let second = gateway
        .merge_triples([TripleInput::new("A", "KNOWS", "B")])
        .await
        .unwrap();

    assert_eq!((first.new_nodes, first.new_edges), (2, 1));
    assert_eq!((second.new_nodes, second.new_edges), (0, 0));

    let snapshot = gateway.graph().snapshot().await;
    assert_eq!(snapshot.edges().len(), 1);
    assert!((snapshot.edges()[0].weight - 1.1).abs() < 1e-9);
}

#[tokio::test]
async fn traversal_depth_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = open(dir.path()).await;
    gateway
        .merge_triples([
            TripleInput::new("A", "LINKS_TO", "B"),
            TripleInput::new("B", "LINKS_TO", "C"),
            TripleInput::new("C", "LINKS_TO", "D"),
        ])
        .await
        .unwrap();

    let two = gateway.query_entity("A", Some(2), false).await;
    assert_eq!(node_ids(&two), BTreeSet::from(["a", "b", "c"]));

    let zero = gateway.query_entity("A", Some(0), false).await;
    assert_eq!(node_ids(&zero), BTreeSet::from(["a"]));
    assert!(zero.edges.is_empty());

    assert!(gateway.query_entity("nonexistent", Some(3), false).await.is_empty());
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let gateway = open(dir.path()).await;
        gateway
            .merge_triples([TripleInput::new("Alice", "LIVES_IN", "Paris")])
            .await
            .unwrap();
        let mut metadata = Map::new();
        metadata.insert("kind".into(), Value::from("preference"));
        gateway
            .upsert_vector("pref-1", "Alice likes tea", embedding(&[0.2, 0.9, 0.1]), Some(metadata))
            .await
            .unwrap();
    }

    let gateway = open(dir.path()).await;
    let stats = gateway.stats().await;
    assert_eq!((stats.nodes, stats.edges, stats.vectors), (2, 1, 1));
    assert_eq!(stats.dimensions, Some(3));
    assert_eq!(gateway.query_entity("alice", None, false).await.nodes["alice"].label, "Alice");

    let persisted: Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("graph.json")).unwrap()).unwrap();
    assert!(persisted["nodes"]["paris"].is_object());
    assert_eq!(persisted["edges"][0]["relation"], "LIVES_IN");
}

#[tokio::test]
async fn vector_similarity_and_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = open(dir.path()).await;
    gateway
        .upsert_vector("east", "points east", embedding(&[1.0, 0.0]), None)
        .await
        .unwrap();
    gateway
        .upsert_vector("north", "points north", embedding(&[0.0, 1.0]), None)
        .await
        .unwrap();

    let hits = gateway.search_vectors(&embedding(&[1.0, 0.0]), None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "east");
    assert!((hits[0].similarity - 1.0).abs() < 1e-6);

    let err = gateway
        .upsert_vector("up", "points up", embedding(&[0.0, 0.0, 1.0]), None)
        .await
        .expect_err("dimension mismatch");
    assert!(matches!(err, agent_memory::MemoryError::DimensionMismatch { expected: 2, actual: 3 }));
    assert_eq!(gateway.stats().await.vectors, 2);
}

#[tokio::test]
async fn corrupt_graph_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = open(dir.path()).await;
    gateway
        .merge_triples([TripleInput::new("A", "KNOWS", "B")])
        .await
        .unwrap();

    std::fs::write(dir.path().join("graph.json"), "{ this is not json").unwrap();
    gateway.reload().await;
    assert!(gateway.query_entity("A", Some(2), true).await.is_empty());
    assert!(gateway.export_graph(None).await.is_empty());

    let reopened = open(dir.path()).await;
    assert!(reopened.query_entity("A", Some(2), true).await.is_empty());

    reopened
        .merge_triples([TripleInput::new("C", "KNOWS", "D")])
        .await
        .unwrap();
    let repaired: Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("graph.json")).unwrap()).unwrap();
    assert_eq!(repaired["edges"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn export_ages_out_old_history() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = open(dir.path()).await;
    gateway
        .merge_triples([
            TripleInput::new("A", "HAS_STATUS", "busy"),
            TripleInput::new("A", "HAS_STATUS", "idle"),
        ])
        .await
        .unwrap();

    let fresh = gateway.export_graph(None).await;
    assert_eq!(fresh.edges.len(), 2);
    assert!(fresh.nodes.contains_key("busy"));

    // Edges expired a moment ago fall outside a zero-length window.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let aged = gateway.export_graph(Some(Duration::ZERO)).await;
    assert_eq!(aged.edges.len(), 1);
    assert!(!aged.nodes.contains_key("busy"));
    assert!(gateway.graph().snapshot().await.node("busy").is_some());
}

#[tokio::test]
async fn json_dispatch_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = open(dir.path()).await;

    gateway
        .dispatch_json(json!({
            "op": "mergeTriples",
            "triples": [{"subject": "Rex", "predicate": "is a", "object": "Dog", "sourceType": "PET"}]
        }))
        .await
        .unwrap();

    let exported = gateway
        .dispatch_json(json!({"op": "exportGraph", "maxAgeSecs": 3600}))
        .await
        .unwrap();
    assert_eq!(exported["nodes"]["rex"]["type"], "PET");
    assert_eq!(exported["edges"][0]["relation"], "IS_A");

    let wiped = gateway.dispatch_json(json!({"op": "wipe"})).await.unwrap();
    assert_eq!(wiped, json!({"success": true}));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("vectors.json")).unwrap(),
        "[]"
    );
}

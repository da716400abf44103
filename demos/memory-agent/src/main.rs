//! Walks through the memory gateway: facts that change over time, bounded
//! recall from the graph, and semantic recall of free-text notes.

use std::path::PathBuf;
use std::sync::Arc;

use agent_memory::{
    EmbeddingProvider, EmbeddingVector, MemoryConfig, MemoryGateway, MemoryResult, TripleInput,
};
use agent_telemetry::{TracingOptions, init_tracing};
use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use tracing::info;

const DIMENSIONS: usize = 64;

#[derive(Debug, Parser)]
#[command(about = "Agent memory walkthrough")]
struct Args {
    /// Directory holding graph.json and vectors.json.
    #[arg(long, default_value = "./data/memory-demo")]
    data_dir: PathBuf,

    /// Optional JSON configuration file; overrides --data-dir.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wipe both stores before running.
    #[arg(long)]
    wipe: bool,

    /// Recall query for the vector store.
    #[arg(long, default_value = "when did alice move to porto")]
    query: String,
}

/// Feature-hashing embedder: every word bumps one of a fixed number of buckets.
struct HashingEmbedder;

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> MemoryResult<EmbeddingVector> {
        let mut values = vec![0.0_f32; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) % DIMENSIONS as u64;
            values[usize::try_from(bucket).unwrap_or_default()] += 1.0;
        }
        EmbeddingVector::new(values)
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&TracingOptions::new("info,agent_memory=debug"));
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => MemoryConfig::from_json_file(path)?,
        None => MemoryConfig::new(&args.data_dir),
    };
    let gateway = MemoryGateway::builder(config)
        .with_embedder(Arc::new(HashingEmbedder))
        .build()
        .await?;

    if args.wipe {
        gateway.wipe().await?;
    }

    info!("--- Facts ---");
    let outcome = gateway
        .merge_triples([
            TripleInput::new("Alice", "lives in", "Lisbon"),
            TripleInput::new("Alice", "works at", "Acme"),
            TripleInput::new("Acme", "located in", "Lisbon"),
            TripleInput::new("Alice", "knows", "Bob"),
        ])
        .await?;
    info!(new_nodes = outcome.new_nodes, new_edges = outcome.new_edges, "first batch merged");

    let outcome = gateway
        .merge_triples([
            TripleInput::new("Alice", "lives in", "Porto"),
            TripleInput::new("Alice", "knows", "Bob"),
        ])
        .await?;
    info!(new_nodes = outcome.new_nodes, new_edges = outcome.new_edges, "second batch merged");

    let current = gateway.query_entity("alice", Some(2), false).await;
    info!("Current view of Alice:\n{}", serde_json::to_string_pretty(&current)?);

    let history = gateway.query_entity("alice", Some(1), true).await;
    info!(edges = history.edges.len(), "Alice with history");

    info!("--- Notes ---");
    for note in [
        "Alice moved from Lisbon to Porto in spring",
        "Bob prefers green tea over coffee",
        "The Acme office is near the river",
    ] {
        let id = gateway.remember(note, None, None).await?;
        info!(%id, note, "remembered");
    }

    let hits = gateway.recall(&args.query, Some(3)).await?;
    info!(query = %args.query, hits = hits.len(), "recall");
    for hit in hits {
        info!("  {:.3}  {}", hit.similarity, hit.content);
    }

    let stats = gateway.stats().await;
    info!("Stats: {}", serde_json::to_string(&stats)?);
    Ok(())
}

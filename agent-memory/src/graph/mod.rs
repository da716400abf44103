//! Temporal knowledge graph: subject, predicate, object facts with history.

mod knowledge;
mod model;
mod store;
mod triple;

pub use knowledge::{GraphRules, KnowledgeGraph};
pub use model::{DEFAULT_NODE_TYPE, Edge, MergeOutcome, Node, Subgraph};
pub use store::GraphStore;
pub use triple::{Triple, TripleInput, normalize_id, normalize_relation};

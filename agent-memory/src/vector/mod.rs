//! Vector similarity store for unstructured recall.

mod index;
mod record;
mod store;

pub use index::VectorIndex;
pub use record::{VectorHit, VectorRecord};
pub use store::VectorStore;

//! Vector Index Adapter over pluggable nearest-neighbour stores.
//!
//! `VectorIndex` owns the embedder contract (batching, caching, dimension
//! checks, query timeout); stores only map ids to vectors.
pub mod cache;
pub mod index;
pub mod memory;

#[cfg(feature = "lancedb")]
pub mod lance;
#[cfg(feature = "lancedb")]
pub mod schema;

pub use cache::{content_hash, CacheEntry, EmbeddingCache};
pub use index::{PopulateStats, VectorIndex};
pub use memory::MemoryVectorStore;

#[cfg(feature = "lancedb")]
pub use lance::LanceVectorStore;

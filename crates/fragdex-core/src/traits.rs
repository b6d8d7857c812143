//! Seams between the core and its collaborators.
//!
//! The embedder and the vector store are external; both are narrow traits so
//! the lexical index and the ranker can be tested without network access.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{FragmentId, SearchHit};

pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g., `bge-m3:d1024`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality, identical for corpus and queries.
    fn dim(&self) -> usize;
    /// Maximum token length for this provider.
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| Error::EmbeddingProvider("embedder returned no vector".into()))
    }
}

/// Nearest-neighbour store keyed by fragment id.
///
/// `query` returns `(id, distance)` pairs, nearest first, where distance is
/// cosine distance (`1 - cosine similarity`). `retain` drops every id not
/// in `keep` and returns how many were removed.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, id: &str, vector: &[f32]) -> Result<()>;
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(FragmentId, f32)>>;
    async fn retain(&self, keep: &HashSet<FragmentId>) -> Result<usize>;
}

pub trait LexicalSearcher: Send + Sync {
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
}

#[async_trait]
pub trait SemanticSearcher: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
}

impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    fn embedder_id(&self) -> &str { (**self).embedder_id() }
    fn dim(&self) -> usize { (**self).dim() }
    fn max_len(&self) -> usize { (**self).max_len() }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
}

impl<T: LexicalSearcher + ?Sized> LexicalSearcher for Arc<T> {
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> { (**self).search(query, k) }
}

#[async_trait]
impl<T: VectorStore + ?Sized> VectorStore for Arc<T> {
    async fn upsert(&self, id: &str, vector: &[f32]) -> Result<()> { (**self).upsert(id, vector).await }
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(FragmentId, f32)>> { (**self).query(vector, k).await }
    async fn retain(&self, keep: &HashSet<FragmentId>) -> Result<usize> { (**self).retain(keep).await }
}

#[async_trait]
impl<T: SemanticSearcher + ?Sized> SemanticSearcher for Arc<T> {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> { (**self).search(query, k).await }
}

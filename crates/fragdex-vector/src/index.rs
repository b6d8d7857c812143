//! Vector Index Adapter: embeds fragments into an external nearest-neighbour
//! store and answers similarity queries against it.

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use fragdex_core::config::EmbeddingConfig;
use fragdex_core::error::{Error, Result};
use fragdex_core::traits::{Embedder, SemanticSearcher, VectorStore};
use fragdex_core::types::{Fragment, FragmentId, SearchHit, SourceKind};

use crate::cache::{content_hash, CacheEntry, EmbeddingCache};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PopulateStats {
    pub stored: usize,
    pub embedded: usize,
    pub cached: usize,
}

pub struct VectorIndex<S> {
    embedder: Arc<dyn Embedder>,
    store: S,
    cache: EmbeddingCache,
    timeout: Duration,
    batch_size: usize,
    show_progress: bool,
}

impl<S: VectorStore> VectorIndex<S> {
    pub fn new(embedder: Arc<dyn Embedder>, store: S, config: &EmbeddingConfig) -> Self {
        Self {
            embedder,
            store,
            cache: EmbeddingCache::new(),
            timeout: Duration::from_millis(config.timeout_ms),
            batch_size: config.batch_size.max(1),
            show_progress: config.show_progress,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &S { &self.store }
    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }
    pub fn cache(&self) -> &EmbeddingCache { &self.cache }

    /// Embed every fragment's content and upsert it under the fragment id.
    ///
    /// Each upsert is independent: a failure part-way leaves the earlier
    /// fragments stored, and a stored vector always belongs to its id.
    pub async fn populate(&self, fragments: &[Fragment]) -> Result<PopulateStats> {
        let mut stats = PopulateStats::default();
        let pb = if self.show_progress { ProgressBar::new(fragments.len() as u64) } else { ProgressBar::hidden() };
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} fragments ({percent}%) {msg}") {
            pb.set_style(style.progress_chars("#>-"));
        }
        let embedder_id = self.embedder.embedder_id().to_string();
        for batch in fragments.chunks(self.batch_size) {
            let hashes: Vec<String> = batch.iter().map(|f| content_hash(&f.content)).collect();
            let cached = self.cache.get_many(&embedder_id, &hashes);
            let missing: Vec<usize> = (0..batch.len()).filter(|&i| !cached.contains_key(&hashes[i])).collect();
            let texts: Vec<String> = missing.iter().map(|&i| batch[i].content.clone()).collect();
            let fresh = if texts.is_empty() { Vec::new() } else { self.embed_blocking(texts).await? };
            if fresh.len() != missing.len() {
                return Err(Error::EmbeddingProvider(format!("embedder returned {} vectors for {} texts", fresh.len(), missing.len())));
            }
            let mut by_pos: Vec<Option<Vec<f32>>> = vec![None; batch.len()];
            let mut new_entries = Vec::with_capacity(fresh.len());
            for (&i, vector) in missing.iter().zip(fresh) {
                self.check_dim(&vector)?;
                new_entries.push(CacheEntry { content_hash: hashes[i].clone(), embedder_id: embedder_id.clone(), vector: vector.clone() });
                by_pos[i] = Some(vector);
            }
            self.cache.put_many(new_entries);
            stats.embedded += missing.len();
            stats.cached += batch.len() - missing.len();
            for (i, fragment) in batch.iter().enumerate() {
                let vector = match by_pos[i].take() {
                    Some(v) => v,
                    None => cached.get(&hashes[i]).cloned().ok_or_else(|| Error::EmbeddingProvider(format!("no vector for {}", fragment.id)))?,
                };
                self.store.upsert(&fragment.id, &vector).await?;
                stats.stored += 1;
                pb.inc(1);
            }
        }
        pb.finish_and_clear();
        info!(stored = stats.stored, embedded = stats.embedded, cached = stats.cached, embedder = %embedder_id, "vector index populated");
        Ok(stats)
    }

    /// Drop stored vectors whose ids are not in `live`, so a rebuilt corpus
    /// does not compete with fragments it no longer contains.
    pub async fn retain(&self, live: &HashSet<FragmentId>) -> Result<usize> {
        let removed = self.store.retain(live).await?;
        if removed > 0 { info!(removed, kept = live.len(), "pruned stale vectors"); }
        Ok(removed)
    }

    async fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| Error::EmbeddingProvider(format!("embedding task failed: {e}")))?
    }

    fn check_dim(&self, vector: &[f32]) -> Result<()> {
        let dim = self.embedder.dim();
        if vector.len() != dim || vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::EmbeddingProvider(format!("malformed embedding: dim {} (expected {dim})", vector.len())));
        }
        Ok(())
    }

    /// Embed `query` (bounded by the configured timeout) and return the `k`
    /// most similar fragments with `similarity = 1 - cosine distance`,
    /// clamped to `[0, 1]`.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();
        let task = tokio::task::spawn_blocking(move || embedder.embed(&text));
        let vector = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => return Err(Error::IndexUnavailable(format!("query embedding timed out after {:?}", self.timeout))),
            Ok(Err(e)) => return Err(Error::EmbeddingProvider(format!("embedding task failed: {e}"))),
            Ok(Ok(v)) => v?,
        };
        self.check_dim(&vector)?;
        let mut hits: Vec<SearchHit> = self
            .store
            .query(&vector, k)
            .await?
            .into_iter()
            .map(|(id, distance)| SearchHit { id, score: (1.0 - distance).clamp(0.0, 1.0), source: SourceKind::Vector })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        debug!(query, hits = hits.len(), "vector search");
        Ok(hits)
    }
}

#[async_trait]
impl<S: VectorStore> SemanticSearcher for VectorIndex<S> {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> { VectorIndex::search(self, query, k).await }
}

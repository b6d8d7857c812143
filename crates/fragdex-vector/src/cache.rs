//! Embedding cache keyed by `(content_hash, embedder_id)`.
//!
//! Consulted before calling a provider and written through on misses, so
//! repopulating an unchanged corpus does not re-embed anything.
use parking_lot::RwLock;
use std::collections::HashMap;

pub fn content_hash(text: &str) -> String { blake3::hash(text.as_bytes()).to_hex().to_string() }

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub content_hash: String,
    pub embedder_id: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: RwLock<HashMap<(String, String), Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self { Self::default() }

    /// Cached vectors for `hashes`, keyed by hash. Misses are absent.
    pub fn get_many(&self, embedder_id: &str, hashes: &[String]) -> HashMap<String, Vec<f32>> {
        let entries = self.entries.read();
        hashes
            .iter()
            .filter_map(|h| entries.get(&(h.clone(), embedder_id.to_string())).map(|v| (h.clone(), v.clone())))
            .collect()
    }

    pub fn put_many(&self, new_entries: Vec<CacheEntry>) {
        if new_entries.is_empty() { return; }
        let mut entries = self.entries.write();
        for e in new_entries { entries.insert((e.content_hash, e.embedder_id), e.vector); }
    }

    pub fn len(&self) -> usize { self.entries.read().len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_scoped_by_embedder() {
        let cache = EmbeddingCache::new();
        let h = content_hash("hello");
        cache.put_many(vec![CacheEntry { content_hash: h.clone(), embedder_id: "a".into(), vector: vec![1.0] }]);
        assert_eq!(cache.get_many("a", &[h.clone()]).get(&h), Some(&vec![1.0]));
        assert!(cache.get_many("b", &[h]).is_empty());
        assert_eq!(content_hash("hello").len(), 64);
    }
}

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use fragdex_core::error::{Error, Result};
use fragdex_core::traits::VectorStore;
use fragdex_core::types::FragmentId;

/// Brute-force cosine store. Vectors are L2-normalised on insert, so
/// distance is `1 - dot`.
#[derive(Debug)]
pub struct MemoryVectorStore {
    dim: usize,
    vectors: RwLock<HashMap<FragmentId, Vec<f32>>>,
}

impl MemoryVectorStore {
    pub fn new(dim: usize) -> Self { Self { dim, vectors: RwLock::new(HashMap::new()) } }
    pub fn dim(&self) -> usize { self.dim }
    pub fn len(&self) -> usize { self.vectors.read().len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn clear(&self) { self.vectors.write().clear(); }

    fn check_dim(&self, v: &[f32]) -> Result<()> {
        if v.len() != self.dim { return Err(Error::EmbeddingProvider(format!("vector has dim {}, store expects {}", v.len(), self.dim))); }
        Ok(())
    }
}

fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 { v.iter().map(|x| x / norm).collect() } else { v.to_vec() }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, id: &str, vector: &[f32]) -> Result<()> {
        self.check_dim(vector)?;
        self.vectors.write().insert(id.to_string(), normalized(vector));
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(FragmentId, f32)>> {
        self.check_dim(vector)?;
        let q = normalized(vector);
        let vectors = self.vectors.read();
        let mut scored: Vec<(FragmentId, f32)> = vectors
            .iter()
            .map(|(id, v)| (id.clone(), 1.0 - v.iter().zip(&q).map(|(a, b)| a * b).sum::<f32>()))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    async fn retain(&self, keep: &HashSet<FragmentId>) -> Result<usize> {
        let mut vectors = self.vectors.write();
        let before = vectors.len();
        vectors.retain(|id, _| keep.contains(id));
        Ok(before - vectors.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nearest_first_and_upsert_replaces() {
        let store = MemoryVectorStore::new(2);
        store.upsert("x", &[1.0, 0.0]).await.unwrap();
        store.upsert("y", &[0.0, 3.0]).await.unwrap();
        let hits = store.query(&[0.0, 1.0], 2).await.unwrap();
        assert_eq!(hits[0].0, "y");
        assert!(hits[0].1.abs() < 1e-6);
        store.upsert("y", &[-1.0, 0.0]).await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.query(&[1.0, 0.0], 1).await.unwrap()[0].0, "x");
    }

    #[tokio::test]
    async fn retain_drops_ids_outside_the_live_set() {
        let store = MemoryVectorStore::new(2);
        for id in ["a", "b", "c"] { store.upsert(id, &[1.0, 0.0]).await.unwrap(); }
        let keep: HashSet<FragmentId> = ["b".to_string()].into_iter().collect();
        assert_eq!(store.retain(&keep).await.unwrap(), 2);
        let hits = store.query(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "b");
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected() {
        let store = MemoryVectorStore::new(3);
        assert!(matches!(store.upsert("x", &[1.0]).await, Err(Error::EmbeddingProvider(_))));
    }
}

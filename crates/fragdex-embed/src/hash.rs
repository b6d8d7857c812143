use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use fragdex_core::error::{Error, Result};
use fragdex_core::traits::Embedder;

/// Deterministic bag-of-tokens embedder: each lower-cased token is hashed
/// into one of `dim` buckets and the vector is L2-normalised. Texts sharing
/// words get positive cosine similarity; no model is needed. Only the first
/// `max_len` tokens count.
pub struct HashEmbedder {
    dim: usize,
    max_len: usize,
    id: String,
}

/// Token window of [`HashEmbedder::new`].
pub const HASH_MAX_TOKENS: usize = 512;

impl HashEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 { return Err(Error::InvalidConfig("hash embedder dim must be > 0".into())); }
        Ok(Self { dim, max_len: HASH_MAX_TOKENS, id: format!("hash:d{dim}") })
    }

    /// Same embedder with a different token window. The id changes with it
    /// so cached vectors are not shared across windows.
    pub fn with_max_len(self, max_len: usize) -> Result<Self> {
        if max_len == 0 { return Err(Error::InvalidConfig("hash embedder max_len must be > 0".into())); }
        let id = if max_len == HASH_MAX_TOKENS { format!("hash:d{}", self.dim) } else { format!("hash:d{}:t{max_len}", self.dim) };
        Ok(Self { max_len, id, ..self })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let tokens = text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|t| !t.is_empty())
            .take(self.max_len());
        for token in tokens {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

impl Embedder for HashEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_one(t)).collect()) }
}

//! Immutable fragment corpus and its publication point.
//!
//! A corpus is fully built before it is published; readers take an `Arc`
//! snapshot and never observe a partially constructed generation.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::types::{Fragment, FragmentId};

#[derive(Debug, Default)]
pub struct Corpus {
    fragments: Vec<Fragment>,
    by_id: HashMap<FragmentId, usize>,
}

impl Corpus {
    /// Duplicate ids keep their first occurrence.
    pub fn new(fragments: Vec<Fragment>) -> Self {
        let mut kept = Vec::with_capacity(fragments.len());
        let mut by_id = HashMap::with_capacity(fragments.len());
        for f in fragments {
            if by_id.contains_key(&f.id) { warn!(id = %f.id, "duplicate fragment id dropped from corpus"); continue; }
            by_id.insert(f.id.clone(), kept.len());
            kept.push(f);
        }
        Self { fragments: kept, by_id }
    }

    pub fn fragments(&self) -> &[Fragment] { &self.fragments }
    pub fn get(&self, id: &str) -> Option<&Fragment> { self.by_id.get(id).map(|&i| &self.fragments[i]) }
    /// Corpus order of a fragment.
    pub fn position(&self, id: &str) -> Option<usize> { self.by_id.get(id).copied() }
    pub fn len(&self) -> usize { self.fragments.len() }
    pub fn is_empty(&self) -> bool { self.fragments.is_empty() }
}

/// Atomic swap cell for the current corpus generation.
#[derive(Debug, Default)]
pub struct SharedCorpus {
    current: RwLock<Arc<Corpus>>,
}

impl SharedCorpus {
    pub fn new() -> Self { Self::default() }

    pub fn publish(&self, corpus: Corpus) -> Arc<Corpus> {
        let next = Arc::new(corpus);
        *self.current.write() = Arc::clone(&next);
        next
    }

    pub fn snapshot(&self) -> Arc<Corpus> { Arc::clone(&self.current.read()) }
}

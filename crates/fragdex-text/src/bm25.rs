//! In-memory BM25 over the fragment corpus.
//!
//! Each `build` produces a fresh immutable [`Snapshot`] that is swapped in
//! whole; concurrent searches keep the generation they started with.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use fragdex_core::config::LexicalConfig;
use fragdex_core::error::{Error, Result};
use fragdex_core::traits::LexicalSearcher;
use fragdex_core::types::{Fragment, FragmentId, SearchHit, SourceKind};

use crate::tokenize::{indexed_text, query_terms, tokenize};

/// `(doc ordinal, term frequency)`
type Posting = (u32, u32);

#[derive(Debug)]
struct Snapshot {
	generation: u64,
	ids: Vec<FragmentId>,
	doc_len: Vec<u32>,
	avg_len: f32,
	postings: HashMap<String, Vec<Posting>>,
}

impl Snapshot {
	fn build(fragments: &[Fragment], config: &LexicalConfig, generation: u64) -> Self {
		let mut ids = Vec::with_capacity(fragments.len());
		let mut doc_len = Vec::with_capacity(fragments.len());
		let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
		for (ord, fragment) in fragments.iter().enumerate() {
			let tokens = tokenize(&indexed_text(fragment, config), config.stop_words);
			let mut tf: HashMap<String, u32> = HashMap::new();
			for t in &tokens { *tf.entry(t.clone()).or_insert(0) += 1; }
			for (term, n) in tf { postings.entry(term).or_default().push((ord as u32, n)); }
			ids.push(fragment.id.clone());
			doc_len.push(tokens.len() as u32);
		}
		let total: u64 = doc_len.iter().map(|&l| u64::from(l)).sum();
		let avg_len = if ids.is_empty() { 0.0 } else { total as f32 / ids.len() as f32 };
		Self { generation, ids, doc_len, avg_len, postings }
	}

	/// Raw BM25 per matching document, best first, ties by corpus order.
	fn score(&self, query: &str, config: &LexicalConfig) -> Vec<(u32, f32)> {
		let n = self.ids.len() as f32;
		let mut acc = vec![0.0f32; self.ids.len()];
		for term in query_terms(query, config.stop_words) {
			let Some(list) = self.postings.get(&term) else { continue };
			let df = list.len() as f32;
			let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
			for &(ord, tf) in list {
				let tf = tf as f32;
				let dl = self.doc_len[ord as usize] as f32;
				let norm = if self.avg_len > 0.0 { dl / self.avg_len } else { 1.0 };
				acc[ord as usize] += idf * tf * (config.k1 + 1.0) / (tf + config.k1 * (1.0 - config.b + config.b * norm));
			}
		}
		let mut scored: Vec<(u32, f32)> = acc.into_iter().enumerate().filter(|(_, s)| *s > 0.0).map(|(i, s)| (i as u32, s)).collect();
		scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
		scored
	}
}

/// A built generation that searches do not see until
/// [`Bm25Index::publish`].
#[derive(Debug)]
pub struct StagedBm25(Arc<Snapshot>);

impl StagedBm25 {
	pub fn generation(&self) -> u64 { self.0.generation }
	pub fn len(&self) -> usize { self.0.ids.len() }
	pub fn is_empty(&self) -> bool { self.0.ids.is_empty() }
}

pub struct Bm25Index {
	config: LexicalConfig,
	current: RwLock<Option<Arc<Snapshot>>>,
	generation: AtomicU64,
}

impl Bm25Index {
	pub fn new(config: LexicalConfig) -> Self { Self { config, current: RwLock::new(None), generation: AtomicU64::new(0) } }

	pub fn config(&self) -> &LexicalConfig { &self.config }

	/// Index `fragments` as a new generation and publish it.
	pub fn build(&self, fragments: &[Fragment]) -> Result<()> {
		let staged = self.stage(fragments)?;
		self.publish(staged);
		Ok(())
	}

	/// Index `fragments` as a new generation without publishing it.
	pub fn stage(&self, fragments: &[Fragment]) -> Result<StagedBm25> {
		if fragments.is_empty() { return Err(Error::EmptyCorpus); }
		let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
		let snapshot = Snapshot::build(fragments, &self.config, generation);
		info!(generation, docs = snapshot.ids.len(), terms = snapshot.postings.len(), avg_len = snapshot.avg_len, "bm25 index built");
		Ok(StagedBm25(Arc::new(snapshot)))
	}

	pub fn publish(&self, staged: StagedBm25) {
		debug!(generation = staged.0.generation, "bm25 generation published");
		*self.current.write() = Some(staged.0);
	}

	fn snapshot(&self) -> Result<Arc<Snapshot>> {
		self.current.read().clone().ok_or_else(|| Error::IndexUnavailable("lexical index has not been built".into()))
	}

	/// Top `k` hits with unnormalized BM25 scores.
	pub fn search_raw(&self, query: &str, k: usize) -> Result<Vec<(FragmentId, f32)>> {
		let snap = self.snapshot()?;
		Ok(snap.score(query, &self.config).into_iter().take(k).map(|(ord, s)| (snap.ids[ord as usize].clone(), s)).collect())
	}

	/// Top `k` hits with scores mapped to `[0, 1]` by
	/// `min(raw / score_divisor, 1)`. This is a calibration heuristic: it
	/// keeps the lexical signal on the same scale as cosine similarity but
	/// carries no probabilistic meaning, and every raw score at or above the
	/// divisor collapses to 1.
	pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		let snap = self.snapshot()?;
		let mut hits: Vec<(u32, f32)> = snap.score(query, &self.config).into_iter().map(|(ord, raw)| (ord, normalize(raw, self.config.score_divisor))).collect();
		hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
		hits.truncate(k);
		debug!(query, generation = snap.generation, hits = hits.len(), "bm25 search");
		Ok(hits.into_iter().map(|(ord, score)| SearchHit { id: snap.ids[ord as usize].clone(), score, source: SourceKind::Lexical }).collect())
	}

	pub fn len(&self) -> usize { self.current.read().as_ref().map_or(0, |s| s.ids.len()) }
	pub fn is_empty(&self) -> bool { self.len() == 0 }
	/// Generation of the published snapshot; 0 before the first build.
	pub fn generation(&self) -> u64 { self.current.read().as_ref().map_or(0, |s| s.generation) }
}

pub(crate) fn normalize(raw: f32, divisor: f32) -> f32 { (raw / divisor).clamp(0.0, 1.0) }

impl LexicalSearcher for Bm25Index {
	fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> { Bm25Index::search(self, query, k) }
}

#[cfg(test)]
mod tests {
	use super::*;
	use fragdex_core::types::{ContentType, Meta};

	fn frag(id: &str, content: &str) -> Fragment {
		Fragment { id: id.into(), content: content.into(), content_type: ContentType::Capability, chunk_index: 0, total_chunks: 1, metadata: Meta::new() }
	}

	#[test]
	fn empty_corpus_is_rejected() {
		let index = Bm25Index::new(LexicalConfig::default());
		assert!(matches!(index.build(&[]), Err(Error::EmptyCorpus)));
		assert!(matches!(index.search("x", 3), Err(Error::IndexUnavailable(_))));
	}

	#[test]
	fn rarer_terms_weigh_more() {
		let index = Bm25Index::new(LexicalConfig::default());
		index.build(&[frag("a", "intent data platform"), frag("b", "data platform"), frag("c", "data warehouse")]).unwrap();
		let raw = index.search_raw("intent data", 10).unwrap();
		assert_eq!(raw[0].0, "a");
		assert!(raw.windows(2).all(|w| w[0].1 >= w[1].1));
	}

	#[test]
	fn ties_follow_corpus_order() {
		let index = Bm25Index::new(LexicalConfig::default());
		index.build(&[frag("z", "pricing tiers"), frag("a", "pricing tiers"), frag("m", "support")]).unwrap();
		let ids: Vec<_> = index.search("pricing", 10).unwrap().into_iter().map(|h| h.id).collect();
		assert_eq!(ids, vec!["z", "a"]);
	}

	#[test]
	fn no_overlap_returns_empty() {
		let index = Bm25Index::new(LexicalConfig::default());
		index.build(&[frag("a", "salesforce integration")]).unwrap();
		assert!(index.search("quantum", 5).unwrap().is_empty());
		assert!(index.search("the and of", 5).unwrap().is_empty());
	}

	#[test]
	fn normalized_scores_are_clamped() {
		let config = LexicalConfig { score_divisor: 0.01, ..LexicalConfig::default() };
		let index = Bm25Index::new(config);
		index.build(&[frag("a", "alpha"), frag("b", "beta")]).unwrap();
		let hits = index.search("alpha", 5).unwrap();
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].score, 1.0);
		assert_eq!(normalize(5.0, 10.0), 0.5);
	}

	#[test]
	fn staged_generation_is_invisible_until_published() {
		let index = Bm25Index::new(LexicalConfig::default());
		index.build(&[frag("a", "alpha")]).unwrap();
		let staged = index.stage(&[frag("b", "beta")]).unwrap();
		assert_eq!(staged.generation(), 2);
		assert_eq!(index.generation(), 1);
		assert!(index.search("beta", 5).unwrap().is_empty());
		assert_eq!(index.search("alpha", 5).unwrap()[0].id, "a");
		index.publish(staged);
		assert_eq!(index.generation(), 2);
		assert_eq!(index.search("beta", 5).unwrap()[0].id, "b");
	}

	#[test]
	fn rebuild_swaps_generation() {
		let index = Bm25Index::new(LexicalConfig::default());
		index.build(&[frag("a", "alpha")]).unwrap();
		assert_eq!(index.generation(), 1);
		index.build(&[frag("b", "beta"), frag("c", "gamma")]).unwrap();
		assert_eq!(index.generation(), 2);
		assert_eq!(index.len(), 2);
		assert!(index.search("alpha", 5).unwrap().is_empty());
	}
}

use anyhow::Context;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, warn};

use fragdex_core::config::LexicalConfig;
use fragdex_core::error::{Error, Result};
use fragdex_core::traits::LexicalSearcher;
use fragdex_core::types::{Fragment, SearchHit, SourceKind};

use crate::bm25::normalize;
use crate::tantivy_utils::{build_schema, register_tokenizer, LexicalFields};
use crate::tokenize::{indexed_text, query_terms, tokenize};

struct Generation {
	number: u64,
	reader: IndexReader,
	fields: LexicalFields,
	docs: usize,
}

/// A written generation that searches do not see until
/// [`TantivyLexicalIndex::publish`].
pub struct StagedTantivy(Arc<Generation>);

impl StagedTantivy {
	pub fn generation(&self) -> u64 { self.0.number }
	pub fn len(&self) -> usize { self.0.docs }
	pub fn is_empty(&self) -> bool { self.0.docs == 0 }
}

/// Lexical index backed by Tantivy, in RAM or with one directory per
/// build generation under `index_dir`.
///
/// Scoring is Tantivy's own BM25 (k1 = 1.2, b = 0.75); `k1`/`b` from the
/// config only apply to [`crate::Bm25Index`]. Tokenization, boosting,
/// normalization and tie-breaking match the in-memory index.
pub struct TantivyLexicalIndex {
	config: LexicalConfig,
	index_dir: Option<PathBuf>,
	current: RwLock<Option<Arc<Generation>>>,
	generation: AtomicU64,
}

impl TantivyLexicalIndex {
	pub fn in_ram(config: LexicalConfig) -> Self { Self { config, index_dir: None, current: RwLock::new(None), generation: AtomicU64::new(0) } }

	pub fn in_dir(config: LexicalConfig, index_dir: PathBuf) -> Self {
		Self { config, index_dir: Some(index_dir), current: RwLock::new(None), generation: AtomicU64::new(0) }
	}

	pub fn build(&self, fragments: &[Fragment]) -> Result<()> {
		let staged = self.stage(fragments)?;
		self.publish(staged);
		Ok(())
	}

	/// Write `fragments` as a new generation without publishing it.
	pub fn stage(&self, fragments: &[Fragment]) -> Result<StagedTantivy> {
		if fragments.is_empty() { return Err(Error::EmptyCorpus); }
		let number = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
		let built = self.write_generation(number, fragments).map_err(|e| Error::Operation(format!("tantivy build: {e:#}")))?;
		info!(generation = number, docs = built.docs, dir = ?self.index_dir, "tantivy index built");
		Ok(StagedTantivy(Arc::new(built)))
	}

	pub fn publish(&self, staged: StagedTantivy) {
		let number = staged.0.number;
		*self.current.write() = Some(staged.0);
		debug!(generation = number, "tantivy generation published");
		if let Some(dir) = &self.index_dir { prune_generations(dir, number); }
	}

	fn write_generation(&self, number: u64, fragments: &[Fragment]) -> anyhow::Result<Generation> {
		let (schema, fields) = build_schema();
		let index = match &self.index_dir {
			Some(dir) => {
				let gen_dir = dir.join(generation_dir_name(number));
				if gen_dir.exists() { std::fs::remove_dir_all(&gen_dir)?; }
				std::fs::create_dir_all(&gen_dir)?;
				Index::create_in_dir(&gen_dir, schema).with_context(|| format!("create index in {}", gen_dir.display()))?
			}
			None => Index::create_in_ram(schema),
		};
		register_tokenizer(&index, self.config.stop_words);
		let mut writer: IndexWriter = index.writer(50_000_000)?;
		for (ord, fragment) in fragments.iter().enumerate() {
			let terms = tokenize(&indexed_text(fragment, &self.config), self.config.stop_words).join(" ");
			writer.add_document(doc!(
				fields.id => fragment.id.clone(),
				fields.ordinal => ord as u64,
				fields.text => terms,
			))?;
		}
		writer.commit()?;
		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		reader.reload()?;
		Ok(Generation { number, reader, fields, docs: fragments.len() })
	}

	fn current(&self) -> Result<Arc<Generation>> {
		self.current.read().clone().ok_or_else(|| Error::IndexUnavailable("lexical index has not been built".into()))
	}

	/// `(id, ordinal, raw score)` for every matching document, best first.
	fn collect(&self, current: &Generation, query: &str) -> anyhow::Result<Vec<(String, u64, f32)>> {
		let clauses: Vec<(Occur, Box<dyn Query>)> = query_terms(query, self.config.stop_words)
			.into_iter()
			.map(|t| (Occur::Should, Box::new(TermQuery::new(Term::from_field_text(current.fields.text, &t), IndexRecordOption::WithFreqs)) as Box<dyn Query>))
			.collect();
		if clauses.is_empty() { return Ok(Vec::new()); }
		let searcher = current.reader.searcher();
		let top_docs = searcher.search(&BooleanQuery::new(clauses), &TopDocs::with_limit(current.docs.max(1)))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let id = doc.get_first(current.fields.id).and_then(|v| v.as_str()).context("stored id missing")?.to_string();
			let ord = doc.get_first(current.fields.ordinal).and_then(|v| v.as_u64()).context("stored ordinal missing")?;
			hits.push((id, ord, score));
		}
		hits.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.1.cmp(&b.1)));
		Ok(hits)
	}

	pub fn search_raw(&self, query: &str, k: usize) -> Result<Vec<(String, f32)>> {
		let current = self.current()?;
		let hits = self.collect(&current, query).map_err(|e| Error::IndexUnavailable(format!("tantivy search: {e:#}")))?;
		Ok(hits.into_iter().take(k).map(|(id, _, s)| (id, s)).collect())
	}

	pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		let current = self.current()?;
		let raw = self.collect(&current, query).map_err(|e| Error::IndexUnavailable(format!("tantivy search: {e:#}")))?;
		let mut hits: Vec<(String, u64, f32)> = raw.into_iter().map(|(id, ord, s)| (id, ord, normalize(s, self.config.score_divisor))).collect();
		hits.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.1.cmp(&b.1)));
		hits.truncate(k);
		debug!(query, generation = current.number, hits = hits.len(), "tantivy search");
		Ok(hits.into_iter().map(|(id, _, score)| SearchHit { id, score, source: SourceKind::Lexical }).collect())
	}

	pub fn len(&self) -> usize { self.current.read().as_ref().map_or(0, |g| g.docs) }
	pub fn is_empty(&self) -> bool { self.len() == 0 }
	pub fn generation(&self) -> u64 { self.current.read().as_ref().map_or(0, |g| g.number) }
}

impl LexicalSearcher for TantivyLexicalIndex {
	fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> { TantivyLexicalIndex::search(self, query, k) }
}

fn generation_dir_name(number: u64) -> String { format!("gen-{number:06}") }

/// Keep the published generation and the one before it.
fn prune_generations(dir: &Path, current: u64) {
	let Ok(entries) = std::fs::read_dir(dir) else { return };
	for entry in entries.filter_map(|e| e.ok()) {
		let name = entry.file_name().to_string_lossy().into_owned();
		let Some(n) = name.strip_prefix("gen-").and_then(|s| s.parse::<u64>().ok()) else { continue };
		if n + 1 < current {
			if let Err(e) = std::fs::remove_dir_all(entry.path()) { warn!(dir = %entry.path().display(), error = %e, "failed to prune lexical generation"); }
		}
	}
}

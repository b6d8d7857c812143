//! fragdex-text
//!
//! Lexical relevance over the fragment corpus: an in-memory BM25 index and a
//! Tantivy-backed variant with the same contract, selected by
//! `lexical.backend`.
pub mod bm25;
pub mod tantivy_index;
pub mod tantivy_utils;
pub mod tokenize;

use std::path::Path;

use fragdex_core::config::{resolve_with_base, LexicalBackend, LexicalConfig};
use fragdex_core::error::{Error, Result};
use fragdex_core::traits::LexicalSearcher;
use fragdex_core::types::{Fragment, SearchHit};

pub use bm25::{Bm25Index, StagedBm25};
pub use tantivy_index::{StagedTantivy, TantivyLexicalIndex};

/// A lexical generation built by [`LexicalIndex::stage`], not yet searchable.
pub enum StagedLexical {
	Memory(StagedBm25),
	Tantivy(StagedTantivy),
}

impl StagedLexical {
	pub fn generation(&self) -> u64 { match self { Self::Memory(s) => s.generation(), Self::Tantivy(s) => s.generation() } }
}

/// The configured lexical backend.
pub enum LexicalIndex {
	Memory(Bm25Index),
	Tantivy(TantivyLexicalIndex),
}

impl LexicalIndex {
	/// `index_dir` is resolved against `base`; without one the Tantivy
	/// backend stays in RAM.
	pub fn from_config(config: LexicalConfig, base: &Path) -> Self {
		match config.backend {
			LexicalBackend::Memory => Self::Memory(Bm25Index::new(config)),
			LexicalBackend::Tantivy => match config.index_dir.clone() {
				Some(dir) => Self::Tantivy(TantivyLexicalIndex::in_dir(config, resolve_with_base(base, dir))),
				None => Self::Tantivy(TantivyLexicalIndex::in_ram(config)),
			},
		}
	}

	pub fn build(&self, fragments: &[Fragment]) -> Result<()> {
		match self { Self::Memory(i) => i.build(fragments), Self::Tantivy(i) => i.build(fragments) }
	}

	pub fn stage(&self, fragments: &[Fragment]) -> Result<StagedLexical> {
		match self {
			Self::Memory(i) => i.stage(fragments).map(StagedLexical::Memory),
			Self::Tantivy(i) => i.stage(fragments).map(StagedLexical::Tantivy),
		}
	}

	/// Make a staged generation searchable. It must come from this index.
	pub fn publish(&self, staged: StagedLexical) -> Result<()> {
		match (self, staged) {
			(Self::Memory(i), StagedLexical::Memory(s)) => i.publish(s),
			(Self::Tantivy(i), StagedLexical::Tantivy(s)) => i.publish(s),
			_ => return Err(Error::Operation("staged generation belongs to another lexical backend".into())),
		}
		Ok(())
	}

	pub fn search_raw(&self, query: &str, k: usize) -> Result<Vec<(String, f32)>> {
		match self { Self::Memory(i) => i.search_raw(query, k), Self::Tantivy(i) => i.search_raw(query, k) }
	}

	pub fn len(&self) -> usize { match self { Self::Memory(i) => i.len(), Self::Tantivy(i) => i.len() } }
	pub fn is_empty(&self) -> bool { self.len() == 0 }
	pub fn generation(&self) -> u64 { match self { Self::Memory(i) => i.generation(), Self::Tantivy(i) => i.generation() } }
}

impl LexicalSearcher for LexicalIndex {
	fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		match self { Self::Memory(i) => i.search(query, k), Self::Tantivy(i) => i.search(query, k) }
	}
}

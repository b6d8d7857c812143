use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, StopWordFilter, TextAnalyzer, WhitespaceTokenizer};
use tantivy::Index;

use crate::tokenize::STOP_WORDS;

pub const TERMS_TOKENIZER: &str = "fragdex_terms";

#[derive(Debug, Clone, Copy)]
pub struct LexicalFields {
	pub id: Field,
	pub ordinal: Field,
	pub text: Field,
}

pub fn build_schema() -> (Schema, LexicalFields) {
	let mut schema_builder = Schema::builder();
	let id = schema_builder.add_text_field("id", STRING | STORED);
	let ordinal = schema_builder.add_u64_field("ordinal", STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TERMS_TOKENIZER).set_index_option(IndexRecordOption::WithFreqs);
	let text = schema_builder.add_text_field("text", TextOptions::default().set_indexing_options(text_field_indexing));
	(schema_builder.build(), LexicalFields { id, ordinal, text })
}

/// Whitespace split, lower-case, optional stop-word removal. Text reaching
/// this analyzer is already trimmed by [`crate::tokenize::tokenize`].
pub fn register_tokenizer(index: &Index, stop_words: bool) {
	let builder = TextAnalyzer::builder(WhitespaceTokenizer::default()).filter(LowerCaser);
	let analyzer = if stop_words {
		builder.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string()))).build()
	} else {
		builder.build()
	};
	index.tokenizers().register(TERMS_TOKENIZER, analyzer);
}

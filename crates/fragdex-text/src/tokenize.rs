//! Term extraction shared by corpus indexing and query parsing.

use fragdex_core::config::LexicalConfig;
use fragdex_core::types::Fragment;

pub const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

pub fn is_stop_word(term: &str) -> bool { STOP_WORDS.contains(&term) }

/// Lower-cased whitespace tokens with leading/trailing punctuation trimmed.
/// Inner punctuation survives (`high-intent`, `4.5x`).
pub fn tokenize(text: &str, stop_words: bool) -> Vec<String> {
	text.split_whitespace()
		.map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
		.filter(|t| !t.is_empty() && !(stop_words && is_stop_word(t)))
		.collect()
}

/// Query tokens, first occurrence kept, so a repeated word does not count twice.
pub fn query_terms(query: &str, stop_words: bool) -> Vec<String> {
	let mut terms = tokenize(query, stop_words);
	let mut seen = std::collections::HashSet::new();
	terms.retain(|t| seen.insert(t.clone()));
	terms
}

/// The text a fragment contributes to the index: the first
/// `max_indexed_chars` characters of its content plus boost-field values.
pub fn indexed_text(fragment: &Fragment, config: &LexicalConfig) -> String {
	let content = &fragment.content;
	let full = fragment.searchable_text(&config.boost_fields);
	let cut = content.char_indices().nth(config.max_indexed_chars).map_or(content.len(), |(i, _)| i);
	format!("{}{}", &content[..cut], &full[content.len()..])
}

#[cfg(test)]
mod tests {
	use super::*;
	use fragdex_core::types::{ContentType, Meta};

	#[test]
	fn trims_edges_and_drops_stop_words() {
		assert_eq!(tokenize("The AI, (and) High-Intent accounts!", true), vec!["ai", "high-intent", "accounts"]);
		assert_eq!(tokenize("The AI", false), vec!["the", "ai"]);
		assert!(tokenize(" -- ... ", true).is_empty());
	}

	#[test]
	fn query_terms_are_deduplicated() {
		assert_eq!(query_terms("pricing Pricing PRICING plans", true), vec!["pricing", "plans"]);
	}

	#[test]
	fn indexed_text_truncates_content_but_keeps_boosts() {
		let mut metadata = Meta::new();
		metadata.insert("category".into(), "Security".into());
		let frag = Fragment { id: "f".into(), content: "abcdefghij".into(), content_type: ContentType::Faq, chunk_index: 0, total_chunks: 1, metadata };
		let config = LexicalConfig { max_indexed_chars: 4, ..LexicalConfig::default() };
		assert_eq!(indexed_text(&frag, &config), "abcd\nSecurity");
	}
}

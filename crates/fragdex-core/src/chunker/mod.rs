//! Content-aware chunking of parent records into fragments.
//!
//! A record's recognized fields are assembled into labelled sections, split
//! along the boundaries its policy names (paragraphs, sentences, Q/A pairs,
//! metric groups), packed greedily up to `target_size` characters and, for
//! paragraph and sentence strategies, prefixed with a word-aligned overlap
//! from the previous fragment.
//!
//! Chunking never drops text: a span that cannot be split (one long
//! sentence) becomes a single oversized fragment.

mod pack;
pub mod policy;
pub mod text;

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{Fragment, ParentRecord, RecordField};

pub use policy::{BoundaryStrategy, ChunkPolicies, ChunkPolicy};
pub use text::{assemble_text, Section};

use pack::{pack, rebalance_tail, refine_oversized, render_with_overlap, Unit};
use text::{metric_groups, paragraphs, sections, sentences, SECTION_SEP};

/// Outcome of chunking a batch of records.
#[derive(Debug, Default)]
pub struct ChunkReport {
    pub fragments: Vec<Fragment>,
    /// Ids of records skipped because they had no searchable text.
    pub skipped: Vec<String>,
}

/// Stateless apart from the record sequence counter, which keeps fragment
/// ids unique across batches handled by the same chunker. Build a fresh
/// chunker per corpus generation to get identical ids on rebuild.
#[derive(Debug)]
pub struct Chunker {
    policies: ChunkPolicies,
    next_seq: AtomicU64,
}

impl Default for Chunker {
    fn default() -> Self { Self { policies: ChunkPolicies::builtin(), next_seq: AtomicU64::new(0) } }
}

/// `<seq>-<record id>-<chunk index>`; zero padding keeps lexical id order
/// equal to corpus order within a build.
pub fn fragment_id(record_id: &str, seq: u64, chunk_index: usize) -> String {
    format!("{seq:06}-{record_id}-{chunk_index:03}")
}

impl Chunker {
    pub fn new(policies: ChunkPolicies) -> Result<Self> {
        policies.validate()?;
        Ok(Self { policies, next_seq: AtomicU64::new(0) })
    }

    pub fn policies(&self) -> &ChunkPolicies { &self.policies }

    /// Chunk one record with the policy resolved from its content type.
    pub fn chunk_record(&self, record: &ParentRecord, seq: u64) -> Result<Vec<Fragment>> {
        Self::chunk_with_policy(record, self.policies.resolve(&record.content_type), seq)
    }

    /// Deterministic: the same record, policy and `seq` always yield the
    /// same fragments.
    pub fn chunk_with_policy(record: &ParentRecord, policy: &ChunkPolicy, seq: u64) -> Result<Vec<Fragment>> {
        policy.validate()?;
        let secs = sections(record);
        if secs.is_empty() { return Err(Error::EmptyContent { record_id: record.id.clone() }); }
        let contents = split_sections(&secs, policy);
        let total_chunks = contents.len();
        let metadata = record.metadata();
        debug!(record = %record.id, strategy = ?policy.boundary_strategy, total_chunks, "chunked record");
        Ok(contents
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| Fragment {
                id: fragment_id(&record.id, seq, chunk_index),
                content,
                content_type: record.content_type.clone(),
                chunk_index,
                total_chunks,
                metadata: metadata.clone(),
            })
            .collect())
    }

    /// Chunk a batch, drawing sequence numbers from this chunker's counter.
    /// Records without searchable text are logged and skipped.
    pub fn chunk_records(&self, records: &[ParentRecord]) -> ChunkReport {
        let mut report = ChunkReport::default();
        for record in records {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            match self.chunk_record(record, seq) {
                Ok(fragments) => report.fragments.extend(fragments),
                Err(e) => {
                    warn!(record = %record.id, error = %e, "skipping record");
                    report.skipped.push(record.id.clone());
                }
            }
        }
        debug!(records = records.len(), fragments = report.fragments.len(), skipped = report.skipped.len(), "chunked batch");
        report
    }
}

fn split_sections(secs: &[Section], policy: &ChunkPolicy) -> Vec<String> {
    let target = policy.target_size;
    let units = match policy.boundary_strategy {
        BoundaryStrategy::Sentence => sentence_units(secs),
        BoundaryStrategy::SemanticParagraph => {
            let full = join_sections(secs);
            let paras = paragraphs(&full);
            if paras.len() < 2 {
                sentence_units(secs)
            } else {
                refine_oversized(paras.into_iter().map(|p| Unit::new(p, SECTION_SEP)).collect(), target)
            }
        }
        BoundaryStrategy::QaPair => refine_oversized(qa_units(secs, target), target),
        BoundaryStrategy::MetricGroup => {
            refine_oversized(metric_groups(secs).into_iter().map(|g| Unit::new(g, "\n")).collect(), target)
        }
    };
    let pieces = rebalance_tail(pack(units, target), policy.min_fragment_size, target);
    render_with_overlap(&pieces, policy.effective_overlap())
}

fn join_sections(secs: &[Section]) -> String {
    secs.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(SECTION_SEP)
}

fn sentence_units(secs: &[Section]) -> Vec<Unit> {
    secs.iter().flat_map(|s| sentences(&s.text).into_iter().map(|t| Unit::new(t, " ")).collect::<Vec<_>>()).collect()
}

/// Sections as units, with a question and the answer right after it fused
/// into one unit whenever the pair fits `target`.
fn qa_units(secs: &[Section], target: usize) -> Vec<Unit> {
    let mut units = Vec::with_capacity(secs.len());
    let mut i = 0;
    while i < secs.len() {
        let cur = &secs[i];
        if cur.field == RecordField::Question {
            if let Some(next) = secs.get(i + 1).filter(|n| n.field == RecordField::Answer) {
                let pair = format!("{}{SECTION_SEP}{}", cur.text, next.text);
                if text::char_len(&pair) <= target {
                    units.push(Unit::new(pair, SECTION_SEP));
                    i += 2;
                    continue;
                }
            }
        }
        units.push(Unit::new(cur.text.clone(), SECTION_SEP));
        i += 1;
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentType;

    fn sentence_policy(target: usize, overlap: usize) -> ChunkPolicy { ChunkPolicy::new(BoundaryStrategy::Sentence, target, overlap, 0) }

    #[test]
    fn empty_record_is_an_error() {
        let record = ParentRecord::new("blank", "faq").with_field(RecordField::Answer, "   ");
        let err = Chunker::default().chunk_record(&record, 0).unwrap_err();
        assert!(matches!(err, Error::EmptyContent { record_id } if record_id == "blank"));
    }

    #[test]
    fn unbreakable_sentence_becomes_one_fragment() {
        let prefix = "Description: ";
        let body: String = (0..).map(|i| if i % 7 == 6 { ' ' } else { 'x' }).take(2000 - prefix.len()).collect();
        let record = ParentRecord::new("long", "other").with_field(RecordField::Description, body);
        let text = assemble_text(&record).unwrap();
        assert_eq!(text.chars().count(), 2000);
        let frags = Chunker::chunk_with_policy(&record, &sentence_policy(250, 0), 0).unwrap();
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].content, text);
    }

    #[test]
    fn qa_pairs_stay_together_and_never_overlap() {
        let record = ParentRecord::new("faq-1", ContentType::Faq)
            .with_field(RecordField::Label, "Pricing")
            .with_field(RecordField::Question, "How is 6sense priced?")
            .with_field(RecordField::Answer, "Pricing is annual and based on the number of seats.");
        let policy = ChunkPolicy::new(BoundaryStrategy::QaPair, 100, 40, 0);
        let frags = Chunker::chunk_with_policy(&record, &policy, 3).unwrap();
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0].content, "Label: Pricing");
        assert!(frags[1].content.starts_with("Question: How is 6sense priced?\n\nAnswer: "));
        assert!(!frags[1].content.contains("Label"), "no overlap for Q/A");
    }

    #[test]
    fn qa_pair_that_does_not_fit_splits_at_the_boundary() {
        let answer = "A long answer. ".repeat(6);
        let record = ParentRecord::new("faq-2", ContentType::Faq)
            .with_field(RecordField::Question, "Why?")
            .with_field(RecordField::Answer, answer.trim());
        let policy = ChunkPolicy::new(BoundaryStrategy::QaPair, 100, 0, 0);
        let frags = Chunker::chunk_with_policy(&record, &policy, 0).unwrap();
        assert_eq!(frags[0].content, "Question: Why?");
        assert!(frags[1].content.starts_with("Answer: "));
    }

    #[test]
    fn single_paragraph_falls_back_to_sentences_with_overlap() {
        let record = ParentRecord::new("cap-1", ContentType::Capability)
            .with_field(RecordField::Description, "Alpha one two. Beta three four. Gamma five six.");
        let policy = ChunkPolicy::new(BoundaryStrategy::SemanticParagraph, 30, 10, 0);
        let frags = Chunker::chunk_with_policy(&record, &policy, 0).unwrap();
        assert_eq!(frags.len(), 3);
        assert_eq!(frags[0].content, "Description: Alpha one two.");
        assert_eq!(frags[1].content, "one two. Beta three four.");
        assert!(frags.iter().all(|f| f.content.chars().count() <= 40));
    }

    #[test]
    fn fragments_are_indexed_and_carry_metadata() {
        let record = ParentRecord::new("cmp-9", ContentType::Comparison)
            .with_field(RecordField::Label, "vs Competitor")
            .with_field(RecordField::Description, "We win on data. We win on AI. We win on service.")
            .with_field(RecordField::Category, "Competitive")
            .with_source("comparisons.json");
        let frags = Chunker::chunk_with_policy(&record, &sentence_policy(40, 0), 12).unwrap();
        assert!(frags.len() > 1);
        for (i, f) in frags.iter().enumerate() {
            assert_eq!(f.chunk_index, i);
            assert_eq!(f.total_chunks, frags.len());
            assert_eq!(f.id, fragment_id("cmp-9", 12, i));
            assert_eq!(f.metadata.get("source_file").map(String::as_str), Some("comparisons.json"));
            assert_eq!(f.metadata.get("category").map(String::as_str), Some("Competitive"));
        }
    }

    #[test]
    fn batch_ids_stay_unique_for_duplicate_record_ids() {
        let chunker = Chunker::default();
        let a = ParentRecord::new("dup", "faq").with_field(RecordField::Question, "Q?").with_source("a.json");
        let b = ParentRecord::new("dup", "faq").with_field(RecordField::Question, "Q?").with_source("b.json");
        let first = chunker.chunk_records(std::slice::from_ref(&a));
        let second = chunker.chunk_records(&[b, ParentRecord::new("empty", "faq")]);
        assert_eq!(second.skipped, vec!["empty".to_string()]);
        assert_ne!(first.fragments[0].id, second.fragments[0].id);
    }

    #[test]
    fn metric_groups_are_not_overlapped() {
        let record = ParentRecord::new("m-1", ContentType::Metric)
            .with_field(RecordField::Description, "Outcomes\n- Pipeline up 30%\n- Win rate up 2x\n- Deal size up 25%");
        let policy = ChunkPolicy::new(BoundaryStrategy::MetricGroup, 40, 20, 0);
        let frags = Chunker::chunk_with_policy(&record, &policy, 0).unwrap();
        assert!(frags.len() >= 2);
        assert!(frags.iter().skip(1).all(|f| f.content.starts_with("- ")));
    }
}

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fragdex_core::config::{EmbeddingConfig, FusionConfig, LexicalConfig};
use fragdex_core::corpus::Corpus;
use fragdex_core::error::{Error, Result};
use fragdex_core::traits::{LexicalSearcher, SemanticSearcher};
use fragdex_core::types::{ContentType, Fragment, Meta, SearchHit, SourceKind};
use fragdex_embed::HashEmbedder;
use fragdex_hybrid::FusionRanker;
use fragdex_text::Bm25Index;
use fragdex_vector::{MemoryVectorStore, VectorIndex};

fn frag(id: &str, content: &str, category: Option<&str>) -> Fragment {
    let mut metadata = Meta::new();
    metadata.insert("record_id".into(), id.into());
    if let Some(c) = category { metadata.insert("category".into(), c.into()); }
    Fragment { id: id.into(), content: content.into(), content_type: ContentType::Capability, chunk_index: 0, total_chunks: 1, metadata }
}

fn scenario() -> Vec<Fragment> {
    vec![
        frag("F1", "6sense uses artificial intelligence to identify high-intent accounts", Some("AI and Machine Learning")),
        frag("F2", "Our pricing starts at $5000 per year", Some("Pricing")),
        frag("F3", "We integrate with Salesforce and HubSpot", Some("Integrations")),
    ]
}

fn hit(id: &str, score: f32, source: SourceKind) -> SearchHit { SearchHit { id: id.into(), score, source } }

struct FixedLexical(Vec<SearchHit>);
impl LexicalSearcher for FixedLexical {
    fn search(&self, _query: &str, k: usize) -> Result<Vec<SearchHit>> { Ok(self.0.iter().take(k).cloned().collect()) }
}

struct FixedVector(Vec<SearchHit>);
#[async_trait]
impl SemanticSearcher for FixedVector {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<SearchHit>> { Ok(self.0.iter().take(k).cloned().collect()) }
}

struct DownLexical;
impl LexicalSearcher for DownLexical {
    fn search(&self, _query: &str, _k: usize) -> Result<Vec<SearchHit>> { Err(Error::IndexUnavailable("lexical index has not been built".into())) }
}

struct DownVector;
#[async_trait]
impl SemanticSearcher for DownVector {
    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<SearchHit>> { Err(Error::IndexUnavailable("connection refused".into())) }
}

#[derive(Default)]
struct RecordingVector { requested: AtomicUsize }
#[async_trait]
impl SemanticSearcher for RecordingVector {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.requested.store(k, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

fn approx(a: f32, b: f32) -> bool { (a - b).abs() < 1e-5 }

#[tokio::test]
async fn keyword_only_weights_rank_the_ai_fragment_first() {
    let lexical = Bm25Index::new(LexicalConfig::default());
    lexical.build(&scenario()).unwrap();
    let ranker = FusionRanker::new(lexical, DownVector, FusionConfig::new(0.0, 1.0)).unwrap();
    let corpus = Corpus::new(scenario());
    let ranked = ranker.rank(&corpus, "AI and machine learning capabilities", 3).await.unwrap();
    assert_eq!(ranked[0].fragment_id, "F1");
    assert_eq!(ranked[0].metadata.get("category").map(String::as_str), Some("AI and Machine Learning"));
    assert!(ranked.iter().all(|r| r.vector_score == 0.0));
    assert!(ranked.iter().all(|r| r.fragment_id != "F3"));
}

#[tokio::test]
async fn combined_score_is_the_weighted_sum() {
    let lexical = FixedLexical(vec![hit("a", 1.0, SourceKind::Lexical), hit("b", 0.5, SourceKind::Lexical)]);
    let vector = FixedVector(vec![hit("b", 1.0, SourceKind::Vector), hit("c", 0.8, SourceKind::Vector)]);
    let ranker = FusionRanker::new(lexical, vector, FusionConfig::default()).unwrap();
    let records = ranker.score("q", 10).await.unwrap();
    let ids: Vec<_> = records.iter().map(|r| r.fragment_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c", "a"]);
    assert!(approx(records[0].combined_score, 0.8));
    assert!(approx(records[1].combined_score, 0.48));
    assert_eq!(records[1].lexical_score, None, "a signal-only candidate keeps its other score absent");
    assert!(approx(records[2].combined_score, 0.4));
}

#[tokio::test]
async fn weights_are_normalized() {
    let ranker = FusionRanker::new(FixedLexical(vec![]), FixedVector(vec![]), FusionConfig::new(3.0, 1.0)).unwrap();
    let (s, k) = ranker.weights();
    assert!(approx(s, 0.75) && approx(k, 0.25));
}

#[tokio::test]
async fn invalid_weights_are_rejected() {
    for (s, k) in [(0.0, 0.0), (-0.5, 1.0), (f32::NAN, 1.0), (1.0, f32::INFINITY)] {
        let res = FusionRanker::new(FixedLexical(vec![]), FixedVector(vec![]), FusionConfig::new(s, k));
        assert!(matches!(res, Err(Error::InvalidWeight { .. })), "({s}, {k}) accepted");
    }
}

#[tokio::test]
async fn equal_scores_break_ties_by_fragment_id() {
    let lexical = FixedLexical(vec![hit("z", 0.5, SourceKind::Lexical), hit("a", 0.5, SourceKind::Lexical), hit("m", 0.5, SourceKind::Lexical)]);
    let ranker = FusionRanker::new(lexical, FixedVector(vec![]), FusionConfig::default()).unwrap();
    let ids: Vec<_> = ranker.score("q", 3).await.unwrap().into_iter().map(|r| r.fragment_id).collect();
    assert_eq!(ids, vec!["a", "m", "z"]);
}

#[tokio::test]
async fn each_index_is_asked_for_twice_top_k() {
    let vector = Arc::new(RecordingVector::default());
    let ranker = FusionRanker::new(FixedLexical(vec![]), Arc::clone(&vector), FusionConfig::default()).unwrap();
    ranker.score("q", 7).await.unwrap();
    assert_eq!(vector.requested.load(Ordering::SeqCst), 14);
}

#[tokio::test]
async fn zero_semantic_weight_reproduces_lexical_order() {
    let corpus: Vec<Fragment> = (0..8).map(|i| frag(&format!("f{i:02}"), &"pricing tiers support ".repeat(i % 3 + 1), None)).collect();
    let lexical = Arc::new(Bm25Index::new(LexicalConfig::default()));
    lexical.build(&corpus).unwrap();
    let expected: Vec<_> = lexical.search("pricing support", 4).unwrap().into_iter().map(|h| h.id).collect();
    let ranker = FusionRanker::new(Arc::clone(&lexical), FixedVector(vec![hit("f07", 1.0, SourceKind::Vector)]), FusionConfig::new(0.0, 1.0)).unwrap();
    let got: Vec<_> = ranker.rank(&Corpus::new(corpus), "pricing support", 4).await.unwrap().into_iter().map(|r| r.fragment_id).collect();
    assert_eq!(got, expected);
}

#[tokio::test]
async fn zero_keyword_weight_reproduces_vector_order() {
    let corpus = scenario();
    let vector = Arc::new(VectorIndex::new(Arc::new(HashEmbedder::new(64).unwrap()), MemoryVectorStore::new(64), &EmbeddingConfig { dim: 64, ..EmbeddingConfig::default() }));
    vector.populate(&corpus).await.unwrap();
    let expected: Vec<_> = vector.search("salesforce pricing", 3).await.unwrap().into_iter().map(|h| h.id).collect();
    let ranker = FusionRanker::new(DownLexical, Arc::clone(&vector), FusionConfig::new(1.0, 0.0)).unwrap();
    let got: Vec<_> = ranker.rank(&Corpus::new(corpus), "salesforce pricing", 3).await.unwrap().into_iter().map(|r| r.fragment_id).collect();
    assert_eq!(got, expected);
}

#[tokio::test]
async fn unavailable_vector_index_degrades_to_lexical() {
    let lexical = Bm25Index::new(LexicalConfig::default());
    lexical.build(&scenario()).unwrap();
    let ranker = FusionRanker::new(lexical, DownVector, FusionConfig::default()).unwrap();
    let ranked = ranker.rank(&Corpus::new(scenario()), "pricing per year", 3).await.unwrap();
    assert_eq!(ranked[0].fragment_id, "F2");
    for r in &ranked {
        assert_eq!(r.vector_score, 0.0);
        assert!(approx(r.combined_score, 0.4 * r.lexical_score));
    }
}

#[tokio::test]
async fn both_indexes_down_is_an_error() {
    let ranker = FusionRanker::new(DownLexical, DownVector, FusionConfig::default()).unwrap();
    let err = ranker.score("anything", 5).await.unwrap_err();
    match err {
        Error::BothIndexesUnavailable { lexical, vector } => {
            assert!(lexical.contains("not been built"));
            assert!(vector.contains("connection refused"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn semantic_only_ranking_falls_back_to_lexical_when_vectors_are_down() {
    let lexical = Bm25Index::new(LexicalConfig::default());
    lexical.build(&scenario()).unwrap();
    let ranker = FusionRanker::new(lexical, DownVector, FusionConfig::new(1.0, 0.0)).unwrap();
    let ranked = ranker.rank(&Corpus::new(scenario()), "pricing per year", 3).await.unwrap();
    assert_eq!(ranked[0].fragment_id, "F2");
    for r in &ranked {
        assert_eq!(r.vector_score, 0.0);
        assert!(r.lexical_score > 0.0);
        assert!(approx(r.combined_score, r.lexical_score));
    }
}

#[tokio::test]
async fn keyword_only_ranking_falls_back_to_vectors_when_lexical_is_down() {
    let vector = FixedVector(vec![hit("b", 0.9, SourceKind::Vector), hit("a", 0.4, SourceKind::Vector)]);
    let ranker = FusionRanker::new(DownLexical, vector, FusionConfig::new(0.0, 1.0)).unwrap();
    let records = ranker.score("q", 5).await.unwrap();
    let ids: Vec<_> = records.iter().map(|r| r.fragment_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(records[0].lexical_score, None);
    assert!(approx(records[0].combined_score, 0.9));
}

#[tokio::test]
async fn fallback_that_also_fails_is_an_error() {
    let ranker = FusionRanker::new(DownLexical, DownVector, FusionConfig::new(0.0, 1.0)).unwrap();
    match ranker.score("q", 5).await {
        Err(Error::BothIndexesUnavailable { lexical, vector }) => {
            assert!(lexical.contains("not been built"));
            assert!(vector.contains("connection refused"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn no_candidates_is_an_empty_result() {
    let ranker = FusionRanker::new(FixedLexical(vec![]), FixedVector(vec![]), FusionConfig::default()).unwrap();
    assert!(ranker.rank(&Corpus::new(scenario()), "quantum", 5).await.unwrap().is_empty());
    assert!(ranker.score("anything", 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn candidates_missing_from_the_corpus_are_skipped() {
    let vector = FixedVector(vec![hit("ghost", 0.99, SourceKind::Vector), hit("F2", 0.5, SourceKind::Vector), hit("F3", 0.4, SourceKind::Vector)]);
    let ranker = FusionRanker::new(FixedLexical(vec![]), vector, FusionConfig::default()).unwrap();
    let ranked = ranker.rank(&Corpus::new(scenario()), "q", 2).await.unwrap();
    let ids: Vec<_> = ranked.iter().map(|r| r.fragment_id.as_str()).collect();
    assert_eq!(ids, vec!["F2", "F3"]);
    assert_eq!(ranked[0].content, "Our pricing starts at $5000 per year");
    assert_eq!(ranked[0].lexical_score, 0.0);
}

//! Weighted-sum fusion of the lexical and vector rankings.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use fragdex_core::config::FusionConfig;
use fragdex_core::corpus::Corpus;
use fragdex_core::error::{Error, Result};
use fragdex_core::traits::{LexicalSearcher, SemanticSearcher};
use fragdex_core::types::{FragmentId, RankedFragment, ScoreRecord, SearchHit};

/// Candidates requested from each index per requested result.
pub const OVERFETCH: usize = 2;

pub struct FusionRanker<L, V> {
    lexical: L,
    vector: V,
    semantic_weight: f32,
    keyword_weight: f32,
}

impl<L: LexicalSearcher, V: SemanticSearcher> FusionRanker<L, V> {
    /// Weights are scaled to sum to 1; both zero, negative or non-finite
    /// weights are rejected.
    pub fn new(lexical: L, vector: V, weights: FusionConfig) -> Result<Self> {
        let (semantic_weight, keyword_weight) = weights.normalized()?;
        Ok(Self { lexical, vector, semantic_weight, keyword_weight })
    }

    /// Normalized `(semantic, keyword)` weights.
    pub fn weights(&self) -> (f32, f32) { (self.semantic_weight, self.keyword_weight) }
    pub fn lexical(&self) -> &L { &self.lexical }
    pub fn vector(&self) -> &V { &self.vector }

    /// Fused scores for every candidate either index returned, best first,
    /// ties broken by fragment id. Not truncated.
    ///
    /// A signal whose weight is zero is not queried unless the only weighted
    /// signal fails; it then stands in with the full weight. A failing
    /// signal is logged and treated as empty. Only when both signals fail
    /// does this return [`Error::BothIndexesUnavailable`].
    pub async fn score(&self, query: &str, top_k: usize) -> Result<Vec<ScoreRecord>> {
        if top_k == 0 { return Ok(Vec::new()); }
        let fetch = top_k.saturating_mul(OVERFETCH);
        let (use_lexical, use_vector) = (self.keyword_weight > 0.0, self.semantic_weight > 0.0);
        let (lexical, vector) = tokio::join!(
            async { if use_lexical { Some(self.lexical.search(query, fetch)) } else { None } },
            async { if use_vector { Some(self.vector.search(query, fetch).await) } else { None } },
        );
        let (lexical_hits, lexical_err) = split_signal("lexical", lexical);
        let (mut vector_hits, vector_err) = split_signal("vector", vector);
        let (mut semantic_weight, mut keyword_weight) = (self.semantic_weight, self.keyword_weight);
        let lexical_hits = match (lexical_err, vector_err) {
            (Some(l), Some(v)) => return Err(Error::BothIndexesUnavailable { lexical: l, vector: v }),
            (Some(l), None) if !use_vector => {
                warn!("lexical signal unavailable, falling back to the vector index");
                vector_hits = self.vector.search(query, fetch).await.map_err(|e| Error::BothIndexesUnavailable { lexical: l, vector: e.to_string() })?;
                (semantic_weight, keyword_weight) = (1.0, 0.0);
                lexical_hits
            }
            (None, Some(v)) if !use_lexical => {
                warn!("vector signal unavailable, falling back to the lexical index");
                let hits = self.lexical.search(query, fetch).map_err(|e| Error::BothIndexesUnavailable { lexical: e.to_string(), vector: v })?;
                (semantic_weight, keyword_weight) = (0.0, 1.0);
                hits
            }
            _ => lexical_hits,
        };

        let mut merged: BTreeMap<FragmentId, (Option<f32>, Option<f32>)> = BTreeMap::new();
        for hit in lexical_hits {
            let entry = merged.entry(hit.id).or_default();
            entry.0 = Some(entry.0.map_or(hit.score, |s| s.max(hit.score)));
        }
        for hit in vector_hits {
            let entry = merged.entry(hit.id).or_default();
            entry.1 = Some(entry.1.map_or(hit.score, |s| s.max(hit.score)));
        }
        let mut records: Vec<ScoreRecord> = merged
            .into_iter()
            .map(|(fragment_id, (lexical_score, vector_score))| ScoreRecord {
                combined_score: semantic_weight * vector_score.unwrap_or(0.0) + keyword_weight * lexical_score.unwrap_or(0.0),
                fragment_id,
                lexical_score,
                vector_score,
            })
            .collect();
        records.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score).then_with(|| a.fragment_id.cmp(&b.fragment_id)));
        debug!(query, candidates = records.len(), "fused candidates");
        Ok(records)
    }

    /// The `top_k` best fragments of `corpus` for `query`, annotated with
    /// their combined and per-signal scores (absent signals report 0).
    /// Candidates unknown to `corpus` are skipped.
    pub async fn rank(&self, corpus: &Corpus, query: &str, top_k: usize) -> Result<Vec<RankedFragment>> {
        let records = self.score(query, top_k).await?;
        let ranked: Vec<RankedFragment> = records
            .into_iter()
            .filter_map(|r| match corpus.get(&r.fragment_id) {
                Some(f) => Some(RankedFragment {
                    content: f.content.clone(),
                    content_type: f.content_type.clone(),
                    metadata: f.metadata.clone(),
                    combined_score: r.combined_score,
                    lexical_score: r.lexical_score.unwrap_or(0.0),
                    vector_score: r.vector_score.unwrap_or(0.0),
                    fragment_id: r.fragment_id,
                }),
                None => { debug!(id = %r.fragment_id, "candidate not in corpus"); None }
            })
            .take(top_k)
            .collect();
        Ok(ranked)
    }
}

fn split_signal(signal: &str, result: Option<Result<Vec<SearchHit>>>) -> (Vec<SearchHit>, Option<String>) {
    match result {
        None => (Vec::new(), None),
        Some(Ok(hits)) => (hits, None),
        Some(Err(e)) => {
            warn!(signal, error = %e, "ranking signal unavailable, continuing without it");
            (Vec::new(), Some(e.to_string()))
        }
    }
}

use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use fragdex_core::chunker::{ChunkPolicies, Chunker};
use fragdex_core::config::Settings;
use fragdex_core::corpus::{Corpus, SharedCorpus};
use fragdex_core::error::{Error, Result};
use fragdex_core::traits::{Embedder, VectorStore};
use fragdex_core::types::{FragmentId, ParentRecord, RankedFragment};
use fragdex_text::LexicalIndex;
use fragdex_vector::{PopulateStats, VectorIndex};

use crate::fusion::FusionRanker;

/// Outcome of [`HybridEngine::index_records`].
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub records: usize,
    pub fragments: usize,
    /// Ids of records that produced no fragments.
    pub skipped: Vec<String>,
    pub vectors: Option<PopulateStats>,
    /// Set when vector population failed; lexical ranking still works.
    pub vector_error: Option<String>,
    /// Vectors dropped because their fragments left the corpus.
    pub vectors_pruned: usize,
}

/// Chunker, both indexes and the fusion ranker wired from [`Settings`].
pub struct HybridEngine<S> {
    policies: ChunkPolicies,
    lexical: Arc<LexicalIndex>,
    vector: Arc<VectorIndex<S>>,
    ranker: FusionRanker<Arc<LexicalIndex>, Arc<VectorIndex<S>>>,
    corpus: SharedCorpus,
    /// Held for reading by `rank`, for writing while a generation is swapped in.
    publish_gate: RwLock<()>,
    rebuild: Mutex<()>,
}

impl<S> HybridEngine<S>
where
    S: VectorStore + 'static,
{
    pub fn from_settings(settings: &Settings, embedder: Arc<dyn Embedder>, store: S) -> Result<Self> {
        Self::from_settings_in(settings, embedder, store, Path::new("."))
    }

    /// Relative index directories resolve against `base`.
    pub fn from_settings_in(settings: &Settings, embedder: Arc<dyn Embedder>, store: S, base: &Path) -> Result<Self> {
        settings.validate()?;
        if embedder.dim() != settings.embedding.dim {
            return Err(Error::InvalidConfig(format!("embedder {} has dim {}, embedding.dim is {}", embedder.embedder_id(), embedder.dim(), settings.embedding.dim)));
        }
        let policies = settings.chunking.policies()?;
        let lexical = Arc::new(LexicalIndex::from_config(settings.lexical.clone(), base));
        let vector = Arc::new(VectorIndex::new(embedder, store, &settings.embedding));
        let ranker = FusionRanker::new(Arc::clone(&lexical), Arc::clone(&vector), settings.fusion)?;
        Ok(Self { policies, lexical, vector, ranker, corpus: SharedCorpus::new(), publish_gate: RwLock::new(()), rebuild: Mutex::new(()) })
    }

    pub fn lexical(&self) -> &LexicalIndex { &self.lexical }
    pub fn vector(&self) -> &VectorIndex<S> { &self.vector }
    pub fn ranker(&self) -> &FusionRanker<Arc<LexicalIndex>, Arc<VectorIndex<S>>> { &self.ranker }
    pub fn corpus(&self) -> Arc<Corpus> { self.corpus.snapshot() }

    /// Chunk `records`, stage a lexical generation, embed into the vector
    /// store, then publish the lexical generation and the corpus together
    /// and drop vectors of fragments that are gone.
    ///
    /// Queries keep seeing the previous generation until the swap. Every
    /// call numbers records from zero, so re-indexing unchanged records
    /// reproduces the same fragment ids. A vector failure is reported in the
    /// returned [`IndexReport`] rather than failing the call.
    pub async fn index_records(&self, records: &[ParentRecord]) -> Result<IndexReport> {
        let _rebuild = self.rebuild.lock().await;
        let report = Chunker::new(self.policies.clone())?.chunk_records(records);
        let corpus = Corpus::new(report.fragments);
        let staged = self.lexical.stage(corpus.fragments())?;
        let (vectors, mut vector_error) = match self.vector.populate(corpus.fragments()).await {
            Ok(stats) => (Some(stats), None),
            Err(e) => {
                warn!(error = %e, "vector population failed, ranking will use the lexical signal only");
                (None, Some(e.to_string()))
            }
        };
        let fragments = corpus.len();
        let live: HashSet<FragmentId> = corpus.fragments().iter().map(|f| f.id.clone()).collect();
        {
            let _gate = self.publish_gate.write().await;
            self.lexical.publish(staged)?;
            self.corpus.publish(corpus);
        }
        let vectors_pruned = match self.vector.retain(&live).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "failed to prune stale vectors");
                if vector_error.is_none() { vector_error = Some(e.to_string()); }
                0
            }
        };
        info!(records = records.len(), fragments, skipped = report.skipped.len(), vectors_pruned, "corpus indexed");
        Ok(IndexReport { records: records.len(), fragments, skipped: report.skipped, vectors, vector_error, vectors_pruned })
    }

    pub async fn rank(&self, query: &str, top_k: usize) -> Result<Vec<RankedFragment>> {
        let _gate = self.publish_gate.read().await;
        let corpus = self.corpus.snapshot();
        self.ranker.rank(&corpus, query, top_k).await
    }
}

//! Embedding providers: a local BGE-M3 (XLM-RoBERTa) model run with candle
//! and a deterministic hashing embedder for tests and offline use.
use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use fragdex_core::config::{resolve_with_base, EmbeddingConfig, EmbeddingProviderKind};
use fragdex_core::error::{Error, Result};
use fragdex_core::traits::Embedder;

pub mod device;
pub mod hash;
pub mod pool;
pub mod tokenize;

pub use device::select_device;
pub use hash::HashEmbedder;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch_on_device;

const BGE_MAX_LEN: usize = 256;

pub struct BgeEmbedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    id: String,
}

impl BgeEmbedder {
    /// Load `tokenizer.json`, `config.json` and `pytorch_model.bin` from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self> {
        Self::load_inner(model_dir).map_err(|e| Error::EmbeddingProvider(format!("{e:#}")))
    }

    fn load_inner(model_dir: &Path) -> anyhow::Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading BGE-M3 model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path).with_context(|| format!("read {}", config_path.display()))?)?;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path).with_context(|| format!("read {}", weights_path.display()))?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        let dim = config.hidden_size;
        info!(dim, "BGE-M3 model loaded");
        Ok(Self { model, tokenizer, device, dim, id: format!("bge-m3:d{dim}") })
    }

    fn embed_inner(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch_on_device(&self.tokenizer, texts, self.max_len(), &self.device)?;
        let token_type_ids = Tensor::zeros(input_ids.dims(), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 * texts.len() as u128 { warn!(texts = texts.len(), ?elapsed, "slow embedding batch"); }
        else { debug!(texts = texts.len(), ?elapsed, "embedded batch"); }
        Ok(vectors)
    }
}

impl Embedder for BgeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { BGE_MAX_LEN }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_inner(texts).map_err(|e| Error::EmbeddingProvider(format!("{e:#}")))
    }
}

/// Build the configured provider. `FRAGDEX_USE_FAKE_EMBEDDINGS=1` forces the
/// hashing embedder regardless of `provider`.
pub fn embedder_from_settings(config: &EmbeddingConfig, base: &Path) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("FRAGDEX_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake || config.provider == EmbeddingProviderKind::Hash {
        info!(dim = config.dim, "using hashing embedder");
        return Ok(Arc::new(HashEmbedder::new(config.dim)?));
    }
    let model = BgeEmbedder::load(&resolve_model_dir(config.model_dir.as_deref(), base)?)?;
    if model.dim() != config.dim {
        return Err(Error::InvalidConfig(format!("embedding.dim is {} but the model produces {}", config.dim, model.dim())));
    }
    Ok(Arc::new(model))
}

/// `model_dir` from config, then `FRAGDEX_MODEL_DIR`, then `models/bge-m3`
/// under `base` or its parent.
pub fn resolve_model_dir(configured: Option<&str>, base: &Path) -> Result<PathBuf> {
    let candidates = configured
        .map(|d| resolve_with_base(base, d))
        .into_iter()
        .chain(std::env::var("FRAGDEX_MODEL_DIR").ok().map(|d| resolve_with_base(base, d)))
        .chain([base.join("models/bge-m3"), base.join("../models/bge-m3")]);
    for dir in candidates {
        if dir.exists() { debug!(dir = %dir.display(), "model directory"); return Ok(dir); }
    }
    Err(Error::NotFound("BGE-M3 model directory".into()))
}

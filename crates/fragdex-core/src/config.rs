use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::{ChunkPolicies, ChunkPolicy};
use crate::error::{Error, Result};
use crate::types::ContentType;

/// Layered configuration: `fragdex.toml`, then `fragdex.<env>.toml`, then
/// `FRAGDEX_*` environment variables (`__` separates nested keys).
pub struct Config {
    figment: Figment,
}

impl Config {
    /// Load from the current directory.
    pub fn load() -> Result<Self> { Self::load_in(Path::new(".")) }

    pub fn load_in(dir: &Path) -> Result<Self> {
        let env_name = env::var("FRAGDEX_ENV").unwrap_or_else(|_| "dev".to_string());
        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("fragdex.toml")))
            .merge(Toml::file(dir.join(format!("fragdex.{env_name}.toml"))))
            .merge(Env::prefixed("FRAGDEX_").split("__").ignore(&["env", "model_dir"]));
        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment.extract_inner(key).map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingSettings,
    pub lexical: LexicalConfig,
    pub fusion: FusionConfig,
    pub embedding: EmbeddingConfig,
    pub data: DataConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.policies()?;
        self.lexical.validate()?;
        self.fusion.normalized()?;
        if self.embedding.dim == 0 { return Err(Error::InvalidConfig("embedding.dim must be > 0".into())); }
        if self.embedding.batch_size == 0 { return Err(Error::InvalidConfig("embedding.batch_size must be > 0".into())); }
        Ok(())
    }
}

/// `default` replaces the built-in fallback; `overrides` replace or add
/// per-content-type policies on top of the built-in table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ChunkPolicy>,
    pub overrides: BTreeMap<ContentType, ChunkPolicy>,
}

impl ChunkingSettings {
    pub fn policies(&self) -> Result<ChunkPolicies> {
        let mut policies = ChunkPolicies::builtin();
        if let Some(default) = &self.default { policies = policies.with_default(default.clone()); }
        for (ct, policy) in &self.overrides { policies = policies.with_policy(ct.clone(), policy.clone()); }
        policies.validate()?;
        Ok(policies)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LexicalBackend {
    #[default]
    Memory,
    Tantivy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalConfig {
    pub k1: f32,
    pub b: f32,
    /// Only this many leading characters of a fragment's content are indexed.
    pub max_indexed_chars: usize,
    /// Calibration constant: normalized score is `min(raw / score_divisor, 1)`.
    /// An approximation, not a probability.
    pub score_divisor: f32,
    /// Metadata keys whose values are appended to the indexed text.
    pub boost_fields: Vec<String>,
    pub stop_words: bool,
    pub backend: LexicalBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_dir: Option<String>,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            max_indexed_chars: 1000,
            score_divisor: 10.0,
            boost_fields: ["category", "subcategory", "industry", "use_case"].map(String::from).to_vec(),
            stop_words: true,
            backend: LexicalBackend::Memory,
            index_dir: None,
        }
    }
}

impl LexicalConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.k1.is_finite() && self.k1 >= 0.0) { return Err(Error::InvalidConfig(format!("lexical.k1 must be >= 0, got {}", self.k1))); }
        if !(0.0..=1.0).contains(&self.b) { return Err(Error::InvalidConfig(format!("lexical.b must be in [0, 1], got {}", self.b))); }
        if !(self.score_divisor.is_finite() && self.score_divisor > 0.0) {
            return Err(Error::InvalidConfig(format!("lexical.score_divisor must be > 0, got {}", self.score_divisor)));
        }
        if self.max_indexed_chars == 0 { return Err(Error::InvalidConfig("lexical.max_indexed_chars must be > 0".into())); }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub semantic_weight: f32,
    pub keyword_weight: f32,
}

impl Default for FusionConfig {
    fn default() -> Self { Self { semantic_weight: 0.6, keyword_weight: 0.4 } }
}

impl FusionConfig {
    pub fn new(semantic_weight: f32, keyword_weight: f32) -> Self { Self { semantic_weight, keyword_weight } }

    /// `(semantic, keyword)` scaled to sum to 1.
    pub fn normalized(&self) -> Result<(f32, f32)> {
        let (s, k) = (self.semantic_weight, self.keyword_weight);
        let invalid = || Error::InvalidWeight { semantic: s, keyword: k };
        if !(s.is_finite() && k.is_finite()) || s < 0.0 || k < 0.0 { return Err(invalid()); }
        let sum = s + k;
        if sum <= 0.0 { return Err(invalid()); }
        Ok((s / sum, k / sum))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    Hash,
    Bge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub dim: usize,
    pub timeout_ms: u64,
    pub batch_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<String>,
    pub show_progress: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { provider: EmbeddingProviderKind::Hash, dim: 1024, timeout_ms: 5000, batch_size: 32, model_dir: None, show_progress: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lancedb_dir: Option<String>,
    pub table: String,
}

impl Default for DataConfig {
    fn default() -> Self { Self { lancedb_dir: None, table: "fragments".to_string() } }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::ContentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryStrategy {
    SemanticParagraph,
    Sentence,
    QaPair,
    MetricGroup,
}

/// Per-content-type chunking parameters. Sizes are in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPolicy {
    pub target_size: usize,
    #[serde(default)]
    pub overlap: usize,
    pub boundary_strategy: BoundaryStrategy,
    #[serde(default)]
    pub min_fragment_size: usize,
}

impl ChunkPolicy {
    pub fn new(boundary_strategy: BoundaryStrategy, target_size: usize, overlap: usize, min_fragment_size: usize) -> Self {
        Self { target_size, overlap, boundary_strategy, min_fragment_size }
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 { return Err(Error::InvalidConfig("chunk target_size must be > 0".into())); }
        if self.overlap >= self.target_size {
            return Err(Error::InvalidConfig(format!("chunk overlap ({}) must be < target_size ({})", self.overlap, self.target_size)));
        }
        if self.min_fragment_size > self.target_size {
            return Err(Error::InvalidConfig(format!("min_fragment_size ({}) must be <= target_size ({})", self.min_fragment_size, self.target_size)));
        }
        Ok(())
    }

    /// Overlap actually applied: pair- and group-preserving strategies never overlap.
    pub fn effective_overlap(&self) -> usize {
        match self.boundary_strategy {
            BoundaryStrategy::QaPair | BoundaryStrategy::MetricGroup => 0,
            BoundaryStrategy::SemanticParagraph | BoundaryStrategy::Sentence => self.overlap,
        }
    }
}

impl Default for ChunkPolicy {
    fn default() -> Self { Self::new(BoundaryStrategy::Sentence, 500, 50, 50) }
}

/// Policy registry keyed by content type with a default fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPolicies {
    default: ChunkPolicy,
    by_type: BTreeMap<ContentType, ChunkPolicy>,
}

impl ChunkPolicies {
    pub fn new(default: ChunkPolicy) -> Self { Self { default, by_type: BTreeMap::new() } }

    /// The built-in table: paragraphs for capabilities, pairs for FAQs,
    /// marker groups for metrics, sentences for comparisons.
    pub fn builtin() -> Self {
        let mut p = Self::new(ChunkPolicy::default());
        p.by_type.insert(ContentType::Capability, ChunkPolicy::new(BoundaryStrategy::SemanticParagraph, 500, 50, 80));
        p.by_type.insert(ContentType::Faq, ChunkPolicy::new(BoundaryStrategy::QaPair, 800, 0, 0));
        p.by_type.insert(ContentType::Metric, ChunkPolicy::new(BoundaryStrategy::MetricGroup, 400, 0, 40));
        p.by_type.insert(ContentType::Comparison, ChunkPolicy::new(BoundaryStrategy::Sentence, 600, 100, 60));
        p
    }

    #[must_use]
    pub fn with_policy(mut self, content_type: ContentType, policy: ChunkPolicy) -> Self {
        self.by_type.insert(content_type, policy);
        self
    }

    #[must_use]
    pub fn with_default(mut self, policy: ChunkPolicy) -> Self {
        self.default = policy;
        self
    }

    pub fn resolve(&self, content_type: &ContentType) -> &ChunkPolicy {
        self.by_type.get(content_type).unwrap_or(&self.default)
    }

    pub fn default_policy(&self) -> &ChunkPolicy { &self.default }

    pub fn validate(&self) -> Result<()> {
        self.default.validate()?;
        for (ct, policy) in &self.by_type {
            policy.validate().map_err(|e| Error::InvalidConfig(format!("policy for '{ct}': {e}")))?;
        }
        Ok(())
    }
}

impl Default for ChunkPolicies {
    fn default() -> Self { Self::builtin() }
}

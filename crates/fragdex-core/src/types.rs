//! Domain types shared by the chunker, both indexes and the ranker.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type FragmentId = String;
pub type Meta = BTreeMap<String, String>;

/// Semantic type of a parent record. Selects the chunk policy.
///
/// Unrecognized tags are preserved verbatim in `Other` and resolve to the
/// default policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentType {
    Capability,
    Faq,
    Metric,
    Comparison,
    Other(String),
}

impl ContentType {
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "capability" | "capabilities" => Self::Capability,
            "faq" | "faq_pair" | "qa" | "qa_pair" => Self::Faq,
            "metric" | "metrics" | "kpi" => Self::Metric,
            "comparison" | "comparisons" | "competitive" => Self::Comparison,
            _ => Self::Other(tag.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Capability => "capability",
            Self::Faq => "faq",
            Self::Metric => "metric",
            Self::Comparison => "comparison",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for ContentType {
    fn from(tag: String) -> Self { Self::parse(&tag) }
}

impl From<&str> for ContentType {
    fn from(tag: &str) -> Self { Self::parse(tag) }
}

impl From<ContentType> for String {
    fn from(ct: ContentType) -> Self { ct.as_str().to_string() }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// The recognized record fields, in text-assembly order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordField {
    Label,
    Description,
    Question,
    Answer,
    Category,
    Subcategory,
    Industry,
    UseCase,
}

impl RecordField {
    pub const ORDERED: [RecordField; 8] = [
        Self::Label,
        Self::Description,
        Self::Question,
        Self::Answer,
        Self::Category,
        Self::Subcategory,
        Self::Industry,
        Self::UseCase,
    ];

    /// Key used in the record's field map.
    pub fn key(self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Description => "description",
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::Industry => "industry",
            Self::UseCase => "use_case",
        }
    }

    /// Human label prefixed to the field's text in assembled content.
    pub fn title(self) -> &'static str {
        match self {
            Self::Label => "Label",
            Self::Description => "Description",
            Self::Question => "Question",
            Self::Answer => "Answer",
            Self::Category => "Category",
            Self::Subcategory => "Subcategory",
            Self::Industry => "Industry",
            Self::UseCase => "Use Case",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ORDERED.into_iter().find(|f| f.key() == key)
    }
}

/// A structured input item. Read-only to the core.
///
/// `fields` maps field keys (see [`RecordField::key`]) to text; keys outside
/// the recognized set are kept but never assembled into searchable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRecord {
    pub id: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maturity: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Meta,
}

impl ParentRecord {
    pub fn new(id: impl Into<String>, content_type: impl Into<ContentType>) -> Self {
        Self {
            id: id.into(),
            content_type: content_type.into(),
            fields: BTreeMap::new(),
            source_file: None,
            maturity: None,
            extra: Meta::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: RecordField, value: impl Into<String>) -> Self {
        self.fields.insert(field.key().to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    /// Trimmed value of a recognized field; `None` when absent or blank.
    pub fn field(&self, field: RecordField) -> Option<&str> {
        self.fields.get(field.key()).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    /// Provenance attributes copied onto every fragment of this record.
    pub fn metadata(&self) -> Meta {
        let mut meta = self.extra.clone();
        meta.insert("record_id".to_string(), self.id.clone());
        meta.insert("content_type".to_string(), self.content_type.to_string());
        if let Some(src) = &self.source_file { meta.insert("source_file".to_string(), src.clone()); }
        if let Some(maturity) = &self.maturity { meta.insert("maturity".to_string(), maturity.clone()); }
        for field in [RecordField::Category, RecordField::Subcategory, RecordField::Industry, RecordField::UseCase] {
            if let Some(v) = self.field(field) { meta.insert(field.key().to_string(), v.to_string()); }
        }
        meta
    }
}

/// The atomic retrievable unit.
///
/// - `id`: unique, stable for a given record sequence number + chunk position
/// - `content`: non-empty text bounded by the active chunk policy
/// - `chunk_index`/`total_chunks`: position within the parent record, `chunk_index < total_chunks`
/// - `metadata`: provenance copied from the parent record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: FragmentId,
    pub content: String,
    pub content_type: ContentType,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub metadata: Meta,
}

impl Fragment {
    /// Content followed by the values of `boost_fields` present in metadata.
    pub fn searchable_text(&self, boost_fields: &[String]) -> String {
        let mut text = self.content.clone();
        for key in boost_fields {
            if let Some(v) = self.metadata.get(key) {
                text.push('\n');
                text.push_str(v);
            }
        }
        text
    }
}

/// Indicates which signal produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Lexical,
    Vector,
}

/// The minimal surface returned by both indexes.
///
/// `id` matches `Fragment::id`. `score` is normalized to `[0, 1]`, higher is
/// better. `source` labels the origin index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: FragmentId,
    pub score: f32,
    pub source: SourceKind,
}

/// Transient per-query fusion record. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreRecord {
    pub fragment_id: FragmentId,
    pub lexical_score: Option<f32>,
    pub vector_score: Option<f32>,
    pub combined_score: f32,
}

/// A ranked result as handed to presentation layers.
///
/// Missing signals are reported as `0.0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedFragment {
    pub fragment_id: FragmentId,
    pub content: String,
    pub content_type: ContentType,
    pub metadata: Meta,
    pub combined_score: f32,
    pub lexical_score: f32,
    pub vector_score: f32,
}

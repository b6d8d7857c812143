use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The record yields no non-whitespace searchable text. Callers skip it.
    #[error("Record '{record_id}' has no searchable text")]
    EmptyContent { record_id: String },

    #[error("Cannot build a lexical index from zero fragments")]
    EmptyCorpus,

    #[error("Embedding provider failed: {0}")]
    EmbeddingProvider(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Invalid fusion weights (semantic={semantic}, keyword={keyword})")]
    InvalidWeight { semantic: f32, keyword: f32 },

    #[error("Both indexes unavailable (lexical: {lexical}; vector: {vector})")]
    BothIndexesUnavailable { lexical: String, vector: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self { Self::Operation(e.to_string()) }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self { Self::Operation(format!("json: {e}")) }
}

pub type Result<T> = std::result::Result<T, Error>;

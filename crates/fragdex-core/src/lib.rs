//! Core of the hybrid retrieval engine: data model, error taxonomy,
//! layered configuration, collaborator traits, record loading and the
//! content-aware chunker.
//!
//! Configuration uses Figment to merge `fragdex.toml` + `fragdex.<env>.toml`
//! + `FRAGDEX_*` env vars.

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod error;
pub mod records;
pub mod traits;
pub mod types;

pub use error::{Error, Result};

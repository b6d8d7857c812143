//! fragdex-hybrid
//!
//! Fuses the lexical and vector rankings into one list and wires the
//! chunker and both indexes into a single engine.
pub mod engine;
pub mod fusion;

pub use engine::{HybridEngine, IndexReport};
pub use fusion::{FusionRanker, OVERFETCH};

use std::path::Path;

use fragdex_core::config::{EmbeddingConfig, EmbeddingProviderKind};
use fragdex_core::traits::Embedder;
use fragdex_core::Error;
use fragdex_embed::{embedder_from_settings, resolve_model_dir, HashEmbedder};

#[test]
fn hash_embedder_shapes_and_determinism() {
    let embedder = embedder_from_settings(&EmbeddingConfig::default(), Path::new(".")).expect("embedder");
    assert_eq!(embedder.embedder_id(), "hash:d1024");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let (v1, v2) = (&embs[0], &embs[1]);

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn hash_embedder_ignores_case_and_edge_punctuation() {
    let e = HashEmbedder::new(64).unwrap();
    assert_eq!(e.embed("Pricing, Plans!").unwrap(), e.embed("pricing plans").unwrap());
}

#[test]
fn missing_model_dir_is_reported() {
    let tmp = tempfile::TempDir::new().unwrap();
    let err = resolve_model_dir(Some("no-such-model"), tmp.path());
    if std::env::var("FRAGDEX_MODEL_DIR").is_err() {
        assert!(matches!(err, Err(Error::NotFound(_))));
    }
    let config = EmbeddingConfig { provider: EmbeddingProviderKind::Bge, model_dir: Some(tmp.path().display().to_string()), ..EmbeddingConfig::default() };
    if std::env::var("FRAGDEX_USE_FAKE_EMBEDDINGS").is_err() {
        assert!(matches!(embedder_from_settings(&config, tmp.path()), Err(Error::EmbeddingProvider(_))));
    }
}

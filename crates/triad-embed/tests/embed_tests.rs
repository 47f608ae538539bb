use triad_core::config::{EmbedderKind, EmbeddingSettings};
use triad_embed::{load_embedder, EmbeddingProvider};

#[test]
fn hashing_embedder_shapes_and_determinism() {
    // Hashing embedder avoids loading the large model
    let settings = EmbeddingSettings { kind: EmbedderKind::Hashing, model_dir: None, dim: 1024 };
    let embedder = load_embedder(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string(), "Hello World".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input, case-insensitive tokens
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
    for (a, b) in v1.iter().zip(embs[2].iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[tokio::test]
async fn provider_from_settings_is_lazy() {
    let settings = EmbeddingSettings { kind: EmbedderKind::Hashing, model_dir: None, dim: 32 };
    let provider = EmbeddingProvider::from_settings(settings);
    assert!(!provider.is_loaded());
    let v = provider.embed("§ 58 EEG").await.expect("embed");
    assert_eq!(v.len(), 32);
    assert!(provider.is_loaded());
}

#[test]
fn missing_model_dir_fails_to_load() {
    let settings = EmbeddingSettings { kind: EmbedderKind::BgeM3, model_dir: Some("/nonexistent/bge-m3".to_string()), dim: 1024 };
    if std::env::var("APP_USE_FAKE_EMBEDDINGS").is_err() && std::env::var("APP_MODEL_DIR").is_err() && std::env::var("MODEL_DIR").is_err() && !std::path::Path::new("models/bge-m3").exists() {
        assert!(load_embedder(&settings).is_err());
    }
}

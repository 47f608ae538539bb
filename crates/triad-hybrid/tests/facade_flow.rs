use std::collections::BTreeSet;
use std::fs;
use tempfile::TempDir;

use triad_core::config::{AdapterChoice, EmbedderKind, EngineSettings};
use triad_core::{BackendKind, Error, Filters, SearchQuery};
use triad_embed::HashingEmbedder;
use triad_hybrid::{HybridRetriever, Route};

const CORPUS: &str = r#"{"id":"doc1","content":"Photovoltaik Anlagen erhalten eine Einspeisevergütung nach dem EEG","metadata":{"category":"/energy/solar"}}
{"id":"doc2","content":"Windenergie an Land wird über Ausschreibungen gefördert","metadata":{"category":"/energy/wind"}}
{"id":"doc3","content":"§ 58 EEG regelt die Degression der Vergütung","metadata":{"category":"/law/eeg"}}
"#;

const GRAPH: &str = r#"{
  "nodes": [
    {"id": "pv", "label": "Photovoltaik", "document_id": "doc1", "content": "Photovoltaik Anlagen", "metadata": {"category": "/energy/solar"}},
    {"id": "eeg", "label": "EEG", "document_id": "doc3", "content": "§ 58 EEG", "metadata": {"category": "/law/eeg"}}
  ],
  "edges": [{"source": "eeg", "target": "pv", "relation": "regulates"}]
}"#;

fn workspace() -> TempDir {
    let tmp = TempDir::new().expect("tmp");
    fs::create_dir_all(tmp.path().join("corpus")).expect("mkdir");
    fs::write(tmp.path().join("corpus/docs.jsonl"), CORPUS).expect("write corpus");
    fs::write(tmp.path().join("graph.json"), GRAPH).expect("write graph");
    tmp
}

fn settings() -> EngineSettings {
    let mut settings = EngineSettings::default();
    settings.embedding.kind = EmbedderKind::Hashing;
    settings.embedding.dim = 64;
    settings.corpus.path = Some("corpus".to_string());
    settings.vector.primary = AdapterChoice::Flat;
    settings.vector.fallback = AdapterChoice::None;
    settings.vector.embed_corpus = true;
    settings.graph.path = Some("graph.json".to_string());
    settings
}

#[tokio::test]
async fn hybrid_search_combines_all_three_backends() {
    let tmp = workspace();
    let retriever = HybridRetriever::from_config_in(&settings(), tmp.path()).expect("retriever");
    let results = retriever.hybrid_search(&SearchQuery::new("Photovoltaik EEG").with_top_k(3)).await.expect("search");

    assert!(!results.is_empty() && results.len() <= 3);
    let ids: BTreeSet<&str> = results.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ids.len(), results.len(), "document ids are unique");
    let doc1 = results.iter().find(|r| r.document_id == "doc1").expect("doc1");
    assert_eq!(doc1.sources, BackendKind::all());
    assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.score) && !r.sources.is_empty()));
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

    let status = retriever.backend_status();
    assert_eq!(status[&BackendKind::Vector].adapter.as_deref(), Some("flat"));
    assert_eq!(status[&BackendKind::Graph].adapter.as_deref(), Some("memory-graph"));
    assert_eq!(status[&BackendKind::Keyword].adapter.as_deref(), Some("lexical"));
}

#[tokio::test]
async fn single_backend_operations() {
    let tmp = workspace();
    let retriever = HybridRetriever::from_config_in(&settings(), tmp.path()).expect("retriever");

    let keyword = retriever.keyword_search("§ 58", 5, None).await.expect("keyword");
    assert_eq!(keyword[0].document_id, "doc3");
    let mut filters = Filters::new();
    filters.insert("category".to_string(), serde_json::json!("/energy"));
    assert!(retriever.keyword_search("§ 58", 5, Some(filters)).await.expect("keyword").is_empty());

    let graph = retriever.graph_search("Photovoltaik", 5).await.expect("graph");
    assert_eq!(graph[0].document_id, "doc1");
    assert_eq!(graph[1].document_id, "doc3");
    assert_eq!(graph[0].related_documents[0].document_id, "doc3");

    let embedding = HashingEmbedder::new(64).embed_text("Windenergie an Land wird über Ausschreibungen gefördert");
    let vector = retriever.vector_search(&embedding, 1, None).await.expect("vector");
    assert_eq!(vector.len(), 1);
    assert_eq!(vector[0].document_id, "doc2");
    assert!((vector[0].score - 1.0).abs() < 1e-5);

    assert!(matches!(retriever.graph_search("  ", 5).await, Err(Error::InvalidQuery(_))));
    assert!(matches!(retriever.keyword_search("EEG", 0, None).await, Err(Error::InvalidQuery(_))));
    assert!(matches!(retriever.vector_search(&[], 3, None).await, Err(Error::InvalidQuery(_))));
}

#[tokio::test]
async fn wrong_embedding_length_is_rejected_without_failover() {
    let tmp = workspace();
    let mut settings = settings();
    settings.vector.fallback = AdapterChoice::Simulated;
    let retriever = HybridRetriever::from_config_in(&settings, tmp.path()).expect("retriever");

    let short = vec![0.5f32; 32];
    assert!(matches!(retriever.vector_search(&short, 3, None).await, Err(Error::InvalidQuery(_))));
    assert_eq!(retriever.backend_status()[&BackendKind::Vector].route, Route::Primary);

    let embedding = HashingEmbedder::new(64).embed_text("Photovoltaik");
    let hits = retriever.vector_search(&embedding, 2, None).await.expect("vector");
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| !h.is_simulated()), "the flat index still serves");
}

#[tokio::test]
async fn lance_primary_without_uri_falls_back_to_flat() {
    let tmp = workspace();
    let mut settings = settings();
    settings.vector.primary = AdapterChoice::Lance;
    settings.vector.fallback = AdapterChoice::Flat;
    let retriever = HybridRetriever::from_config_in(&settings, tmp.path()).expect("retriever");
    let embedding = HashingEmbedder::new(64).embed_text("Photovoltaik");
    assert!(!retriever.vector_search(&embedding, 2, None).await.expect("vector").is_empty());
    assert_eq!(retriever.backend_status()[&BackendKind::Vector].route, Route::Fallback);

    retriever.reset();
    assert_eq!(retriever.backend_status()[&BackendKind::Vector].route, Route::Unprobed);
}

#[tokio::test]
async fn missing_graph_snapshot_excludes_graph_only() {
    let tmp = workspace();
    let mut settings = settings();
    settings.graph.path = Some("missing.json".to_string());
    let retriever = HybridRetriever::from_config_in(&settings, tmp.path()).expect("retriever");

    let results = retriever.hybrid_search(&SearchQuery::new("Photovoltaik")).await.expect("search");
    assert!(results.iter().all(|r| !r.sources.contains(&BackendKind::Graph)));
    assert_eq!(retriever.backend_status()[&BackendKind::Graph].route, Route::Excluded);
    assert!(matches!(
        retriever.graph_search("Photovoltaik", 3).await,
        Err(Error::AdapterUnavailable { backend: BackendKind::Graph, .. })
    ));
}

#[tokio::test]
async fn simulated_adapter_is_explicit_and_flagged() {
    let tmp = workspace();
    let mut settings = settings();
    settings.keyword.primary = AdapterChoice::Simulated;
    let retriever = HybridRetriever::from_config_in(&settings, tmp.path()).expect("retriever");
    let hits = retriever.keyword_search("Windenergie Land", 5, None).await.expect("keyword");
    assert_eq!(hits[0].document_id, "doc2");
    assert!(hits.iter().all(|h| h.is_simulated()));
}

#[test]
fn adapter_choice_must_fit_the_kind() {
    let tmp = workspace();
    let mut settings = settings();
    settings.graph.primary = AdapterChoice::Lexical;
    assert!(matches!(HybridRetriever::from_config_in(&settings, tmp.path()), Err(Error::InvalidConfig(_))));
}

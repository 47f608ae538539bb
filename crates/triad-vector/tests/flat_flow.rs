use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

use triad_core::{BackendAdapter, BackendKind, BackendRequest, Document, Embedder, Error, Filters};
use triad_embed::HashingEmbedder;
use triad_vector::{FlatVectorAdapter, FlatVectorIndex};

fn snapshot() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tmp");
    let lines = [
        r#"{"id":"doc1","content":"Photovoltaik Einspeiseverguetung","metadata":{"category":"/energy/solar"},"vector":[1.0,0.0,0.0]}"#,
        r#"{"id":"doc2","content":"Solarthermie","metadata":{"category":"/energy/heat"},"vector":[0.8,0.6,0.0]}"#,
        "",
        r#"{"id":"doc3","content":"Mietrecht","collection":"law","metadata":{"category":"/law"},"vector":[0.0,0.0,1.0]}"#,
    ];
    for line in lines {
        writeln!(file, "{line}").expect("write");
    }
    file
}

fn request(embedding: &[f32], top_k: usize) -> BackendRequest {
    BackendRequest { text: "Photovoltaik".to_string(), top_k, ..Default::default() }.with_embedding(Arc::from(embedding))
}

#[tokio::test]
async fn jsonl_snapshot_serves_ranked_results() {
    let file = snapshot();
    let adapter = FlatVectorAdapter::new(FlatVectorIndex::load_jsonl(file.path()).expect("load"));
    adapter.probe().await.expect("probe");
    assert_eq!(adapter.index().len(), 3);

    let hits = adapter.search(&request(&[1.0, 0.0, 0.0], 2)).await.expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].document_id, "doc1");
    assert_eq!(hits[1].document_id, "doc2");
    assert!((hits[1].score - 0.8).abs() < 1e-5);
    assert!(hits.iter().all(|h| h.sources.contains(&BackendKind::Vector)));
    assert_eq!(hits[0].metadata["category"], "/energy/solar");
}

#[tokio::test]
async fn collection_and_filters_restrict_candidates() {
    let file = snapshot();
    let adapter = FlatVectorAdapter::new(FlatVectorIndex::load_jsonl(file.path()).expect("load"));

    let mut req = request(&[1.0, 0.0, 0.0], 5);
    req.collection = Some("law".to_string());
    let hits = adapter.search(&req).await.expect("search");
    // untagged records pass the collection check; tagged ones must match
    assert!(hits.iter().any(|h| h.document_id == "doc3"));

    let mut filters = Filters::new();
    filters.insert("category".to_string(), serde_json::json!("/energy"));
    let mut req = request(&[1.0, 0.0, 0.0], 5);
    req.filters = Some(filters);
    let ids: Vec<String> = adapter.search(&req).await.expect("search").into_iter().map(|h| h.document_id).collect();
    assert_eq!(ids, vec!["doc1".to_string(), "doc2".to_string()]);
}

#[tokio::test]
async fn missing_or_misshapen_embedding_is_an_invalid_query() {
    let file = snapshot();
    let adapter = FlatVectorAdapter::new(FlatVectorIndex::load_jsonl(file.path()).expect("load"));
    let req = BackendRequest { text: "x".to_string(), top_k: 3, ..Default::default() };
    assert!(matches!(adapter.search(&req).await, Err(Error::InvalidQuery(_))));

    match adapter.search(&request(&[1.0, 0.0], 3)).await {
        Err(Error::InvalidQuery(msg)) => assert!(msg.contains("dimension 2") && msg.contains("expects 3"), "{msg}"),
        other => panic!("expected InvalidQuery, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_index_fails_probe() {
    let adapter = FlatVectorAdapter::new(FlatVectorIndex::from_records(vec![]).expect("index"));
    assert!(adapter.probe().await.is_err());
}

#[tokio::test]
async fn corpus_embedded_with_hashing_embedder_finds_itself() {
    let embedder = HashingEmbedder::new(128);
    let docs = vec![
        Document::new("pv", "Photovoltaik Anlage Dach"),
        Document::new("wind", "Windenergie Ausschreibung Land"),
    ];
    let adapter = FlatVectorAdapter::new(FlatVectorIndex::from_documents(&docs, &embedder).expect("embed"));
    let query = embedder.embed_batch(&["Photovoltaik Anlage Dach".to_string()]).expect("embed").remove(0);
    let hits = adapter.search(&request(&query, 1)).await.expect("search");
    assert_eq!(hits[0].document_id, "pv");
    assert!((hits[0].score - 1.0).abs() < 1e-5);
}

#[test]
fn malformed_snapshot_line_reports_position() {
    let mut file = NamedTempFile::new().expect("tmp");
    writeln!(file, "{{\"id\":\"a\",\"vector\":[1.0]}}\nnot json").expect("write");
    let err = FlatVectorIndex::load_jsonl(file.path()).err().expect("error");
    assert!(format!("{err:#}").contains(":2:"));
}

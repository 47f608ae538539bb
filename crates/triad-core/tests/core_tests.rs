use std::fs;
use std::io::Write;
use tempfile::TempDir;

use triad_core::data_processor::{ChunkingConfig, DataProcessor};
use triad_core::{BackendKind, Error, FusionWeights, SearchQuery, SearchResult, SIMULATED_FLAG};

#[test]
fn process_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let processor = DataProcessor::new();
    let docs = processor.process_directory(dir).expect("process");

    assert_eq!(docs.len(), 1, "one small paragraph becomes one document");
    assert_eq!(docs[0].content.trim(), "Short text");
    assert_eq!(docs[0].id, "a:0");
    assert_eq!(docs[0].metadata["category"], "/misc");
}

#[test]
fn process_directory_limited_two_files_limit_one() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("b.txt"), "charlie delta").unwrap();

    let processor = DataProcessor::new();
    let docs = processor.process_directory_limited(dir, 1).expect("process limited");

    // Only chunks from one source file should be present
    let mut doc_ids = std::collections::HashSet::new();
    for d in &docs { doc_ids.insert(d.metadata["doc_id"].clone()); }
    assert_eq!(doc_ids.len(), 1, "limited to one source document");
}

#[test]
fn jsonl_documents_and_nested_categories() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("energy/solar")).unwrap();
    fs::write(dir.join("energy/solar/pv.txt"), "Photovoltaik\n\nEinspeisung nach § 58 EEG").unwrap();
    fs::write(
        dir.join("records.jsonl"),
        "{\"id\":\"law-1\",\"content\":\"§ 58 EEG\",\"metadata\":{\"category\":\"/law\"}}\n\n",
    )
    .unwrap();

    let docs = DataProcessor::new().process_directory(dir).expect("process");
    assert_eq!(docs.len(), 3);
    let pv: Vec<_> = docs.iter().filter(|d| d.metadata.get("doc_id").is_some_and(|v| v == "pv")).collect();
    assert_eq!(pv.len(), 2);
    assert_eq!(pv[1].metadata["category"], "/energy/solar");
    assert_eq!(pv[1].metadata["total_chunks"], 2);
    assert_eq!(pv[1].metadata["title"], "Photovoltaik");
    assert!(docs.iter().any(|d| d.id == "law-1"));
}

#[test]
fn long_paragraphs_are_split_with_overlap() {
    let tmp = TempDir::new().unwrap();
    let words: Vec<String> = (0..40).map(|i| format!("w{i}")).collect();
    fs::write(tmp.path().join("long.txt"), words.join(" ")).unwrap();
    let processor = DataProcessor::with_chunking(ChunkingConfig { max_tokens: 20, overlap_percent: 0.2 });
    let docs = processor.process_directory(tmp.path()).expect("process");
    assert!(docs.len() > 1);
    assert!(docs[1].content.starts_with("w12"), "second chunk overlaps the first: {}", docs[1].content);
}

#[test]
fn query_validation_rejects_malformed_queries() {
    assert!(SearchQuery::new("solar").validate().is_ok());
    assert!(matches!(SearchQuery::new("solar").with_top_k(0).validate(), Err(Error::InvalidQuery(_))));
    assert!(matches!(SearchQuery::new("   ").validate(), Err(Error::InvalidQuery(_))));
    assert!(matches!(SearchQuery::new("solar").with_backends([]).validate(), Err(Error::InvalidQuery(_))));
    assert!(matches!(SearchQuery::new("solar").with_backend_names(&["vector", "sql"]), Err(Error::InvalidQuery(_))));
    let bad = FusionWeights::new().with(BackendKind::Vector, f32::NAN);
    assert!(SearchQuery::new("solar").with_weights(bad).validate().is_err());
}

#[test]
fn query_deserializes_with_defaults() {
    let q: SearchQuery = serde_json::from_str(r#"{"text":"Photovoltaik","weights":{"vector":1.0,"graph":1.0}}"#).unwrap();
    assert_eq!(q.top_k, 10);
    assert_eq!(q.backends, BackendKind::all());
    assert_eq!(q.weights.unwrap().get(BackendKind::Graph), 1.0);
}

#[test]
fn simulated_flag_marks_stand_in_results() {
    let real = SearchResult::new("doc1", "Photovoltaik", 0.5);
    assert!(!real.is_simulated());
    let stand_in = real.clone().with_meta(SIMULATED_FLAG, true);
    assert!(stand_in.is_simulated());
    assert!(!real.with_meta(SIMULATED_FLAG, "yes").is_simulated(), "only a boolean true counts");
}

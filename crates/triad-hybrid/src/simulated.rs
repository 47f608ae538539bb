use async_trait::async_trait;
use serde_json::Value;

use triad_core::filter;
use triad_core::{BackendAdapter, BackendKind, BackendRequest, Document, Result, SearchResult, SIMULATED_FLAG};

use crate::fusion::sort_results;

/// Demo stand-in for any backend kind, scoring documents by the share of
/// query words their content contains. Only ever built when configuration
/// asks for it, and every result carries `simulated = true`.
pub struct SimulatedAdapter {
    kind: BackendKind,
    documents: Vec<Document>,
}

impl SimulatedAdapter {
    pub fn new(kind: BackendKind, documents: Vec<Document>) -> Self {
        Self { kind, documents }
    }
}

#[async_trait]
impl BackendAdapter for SimulatedAdapter {
    fn kind(&self) -> BackendKind { self.kind }

    fn name(&self) -> &str { "simulated" }

    async fn probe(&self) -> Result<()> { Ok(()) }

    async fn search(&self, request: &BackendRequest) -> Result<Vec<SearchResult>> {
        let query_lower = request.text.to_lowercase();
        let query_words: Vec<&str> = query_lower.split_whitespace().collect();
        if query_words.is_empty() { return Ok(vec![]); }
        let mut hits: Vec<SearchResult> = self
            .documents
            .iter()
            .filter(|d| filter::in_collection(request.collection.as_deref(), &d.metadata))
            .filter(|d| filter::matches_opt(request.filters.as_ref(), &d.metadata))
            .filter_map(|d| {
                let content_lower = d.content.to_lowercase();
                let matched = query_words.iter().filter(|w| content_lower.contains(*w)).count();
                if matched == 0 { return None; }
                let score = matched as f32 / query_words.len() as f32;
                Some(SearchResult::from_document(d, score, self.kind).with_meta(SIMULATED_FLAG, Value::Bool(true)))
            })
            .collect();
        sort_results(&mut hits);
        hits.truncate(request.top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_result_is_flagged() {
        let adapter = SimulatedAdapter::new(
            BackendKind::Graph,
            vec![Document::new("a", "Photovoltaik und Speicher"), Document::new("b", "Speicher"), Document::new("c", "Wind")],
        );
        let request = BackendRequest { text: "Photovoltaik Speicher".to_string(), top_k: 5, ..Default::default() };
        let hits = adapter.search(&request).await.expect("search");
        let ids: Vec<&str> = hits.iter().map(|h| h.document_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(hits[1].score, 0.5);
        assert!(hits.iter().all(|h| h.is_simulated() && h.sources.contains(&BackendKind::Graph)));
    }
}

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use triad_core::config::GraphSettings;
use triad_core::filter;
use triad_core::{BackendAdapter, BackendKind, BackendRequest, DocumentRef, Error, Result, SearchResult};

use crate::store::{relation_weight, GraphStore, Reach};

/// Graph backend: entity lookup plus bounded traversal over a [`GraphStore`].
pub struct GraphAdapter {
    store: Arc<GraphStore>,
    max_hops: usize,
    relation_weights: BTreeMap<String, f32>,
}

impl GraphAdapter {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store, max_hops: 2, relation_weights: BTreeMap::new() }
    }

    pub fn from_settings(store: Arc<GraphStore>, settings: &GraphSettings) -> Self {
        Self::new(store).with_max_hops(settings.max_hops).with_relation_weights(settings.relation_weights.clone())
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn with_relation_weights(mut self, relation_weights: BTreeMap<String, f32>) -> Self {
        self.relation_weights = relation_weights;
        self
    }

    fn related(&self, reach: &Reach, own_document: &str) -> Vec<DocumentRef> {
        let mut refs: Vec<DocumentRef> = Vec::new();
        for (neighbor, edge) in self.store.incident(reach.node) {
            let Some(node) = self.store.node(neighbor) else { continue };
            let Some(doc) = node.document_id.as_deref() else { continue };
            if doc == own_document || refs.iter().any(|r| r.document_id == doc) { continue; }
            refs.push(DocumentRef { document_id: doc.to_string(), relation: edge.relation.clone(), title: Some(node.label.clone()) });
        }
        refs
    }
}

#[async_trait]
impl BackendAdapter for GraphAdapter {
    fn kind(&self) -> BackendKind { BackendKind::Graph }

    fn name(&self) -> &str { "memory-graph" }

    async fn probe(&self) -> Result<()> {
        if self.store.node_count() == 0 {
            return Err(Error::unavailable(BackendKind::Graph, "graph store is empty"));
        }
        Ok(())
    }

    async fn search(&self, request: &BackendRequest) -> Result<Vec<SearchResult>> {
        let start = Instant::now();
        let seeds = self.store.extract_entities(&request.text);
        if seeds.is_empty() || request.top_k == 0 {
            debug!("no graph entities in query");
            return Ok(vec![]);
        }
        let reached = self.store.traverse(&seeds, self.max_hops, |e| relation_weight(&self.relation_weights, e));

        // several nodes may stand for one document; keep the best path
        let mut by_document: HashMap<&str, SearchResult> = HashMap::new();
        for reach in &reached {
            let Some(node) = self.store.node(reach.node) else { continue };
            let Some(doc) = node.document_id.as_deref() else { continue };
            if !filter::in_collection(request.collection.as_deref(), &node.metadata)
                || !filter::matches_opt(request.filters.as_ref(), &node.metadata)
            {
                continue;
            }
            let score = reach.score();
            if by_document.get(doc).is_some_and(|existing| existing.score >= score) { continue; }
            let mut result = SearchResult::new(doc, node.content.clone(), score).with_source(BackendKind::Graph);
            result.metadata = node.metadata.clone();
            result.related_documents = self.related(reach, doc);
            by_document.insert(doc, result);
        }
        let mut results: Vec<SearchResult> = by_document.into_values().collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.document_id.cmp(&b.document_id)));
        results.truncate(request.top_k);
        debug!(seeds = seeds.len(), hits = results.len(), elapsed_us = start.elapsed().as_micros() as u64, "graph search");
        Ok(results)
    }
}

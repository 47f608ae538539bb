use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use triad_core::config::EngineSettings;
use triad_core::{BackendKind, BackendRequest, Error, Filters, Result, SearchQuery, SearchResult};
use triad_embed::EmbeddingProvider;

use crate::engine::FusionEngine;
use crate::factory;
use crate::registry::{AdapterRegistry, BackendStatus};

/// Entry point for callers: single-backend lookups and hybrid search.
///
/// Single-backend calls return the backend's error rather than an empty list
/// when it cannot answer.
pub struct HybridRetriever {
    engine: FusionEngine,
}

impl HybridRetriever {
    pub fn new(engine: FusionEngine) -> Self {
        Self { engine }
    }

    pub fn with_parts(registry: AdapterRegistry, embeddings: EmbeddingProvider, settings: &EngineSettings) -> Self {
        Self::new(FusionEngine::new(Arc::new(registry), Arc::new(embeddings), settings))
    }

    /// Builds every configured adapter; relative paths resolve against the
    /// working directory. Backend data is loaded here, models lazily.
    pub fn from_config(settings: &EngineSettings) -> Result<Self> {
        let base = std::env::current_dir().map_err(|e| Error::InvalidConfig(format!("no working directory: {e}")))?;
        Self::from_config_in(settings, &base)
    }

    pub fn from_config_in(settings: &EngineSettings, base_dir: &Path) -> Result<Self> {
        let parts = factory::build(settings, base_dir)?;
        Ok(Self::with_parts(parts.registry, parts.embeddings, settings))
    }

    pub fn engine(&self) -> &FusionEngine {
        &self.engine
    }

    pub async fn vector_search(&self, embedding: &[f32], top_k: usize, collection: Option<&str>) -> Result<Vec<SearchResult>> {
        if embedding.is_empty() {
            return Err(Error::InvalidQuery("embedding is empty".to_string()));
        }
        let request = BackendRequest {
            top_k,
            collection: collection.map(str::to_string),
            ..Default::default()
        }
        .with_embedding(Arc::from(embedding));
        self.engine.search_one(BackendKind::Vector, request).await
    }

    pub async fn graph_search(&self, text: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let request = BackendRequest { text: non_empty(text)?, top_k, ..Default::default() };
        self.engine.search_one(BackendKind::Graph, request).await
    }

    pub async fn keyword_search(&self, text: &str, top_k: usize, filters: Option<Filters>) -> Result<Vec<SearchResult>> {
        let request = BackendRequest { text: non_empty(text)?, top_k, filters, ..Default::default() };
        self.engine.search_one(BackendKind::Keyword, request).await
    }

    pub async fn hybrid_search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        self.engine.search(query).await
    }

    /// Drops probe results so the next call re-probes every backend.
    pub fn reset(&self) {
        self.engine.registry().reset();
    }

    pub fn backend_status(&self) -> BTreeMap<BackendKind, BackendStatus> {
        self.engine.registry().status()
    }
}

fn non_empty(text: &str) -> Result<String> {
    if text.trim().is_empty() {
        return Err(Error::InvalidQuery("query text is empty".to_string()));
    }
    Ok(text.to_string())
}

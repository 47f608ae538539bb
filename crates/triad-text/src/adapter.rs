use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use triad_core::filter;
use triad_core::{BackendAdapter, BackendKind, BackendRequest, Error, Result, SearchResult};

use crate::index::LexicalIndex;

/// Keyword backend: filtered lookup over the in-memory lexical index.
///
/// Readers clone the current `Arc<LexicalIndex>` and search it without
/// holding the lock; a rebuilt index is swapped in atomically.
pub struct KeywordAdapter {
    index: RwLock<Arc<LexicalIndex>>,
    candidate_pool: usize,
}

impl KeywordAdapter {
    pub fn new(index: LexicalIndex) -> Self {
        Self { index: RwLock::new(Arc::new(index)), candidate_pool: 50 }
    }

    pub fn with_candidate_pool(mut self, candidate_pool: usize) -> Self {
        self.candidate_pool = candidate_pool;
        self
    }

    pub fn index(&self) -> Arc<LexicalIndex> {
        Arc::clone(&self.index.read())
    }

    /// Replaces the served index, returning the previous one.
    pub fn swap_index(&self, index: LexicalIndex) -> Arc<LexicalIndex> {
        std::mem::replace(&mut *self.index.write(), Arc::new(index))
    }

    fn fetch_size(&self, request: &BackendRequest) -> usize {
        if request.filters.is_some() || request.collection.is_some() {
            (request.top_k * 4).max(self.candidate_pool)
        } else {
            request.top_k
        }
    }
}

#[async_trait]
impl BackendAdapter for KeywordAdapter {
    fn kind(&self) -> BackendKind { BackendKind::Keyword }

    fn name(&self) -> &str { "lexical" }

    async fn probe(&self) -> Result<()> { Ok(()) }

    async fn search(&self, request: &BackendRequest) -> Result<Vec<SearchResult>> {
        let start = Instant::now();
        let index = self.index();
        let hits = index
            .search(&request.text, self.fetch_size(request))
            .map_err(|e| {
                warn!(error = %format!("{e:#}"), "lexical search failed");
                Error::unavailable(BackendKind::Keyword, "lexical search failed")
            })?;
        let hits: Vec<SearchResult> = hits
            .into_iter()
            .filter(|h| filter::in_collection(request.collection.as_deref(), &h.metadata))
            .filter(|h| filter::matches_opt(request.filters.as_ref(), &h.metadata))
            .take(request.top_k)
            .collect();
        debug!(hits = hits.len(), elapsed_us = start.elapsed().as_micros() as u64, "lexical search");
        Ok(hits)
    }
}

//! Concurrent fan-out over the registry and fusion of the answers.
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use triad_core::config::{EngineSettings, FusionSettings, TimeoutSettings};
use triad_core::{BackendKind, BackendRequest, Error, FusionWeights, Result, SearchQuery, SearchResult};
use triad_embed::EmbeddingProvider;

use crate::fusion::{fuse, BackendHits};
use crate::registry::AdapterRegistry;

pub struct FusionEngine {
    registry: Arc<AdapterRegistry>,
    embeddings: Arc<EmbeddingProvider>,
    fusion: FusionSettings,
    timeouts: TimeoutSettings,
}

impl FusionEngine {
    pub fn new(registry: Arc<AdapterRegistry>, embeddings: Arc<EmbeddingProvider>, settings: &EngineSettings) -> Self {
        Self { registry, embeddings, fusion: settings.fusion.clone(), timeouts: settings.timeouts.clone() }
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> { &self.registry }

    pub fn embeddings(&self) -> &Arc<EmbeddingProvider> { &self.embeddings }

    pub fn timeouts(&self) -> &TimeoutSettings { &self.timeouts }

    /// Query weights, or the configured default, normalized over the
    /// requested backends.
    pub fn resolve_weights(&self, query: &SearchQuery) -> Result<FusionWeights> {
        let weights = query.weights.clone().unwrap_or_else(|| self.fusion.default_weights());
        weights.normalized_over(&query.backends)
    }

    /// Fans `query` out to the requested backends and fuses the answers.
    ///
    /// The whole request, first-use probing included, is bounded by the
    /// outer deadline. Backends still running when their share of it runs
    /// out are dropped from the fusion.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        let start = Instant::now();
        query.validate()?;
        let weights = self.resolve_weights(query)?;
        let weighted: Vec<BackendKind> = query.backends.iter().copied().filter(|k| weights.get(*k) > 0.0).collect();
        let deadline = self.timeouts.request_deadline(&weighted);
        let expired = || Error::RequestTimeout { elapsed_ms: start.elapsed().as_millis() as u64 };

        tokio::time::timeout(deadline, self.registry.ensure_probed()).await.map_err(|_| expired())?;

        let (kinds, excluded): (Vec<BackendKind>, Vec<BackendKind>) = weighted.iter().partition(|k| self.registry.is_available(**k));
        if !excluded.is_empty() {
            debug!(?excluded, "skipping excluded backends");
        }
        if kinds.is_empty() {
            return Err(Error::AllBackendsUnavailable { failed: weighted });
        }

        let overhead = Duration::from_millis(self.timeouts.fusion_overhead_ms);
        let remaining = deadline.saturating_sub(start.elapsed());
        let backend_window = remaining.saturating_sub(overhead);
        let candidates = query.top_k.saturating_mul(self.fusion.candidate_multiplier);
        let tasks = kinds.iter().map(|&kind| {
            let registry = Arc::clone(&self.registry);
            let embeddings = Arc::clone(&self.embeddings);
            let request = BackendRequest::from_query(query, candidates);
            let budget = self.timeouts.for_kind(kind).min(backend_window);
            tokio::spawn(async move { call_backend(kind, registry, embeddings, request, budget).await })
        });

        let joined = tokio::time::timeout(remaining, join_all(tasks)).await.map_err(|_| expired())?;

        let mut lists = Vec::with_capacity(kinds.len());
        let mut failed = excluded;
        for (kind, outcome) in kinds.iter().copied().zip(joined) {
            match outcome {
                Ok(Ok(results)) => lists.push(BackendHits::new(kind, results)),
                Ok(Err(e)) if e.is_backend_failure() => {
                    warn!(backend = %kind, error = %e, "backend failed; fusing without it");
                    failed.push(kind);
                }
                Ok(Err(e)) => {
                    warn!(backend = %kind, error = %e, "backend rejected the request; fusing without it");
                    failed.push(kind);
                }
                Err(e) => {
                    warn!(backend = %kind, error = %e, "backend task aborted");
                    failed.push(kind);
                }
            }
        }
        if lists.is_empty() {
            failed.sort();
            return Err(Error::AllBackendsUnavailable { failed });
        }

        let fused = fuse(lists, &weights, self.fusion.strategy, self.fusion.rrf_k, query.top_k);
        info!(
            results = fused.len(),
            failed = failed.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "hybrid search"
        );
        Ok(fused)
    }

    /// One backend through the registry, bounded by that kind's timeout.
    pub async fn search_one(&self, kind: BackendKind, request: BackendRequest) -> Result<Vec<SearchResult>> {
        if request.top_k == 0 {
            return Err(Error::InvalidQuery("top_k must be positive".to_string()));
        }
        let top_k = request.top_k;
        let budget = self.timeouts.for_kind(kind);
        let mut results = call_backend(kind, Arc::clone(&self.registry), Arc::clone(&self.embeddings), request, budget).await?;
        crate::fusion::sort_results(&mut results);
        results.truncate(top_k);
        Ok(results)
    }
}

/// The vector path embeds the query first; the budget covers both steps.
async fn call_backend(
    kind: BackendKind,
    registry: Arc<AdapterRegistry>,
    embeddings: Arc<EmbeddingProvider>,
    request: BackendRequest,
    budget: Duration,
) -> Result<Vec<SearchResult>> {
    let start = Instant::now();
    let work = async {
        let request = if kind == BackendKind::Vector && request.embedding.is_none() {
            let vector = embeddings.embed(&request.text).await?;
            request.with_embedding(Arc::from(vector))
        } else {
            request
        };
        registry.search(kind, &request).await
    };
    let outcome = tokio::time::timeout(budget, work)
        .await
        .map_err(|_| Error::AdapterTimeout { backend: kind, elapsed_ms: budget.as_millis() as u64 })?;
    if let Ok(results) = &outcome {
        debug!(backend = %kind, hits = results.len(), elapsed_ms = start.elapsed().as_millis() as u64, "backend answered");
    }
    outcome
}

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use triad_core::config::EngineSettings;
use triad_core::{BackendAdapter, BackendKind, BackendRequest, Error, Result, SearchResult};
use triad_embed::{EmbeddingProvider, HashingEmbedder};
use triad_hybrid::{AdapterRegistry, FusionEngine};

/// Scripted adapter: fixed results, optional delay, switchable failures.
pub struct StubAdapter {
    kind: BackendKind,
    name: String,
    results: Vec<SearchResult>,
    delay: Duration,
    probe_delay: Duration,
    pub reachable: AtomicBool,
    pub failing: AtomicBool,
    pub probes: AtomicUsize,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<BackendRequest>>,
}

impl StubAdapter {
    pub fn new(kind: BackendKind, name: &str, hits: &[(&str, f32)]) -> Self {
        let results = hits.iter().map(|(id, score)| SearchResult::new(*id, format!("{id} content"), *score).with_source(kind)).collect();
        Self {
            kind,
            name: name.to_string(),
            results,
            delay: Duration::ZERO,
            probe_delay: Duration::from_millis(5),
            reachable: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            probes: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn slow_probe(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn unreachable(self) -> Self {
        self.reachable.store(false, Ordering::SeqCst);
        self
    }

    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendAdapter for StubAdapter {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<()> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.probe_delay).await;
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::unavailable(self.kind, "connection refused"))
        }
    }

    async fn search(&self, request: &BackendRequest) -> Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::unavailable(self.kind, "connection reset"));
        }
        Ok(self.results.iter().take(request.top_k).cloned().collect())
    }
}

pub fn settings() -> EngineSettings {
    EngineSettings::default()
}

pub fn embeddings() -> Arc<EmbeddingProvider> {
    Arc::new(EmbeddingProvider::preloaded(Arc::new(HashingEmbedder::new(16))))
}

pub fn registry(adapters: Vec<Arc<StubAdapter>>) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new(Duration::from_millis(200));
    for adapter in adapters {
        registry = registry.with_backend(adapter.kind(), Some(adapter as Arc<dyn BackendAdapter>), None);
    }
    registry
}

pub fn engine(adapters: Vec<Arc<StubAdapter>>, settings: &EngineSettings) -> FusionEngine {
    FusionEngine::new(Arc::new(registry(adapters)), embeddings(), settings)
}

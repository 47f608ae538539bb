//! Lazily initialized, shared query embedder.
//!
//! The model is loaded on the first `embed` call, never at construction, and
//! exactly once even when many requests arrive together. Loading and
//! inference run on tokio's blocking pool. The load itself runs in a detached
//! task, so a caller that gives up (request timeout) does not abandon it.
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use triad_core::config::EmbeddingSettings;
use triad_core::{Embedder, Error, Result};

use crate::load_embedder;

type Loader = dyn Fn() -> anyhow::Result<Box<dyn Embedder>> + Send + Sync;

pub struct EmbeddingProvider {
    loader: Arc<Loader>,
    embedder: Arc<OnceCell<Arc<dyn Embedder>>>,
}

impl EmbeddingProvider {
    pub fn from_settings(settings: EmbeddingSettings) -> Self {
        Self::with_loader(move || load_embedder(&settings))
    }

    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn Embedder>> + Send + Sync + 'static,
    {
        Self { loader: Arc::new(loader), embedder: Arc::new(OnceCell::new()) }
    }

    /// A provider around an embedder that is already in memory.
    pub fn preloaded(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            loader: Arc::new(|| Err(anyhow::anyhow!("preloaded provider has no loader"))),
            embedder: Arc::new(OnceCell::new_with(Some(embedder))),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.embedder.initialized()
    }

    /// Returns the shared embedder, loading it on first use.
    pub async fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        if let Some(embedder) = self.embedder.get() {
            return Ok(Arc::clone(embedder));
        }
        let cell = Arc::clone(&self.embedder);
        let loader = Arc::clone(&self.loader);
        let load = tokio::spawn(async move {
            cell.get_or_try_init(|| async move {
                let loaded = tokio::task::spawn_blocking(move || loader())
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "model load task failed");
                        Error::EmbeddingFailure("model load task failed".to_string())
                    })?
                    .map_err(|e| {
                        warn!(error = %format!("{e:#}"), "model load failed");
                        Error::EmbeddingFailure("model load failed".to_string())
                    })?;
                info!(dim = loaded.dim(), "embedder ready");
                Ok::<_, Error>(Arc::from(loaded))
            })
            .await
            .cloned()
        });
        load.await.map_err(|e| {
            warn!(error = %e, "model load task aborted");
            Error::EmbeddingFailure("model load task aborted".to_string())
        })?
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = self.embedder().await?;
        let text = text.to_string();
        let mut vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&[text]))
            .await
            .map_err(|e| {
                warn!(error = %e, "embedding task failed");
                Error::EmbeddingFailure("embedding task failed".to_string())
            })?
            .map_err(|e| {
                warn!(error = %format!("{e:#}"), "query embedding failed");
                Error::EmbeddingFailure("query embedding failed".to_string())
            })?;
        match vectors.pop() {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(Error::EmbeddingFailure("embedder returned no vector".to_string())),
        }
    }
}

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{BackendKind, BackendRequest, SearchResult};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// One backend kind behind a uniform search surface.
///
/// Implementations translate a [`BackendRequest`] into their native call,
/// normalize scores into `[0, 1]` and return an error, never stand-in data,
/// when the backend cannot answer.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;
    /// Implementation label used in logs, e.g. `lance` or `flat`.
    fn name(&self) -> &str;
    /// Lightweight reachability check.
    async fn probe(&self) -> Result<()>;
    async fn search(&self, request: &BackendRequest) -> Result<Vec<SearchResult>>;
}

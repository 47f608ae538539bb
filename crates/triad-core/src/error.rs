use thiserror::Error;

use crate::types::BackendKind;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("{backend} backend unavailable: {reason}")]
    AdapterUnavailable { backend: BackendKind, reason: String },

    #[error("{backend} backend timed out after {elapsed_ms}ms")]
    AdapterTimeout { backend: BackendKind, elapsed_ms: u64 },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Carries only the backend kinds that failed; the per-backend causes are
    /// logged where they happen and never copied into this message.
    #[error("All backends unavailable: {}", display_kinds(.failed))]
    AllBackendsUnavailable { failed: Vec<BackendKind> },

    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    #[error("Request timed out after {elapsed_ms}ms")]
    RequestTimeout { elapsed_ms: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A named resource the request points at (a collection) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn unavailable(backend: BackendKind, reason: impl std::fmt::Display) -> Self {
        Self::AdapterUnavailable { backend, reason: reason.to_string() }
    }

    /// Failures of the backend itself, as opposed to a request it rejected.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::AdapterUnavailable { .. } | Self::AdapterTimeout { .. } | Self::EmbeddingFailure(_))
    }
}

fn display_kinds(kinds: &[BackendKind]) -> String {
    if kinds.is_empty() {
        return "none configured".to_string();
    }
    kinds.iter().map(BackendKind::as_str).collect::<Vec<_>>().join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;

//! Domain types shared by every backend adapter and the fusion engine.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::weights::FusionWeights;

pub type DocumentId = String;
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Backend-agnostic metadata filter. Adapters interpret it best-effort, see
/// [`crate::filter`].
pub type Filters = BTreeMap<String, serde_json::Value>;

pub const DEFAULT_TOP_K: usize = 10;
pub const SIMULATED_FLAG: &str = "simulated";

/// Indicates which backend produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Vector,
    Graph,
    Keyword,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Vector, BackendKind::Graph, BackendKind::Keyword];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Graph => "graph",
            Self::Keyword => "keyword",
        }
    }

    pub fn all() -> BTreeSet<BackendKind> {
        Self::ALL.into_iter().collect()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "graph" => Ok(Self::Graph),
            "keyword" => Ok(Self::Keyword),
            other => Err(Error::InvalidQuery(format!("unknown backend '{other}'"))),
        }
    }
}

/// One hop of relationship context attached by the graph backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRef {
    pub document_id: DocumentId,
    pub relation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A corpus record as held by the in-process backends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into(), metadata: Metadata::new() }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A single retrieved document, possibly confirmed by several backends.
///
/// `document_id` is the join key for deduplication. `score` is always
/// normalized into `[0, 1]`, higher is better.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub document_id: DocumentId,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub score: f32,
    #[serde(default)]
    pub sources: BTreeSet<BackendKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_documents: Vec<DocumentRef>,
}

impl SearchResult {
    pub fn new(document_id: impl Into<String>, content: impl Into<String>, score: f32) -> Self {
        Self {
            document_id: document_id.into(),
            content: content.into(),
            metadata: Metadata::new(),
            score,
            sources: BTreeSet::new(),
            related_documents: Vec::new(),
        }
    }

    pub fn from_document(doc: &Document, score: f32, source: BackendKind) -> Self {
        Self {
            document_id: doc.id.clone(),
            content: doc.content.clone(),
            metadata: doc.metadata.clone(),
            score,
            sources: BTreeSet::from([source]),
            related_documents: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: BackendKind) -> Self {
        self.sources.insert(source);
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// True when the result was produced by a stand-in adapter rather than a real backend.
    pub fn is_simulated(&self) -> bool {
        self.metadata.get(SIMULATED_FLAG).and_then(serde_json::Value::as_bool).unwrap_or(false)
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// The input to a hybrid search. Read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "BackendKind::all")]
    pub backends: BTreeSet<BackendKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<FusionWeights>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Filters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: DEFAULT_TOP_K,
            backends: BackendKind::all(),
            weights: None,
            filters: None,
            collection: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_backends(mut self, backends: impl IntoIterator<Item = BackendKind>) -> Self {
        self.backends = backends.into_iter().collect();
        self
    }

    /// Parses backend names such as `"vector"`; unknown names are rejected.
    pub fn with_backend_names<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self> {
        self.backends = names.iter().map(|n| n.as_ref().parse()).collect::<Result<_>>()?;
        Ok(self)
    }

    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Structural checks done before any backend is contacted.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidQuery("top_k must be positive".to_string()));
        }
        if self.text.trim().is_empty() {
            return Err(Error::InvalidQuery("query text is empty".to_string()));
        }
        if self.backends.is_empty() {
            return Err(Error::InvalidQuery("no backends requested".to_string()));
        }
        if let Some(weights) = &self.weights {
            weights.validate()?;
        }
        Ok(())
    }
}

/// A query translated for one backend call.
///
/// `embedding` is filled once per request by the fusion engine and shared
/// with the vector backend.
#[derive(Debug, Clone, Default)]
pub struct BackendRequest {
    pub text: String,
    pub top_k: usize,
    pub filters: Option<Filters>,
    pub collection: Option<String>,
    pub embedding: Option<Arc<[f32]>>,
}

impl BackendRequest {
    pub fn from_query(query: &SearchQuery, top_k: usize) -> Self {
        Self {
            text: query.text.clone(),
            top_k,
            filters: query.filters.clone(),
            collection: query.collection.clone(),
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Arc<[f32]>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

//! Builds the registry and embedding provider described by [`EngineSettings`].
//!
//! A configured implementation whose data cannot be loaded is logged and left
//! out, so the registry routes around it like any unreachable backend.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use triad_core::config::{resolve_with_base, AdapterChoice, EngineSettings};
use triad_core::data_processor::DataProcessor;
use triad_core::{BackendAdapter, BackendKind, Document, Embedder, Error, Result};
use triad_embed::{load_embedder, EmbeddingProvider};
use triad_graph::{GraphAdapter, GraphStore};
use triad_text::{KeywordAdapter, LexicalIndex};
use triad_vector::{FlatVectorAdapter, FlatVectorIndex};

use crate::registry::AdapterRegistry;
use crate::simulated::SimulatedAdapter;

pub struct Components {
    pub registry: AdapterRegistry,
    pub embeddings: EmbeddingProvider,
}

pub fn build(settings: &EngineSettings, base_dir: &Path) -> Result<Components> {
    settings.validate()?;
    let mut factory = AdapterFactory { settings, base_dir, corpus: load_corpus(settings, base_dir), embedder: None };
    let mut registry = AdapterRegistry::new(settings.timeouts.probe());
    for &kind in &settings.enabled {
        let (primary_choice, fallback_choice) = settings.choices(kind);
        let primary = factory.adapter(kind, primary_choice)?;
        let fallback = factory.adapter(kind, fallback_choice)?;
        if primary.is_none() && fallback.is_none() {
            warn!(backend = %kind, "no adapter could be built");
        }
        registry = registry.with_backend(kind, primary, fallback);
    }
    // reuse the embedder loaded for the corpus instead of loading it twice
    let embeddings = match factory.embedder {
        Some(embedder) => EmbeddingProvider::preloaded(embedder),
        None => EmbeddingProvider::from_settings(settings.embedding.clone()),
    };
    Ok(Components { registry, embeddings })
}

struct AdapterFactory<'a> {
    settings: &'a EngineSettings,
    base_dir: &'a Path,
    corpus: Vec<Document>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl AdapterFactory<'_> {
    fn adapter(&mut self, kind: BackendKind, choice: AdapterChoice) -> Result<Option<Arc<dyn BackendAdapter>>> {
        let adapter: Option<Arc<dyn BackendAdapter>> = match (kind, choice) {
            (_, AdapterChoice::None) => None,
            (_, AdapterChoice::Simulated) => {
                warn!(backend = %kind, "using simulated adapter; results are flagged");
                Some(Arc::new(SimulatedAdapter::new(kind, self.corpus.clone())))
            }
            (BackendKind::Vector, AdapterChoice::Lance) => self.lance(),
            (BackendKind::Vector, AdapterChoice::Flat) => self.flat().map(|a| a as Arc<dyn BackendAdapter>),
            (BackendKind::Graph, AdapterChoice::Memory) => self.graph().map(|a| a as Arc<dyn BackendAdapter>),
            (BackendKind::Keyword, AdapterChoice::Lexical) => self.keyword().map(|a| a as Arc<dyn BackendAdapter>),
            (kind, choice) => {
                return Err(Error::InvalidConfig(format!("adapter {choice:?} cannot serve the {kind} backend")));
            }
        };
        Ok(adapter)
    }

    fn path(&self, configured: &str) -> PathBuf {
        resolve_with_base(self.base_dir, configured)
    }

    #[cfg(feature = "lance")]
    fn lance(&self) -> Option<Arc<dyn BackendAdapter>> {
        let Some(uri) = self.settings.vector.lance_uri.as_deref() else {
            warn!("vector.lance_uri is not set; lance adapter disabled");
            return None;
        };
        let uri = self.path(uri);
        Some(Arc::new(triad_vector::LanceVectorAdapter::new(uri.to_string_lossy(), self.settings.vector.table.clone())))
    }

    #[cfg(not(feature = "lance"))]
    fn lance(&self) -> Option<Arc<dyn BackendAdapter>> {
        warn!("built without the `lance` feature; lance adapter disabled");
        None
    }

    fn flat(&mut self) -> Option<Arc<FlatVectorAdapter>> {
        let settings = self.settings;
        let vector = &settings.vector;
        let index = if let Some(path) = vector.flat_path.as_deref() {
            FlatVectorIndex::load_jsonl(&self.path(path))
        } else if vector.embed_corpus && !self.corpus.is_empty() {
            let embedder = match self.embedder() {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "cannot load embedder for the flat index");
                    return None;
                }
            };
            FlatVectorIndex::from_documents(&self.corpus, embedder.as_ref())
        } else {
            warn!("flat adapter has neither vector.flat_path nor an embeddable corpus");
            return None;
        };
        match index {
            Ok(index) => Some(Arc::new(FlatVectorAdapter::new(index))),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "flat vector index unavailable");
                None
            }
        }
    }

    fn embedder(&mut self) -> anyhow::Result<Arc<dyn Embedder>> {
        if let Some(embedder) = &self.embedder {
            return Ok(Arc::clone(embedder));
        }
        let embedder: Arc<dyn Embedder> = Arc::from(load_embedder(&self.settings.embedding)?);
        self.embedder = Some(Arc::clone(&embedder));
        Ok(embedder)
    }

    fn graph(&self) -> Option<Arc<GraphAdapter>> {
        let graph = &self.settings.graph;
        let Some(path) = graph.path.as_deref() else {
            warn!("graph.path is not set; memory graph disabled");
            return None;
        };
        match GraphStore::load_json(&self.path(path)) {
            Ok(store) => Some(Arc::new(GraphAdapter::from_settings(Arc::new(store), graph))),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "graph snapshot unavailable");
                None
            }
        }
    }

    fn keyword(&self) -> Option<Arc<KeywordAdapter>> {
        if self.corpus.is_empty() {
            warn!("no corpus documents; lexical index disabled");
            return None;
        }
        match LexicalIndex::build(self.corpus.iter().cloned()) {
            Ok(index) => Some(Arc::new(KeywordAdapter::new(index).with_candidate_pool(self.settings.keyword.candidate_pool))),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "lexical index build failed");
                None
            }
        }
    }
}

fn load_corpus(settings: &EngineSettings, base_dir: &Path) -> Vec<Document> {
    let Some(path) = settings.corpus.path.as_deref() else { return Vec::new() };
    let dir = resolve_with_base(base_dir, path);
    let processor = DataProcessor::new();
    let loaded = match settings.corpus.max_files {
        Some(limit) => processor.process_directory_limited(&dir, limit),
        None => processor.process_directory(&dir),
    };
    match loaded {
        Ok(documents) => {
            info!(documents = documents.len(), dir = %dir.display(), "corpus loaded");
            documents
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %format!("{e:#}"), "corpus unavailable");
            Vec::new()
        }
    }
}

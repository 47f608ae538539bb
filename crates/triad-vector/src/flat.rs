//! Brute-force cosine index held fully in memory.
//!
//! Serves as the vector fallback when LanceDB is not reachable or not compiled
//! in. Records come from a JSONL snapshot or are embedded from the corpus at
//! startup.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use triad_core::filter;
use triad_core::{BackendAdapter, BackendKind, BackendRequest, Document, Embedder, Error, Metadata, SearchResult};

/// One line of the JSONL snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    pub vector: Vec<f32>,
}

pub struct FlatVectorIndex {
    records: Vec<VectorRecord>,
    norms: Vec<f32>,
    dim: usize,
}

impl FlatVectorIndex {
    /// All records must share one dimension; zero-norm vectors are dropped.
    pub fn from_records(records: Vec<VectorRecord>) -> Result<Self> {
        let dim = records.first().map(|r| r.vector.len()).unwrap_or(0);
        let mut kept = Vec::with_capacity(records.len());
        let mut norms = Vec::with_capacity(records.len());
        for r in records {
            if r.vector.len() != dim {
                return Err(anyhow!("record {} has dimension {}, expected {}", r.id, r.vector.len(), dim));
            }
            let norm = l2_norm(&r.vector);
            if norm <= f32::EPSILON || !norm.is_finite() {
                warn!(id = %r.id, "skipping record with degenerate vector");
                continue;
            }
            norms.push(norm);
            kept.push(r);
        }
        Ok(Self { records: kept, norms, dim })
    }

    pub fn load_jsonl(path: &Path) -> Result<Self> {
        let start = Instant::now();
        let file = File::open(path).with_context(|| format!("opening vector snapshot {}", path.display()))?;
        let mut records = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            let record: VectorRecord = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: invalid vector record", path.display(), n + 1))?;
            records.push(record);
        }
        let index = Self::from_records(records)?;
        info!(records = index.len(), dim = index.dim, elapsed_ms = start.elapsed().as_millis() as u64, "flat vector snapshot loaded");
        Ok(index)
    }

    /// Embeds every document with `embedder`, in batches.
    pub fn from_documents(documents: &[Document], embedder: &dyn Embedder) -> Result<Self> {
        let start = Instant::now();
        let mut records = Vec::with_capacity(documents.len());
        for chunk in documents.chunks(64) {
            let texts: Vec<String> = chunk.iter().map(|d| d.content.clone()).collect();
            let vectors = embedder.embed_batch(&texts)?;
            if vectors.len() != chunk.len() {
                return Err(anyhow!("embedder returned {} vectors for {} documents", vectors.len(), chunk.len()));
            }
            for (doc, vector) in chunk.iter().zip(vectors) {
                let collection = doc.metadata.get("collection").and_then(|v| v.as_str()).map(str::to_string);
                records.push(VectorRecord { id: doc.id.clone(), content: doc.content.clone(), metadata: doc.metadata.clone(), collection, vector });
            }
        }
        let index = Self::from_records(records)?;
        info!(records = index.len(), elapsed_ms = start.elapsed().as_millis() as u64, "flat vector index embedded from corpus");
        Ok(index)
    }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn dim(&self) -> usize { self.dim }

    /// Records ranked by cosine similarity to `query`, negatives clamped to 0.
    /// `keep` decides which records are eligible before ranking.
    pub fn search<F>(&self, query: &[f32], top_k: usize, keep: F) -> Result<Vec<(f32, &VectorRecord)>>
    where
        F: Fn(&VectorRecord) -> bool,
    {
        if self.is_empty() || top_k == 0 { return Ok(vec![]); }
        if query.len() != self.dim {
            return Err(anyhow!("query has dimension {}, index has {}", query.len(), self.dim));
        }
        let q_norm = l2_norm(query);
        if q_norm <= f32::EPSILON { return Ok(vec![]); }
        let mut scored: Vec<(f32, &VectorRecord)> = self
            .records
            .iter()
            .zip(&self.norms)
            .filter(|(r, _)| keep(r))
            .map(|(r, norm)| {
                let dot: f32 = r.vector.iter().zip(query).map(|(a, b)| a * b).sum();
                ((dot / (norm * q_norm)).clamp(0.0, 1.0), r)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        scored.truncate(top_k);
        Ok(scored)
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Vector backend over a [`FlatVectorIndex`]. Needs the request embedding.
pub struct FlatVectorAdapter {
    index: FlatVectorIndex,
}

impl FlatVectorAdapter {
    pub fn new(index: FlatVectorIndex) -> Self { Self { index } }

    pub fn index(&self) -> &FlatVectorIndex { &self.index }
}

#[async_trait]
impl BackendAdapter for FlatVectorAdapter {
    fn kind(&self) -> BackendKind { BackendKind::Vector }

    fn name(&self) -> &str { "flat" }

    async fn probe(&self) -> triad_core::Result<()> {
        if self.index.is_empty() {
            return Err(Error::unavailable(BackendKind::Vector, "flat index holds no vectors"));
        }
        Ok(())
    }

    async fn search(&self, request: &BackendRequest) -> triad_core::Result<Vec<SearchResult>> {
        let start = Instant::now();
        let Some(embedding) = request.embedding.as_deref() else {
            return Err(Error::InvalidQuery("vector search needs a query embedding".to_string()));
        };
        if !self.index.is_empty() && embedding.len() != self.index.dim() {
            return Err(Error::InvalidQuery(format!(
                "query embedding has dimension {}, the vector index expects {}",
                embedding.len(),
                self.index.dim()
            )));
        }
        let collection = request.collection.as_deref();
        let keep = |r: &VectorRecord| {
            let in_collection = match (collection, r.collection.as_deref()) {
                (Some(wanted), Some(actual)) => wanted == actual,
                (Some(_), None) => filter::in_collection(collection, &r.metadata),
                _ => true,
            };
            in_collection && filter::matches_opt(request.filters.as_ref(), &r.metadata)
        };
        let hits = self
            .index
            .search(embedding, request.top_k, keep)
            .map_err(|e| {
                warn!(error = %format!("{e:#}"), "flat vector search failed");
                Error::unavailable(BackendKind::Vector, "flat vector search failed")
            })?;
        let results: Vec<SearchResult> = hits
            .into_iter()
            .map(|(score, r)| {
                let mut result = SearchResult::new(r.id.clone(), r.content.clone(), score).with_source(BackendKind::Vector);
                result.metadata = r.metadata.clone();
                result
            })
            .collect();
        debug!(hits = results.len(), elapsed_us = start.elapsed().as_micros() as u64, "flat vector search");
        Ok(results)
    }
}

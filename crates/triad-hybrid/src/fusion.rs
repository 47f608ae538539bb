//! Merging per-backend result lists into one ranking.
//!
//! Both strategies dedupe by `document_id`, union `sources`, and produce a
//! score in `[0, 1]` given weights that sum to 1. Lists are folded in
//! descending weight order so the highest-weighted backend wins metadata
//! conflicts and supplies the content when it has any. Fused scores are
//! rounded to [`SCORE_RESOLUTION`] before ranking, so float noise from weight
//! normalization cannot reorder near-ties; the `document_id` tie-break does.
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use triad_core::config::FusionStrategy;
use triad_core::{BackendKind, FusionWeights, SearchResult};

/// Granularity of fused scores.
pub const SCORE_RESOLUTION: f64 = 1e-6;

/// One backend's contribution to a request.
#[derive(Debug, Clone)]
pub struct BackendHits {
    pub kind: BackendKind,
    pub results: Vec<SearchResult>,
}

impl BackendHits {
    pub fn new(kind: BackendKind, results: Vec<SearchResult>) -> Self {
        Self { kind, results }
    }
}

/// Fuses `lists` and returns at most `top_k` results ordered by score
/// descending, then `document_id` ascending.
pub fn fuse(lists: Vec<BackendHits>, weights: &FusionWeights, strategy: FusionStrategy, rrf_k: u32, top_k: usize) -> Vec<SearchResult> {
    let mut lists = lists;
    lists.sort_by(|a, b| weights.get(b.kind).total_cmp(&weights.get(a.kind)).then_with(|| a.kind.cmp(&b.kind)));

    let mut merged: HashMap<String, SearchResult> = HashMap::new();
    for BackendHits { kind, results } in lists {
        let weight = weights.get(kind);
        for (rank, result) in ranked(results).into_iter().enumerate() {
            let contribution = match strategy {
                FusionStrategy::Weighted => weight * unit(result.score),
                FusionStrategy::Rrf => reciprocal_rank(weight, rrf_k, rank + 1),
            };
            match merged.entry(result.document_id.clone()) {
                Entry::Vacant(slot) => {
                    let mut first = result;
                    first.score = contribution;
                    first.sources.insert(kind);
                    slot.insert(first);
                }
                Entry::Occupied(mut slot) => absorb(slot.get_mut(), result, kind, contribution),
            }
        }
    }

    let mut fused: Vec<SearchResult> = merged
        .into_values()
        .map(|mut r| {
            r.score = quantize(unit(r.score));
            r
        })
        .collect();
    sort_results(&mut fused);
    fused.truncate(top_k);
    fused
}

/// `weight / (k + rank)` rescaled by `k + 1`, so rank 1 in every list scores 1.0.
pub fn reciprocal_rank(weight: f32, k: u32, rank: usize) -> f32 {
    let k = k as f32;
    weight * (k + 1.0) / (k + rank as f32)
}

/// Score descending, `document_id` ascending.
pub fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.document_id.cmp(&b.document_id)));
}

/// A backend list in rank order with duplicates collapsed to their best entry.
fn ranked(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut results = results;
    for r in &mut results {
        r.score = unit(r.score);
    }
    sort_results(&mut results);
    let mut seen = HashSet::new();
    results.retain(|r| seen.insert(r.document_id.clone()));
    results
}

fn absorb(existing: &mut SearchResult, incoming: SearchResult, kind: BackendKind, contribution: f32) {
    existing.score += contribution;
    existing.sources.insert(kind);
    existing.sources.extend(incoming.sources);
    for (key, value) in incoming.metadata {
        existing.metadata.entry(key).or_insert(value);
    }
    if existing.content.is_empty() && !incoming.content.is_empty() {
        existing.content = incoming.content;
    }
    for related in incoming.related_documents {
        if !existing.related_documents.iter().any(|r| r.document_id == related.document_id) {
            existing.related_documents.push(related);
        }
    }
}

fn quantize(score: f32) -> f32 {
    ((f64::from(score) / SCORE_RESOLUTION).round() * SCORE_RESOLUTION) as f32
}

fn unit(score: f32) -> f32 {
    if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 }
}

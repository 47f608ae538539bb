//! In-memory relationship graph loaded from a JSON snapshot.
//!
//! Nodes are entities (laws, technologies, organisations); a node that
//! stands for a corpus document carries its `document_id`. Edges are
//! directed and labelled with a relation name, but traversal follows them
//! both ways.
use anyhow::{anyhow, Context, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Instant;
use tracing::info;

use triad_core::Metadata;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeRecord {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub relation: String,
    /// Overrides the configured relation weight for this edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

/// A node reached by traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reach {
    pub node: NodeIndex,
    pub hops: usize,
    /// Product of edge weights along the best path.
    pub path_weight: f32,
}

impl Reach {
    pub fn score(&self) -> f32 {
        (self.path_weight / (1.0 + self.hops as f32)).clamp(0.0, 1.0)
    }
}

pub struct GraphStore {
    graph: DiGraph<NodeRecord, EdgeRecord>,
    by_id: HashMap<String, NodeIndex>,
    /// Lower-cased token phrases (label and aliases) per node.
    phrases: Vec<(Vec<String>, NodeIndex)>,
}

impl GraphStore {
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let mut graph = DiGraph::with_capacity(snapshot.nodes.len(), snapshot.edges.len());
        let mut by_id = HashMap::with_capacity(snapshot.nodes.len());
        let mut phrases = Vec::new();
        for node in snapshot.nodes {
            if by_id.contains_key(&node.id) {
                return Err(anyhow!("duplicate graph node id '{}'", node.id));
            }
            let id = node.id.clone();
            let names: Vec<Vec<String>> = std::iter::once(&node.label)
                .chain(node.aliases.iter())
                .map(|n| tokens(n))
                .filter(|t| !t.is_empty())
                .collect();
            let idx = graph.add_node(node);
            phrases.extend(names.into_iter().map(|p| (p, idx)));
            by_id.insert(id, idx);
        }
        for edge in snapshot.edges {
            let (Some(&a), Some(&b)) = (by_id.get(&edge.source), by_id.get(&edge.target)) else {
                return Err(anyhow!("edge {} -[{}]-> {} references an unknown node", edge.source, edge.relation, edge.target));
            };
            graph.add_edge(a, b, edge);
        }
        Ok(Self { graph, by_id, phrases })
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let start = Instant::now();
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading graph snapshot {}", path.display()))?;
        let snapshot: GraphSnapshot = serde_json::from_str(&raw).with_context(|| format!("parsing graph snapshot {}", path.display()))?;
        let store = Self::from_snapshot(snapshot)?;
        info!(nodes = store.node_count(), edges = store.edge_count(), elapsed_ms = start.elapsed().as_millis() as u64, "graph snapshot loaded");
        Ok(store)
    }

    pub fn node_count(&self) -> usize { self.graph.node_count() }

    pub fn edge_count(&self) -> usize { self.graph.edge_count() }

    pub fn node(&self, idx: NodeIndex) -> Option<&NodeRecord> { self.graph.node_weight(idx) }

    pub fn find(&self, id: &str) -> Option<NodeIndex> { self.by_id.get(id).copied() }

    /// Nodes whose label or alias occurs in `text` as a whole token phrase,
    /// in order of first appearance.
    pub fn extract_entities(&self, text: &str) -> Vec<NodeIndex> {
        let words = tokens(text);
        let mut found: Vec<(usize, NodeIndex)> = Vec::new();
        for (phrase, idx) in &self.phrases {
            let Some(pos) = words.windows(phrase.len()).position(|w| w == phrase.as_slice()) else { continue };
            match found.iter_mut().find(|(_, n)| n == idx) {
                Some(entry) => entry.0 = entry.0.min(pos),
                None => found.push((pos, *idx)),
            }
        }
        found.sort_by_key(|(pos, idx)| (*pos, idx.index()));
        found.into_iter().map(|(_, idx)| idx).collect()
    }

    /// Best path from any seed to every node within `max_hops`, following
    /// edges in both directions. `edge_weight` maps an edge to `[0, 1]`.
    pub fn traverse<F>(&self, seeds: &[NodeIndex], max_hops: usize, edge_weight: F) -> Vec<Reach>
    where
        F: Fn(&EdgeRecord) -> f32,
    {
        let mut best: HashMap<NodeIndex, Reach> = HashMap::new();
        let mut frontier: Vec<Reach> = Vec::new();
        for &node in seeds {
            let seed = Reach { node, hops: 0, path_weight: 1.0 };
            best.insert(node, seed);
            frontier.push(seed);
        }
        for hops in 1..=max_hops {
            let mut next = Vec::new();
            for from in &frontier {
                for (neighbor, edge) in self.incident(from.node) {
                    let path_weight = from.path_weight * edge_weight(edge).clamp(0.0, 1.0);
                    let candidate = Reach { node: neighbor, hops, path_weight };
                    let improves = best.get(&neighbor).map_or(true, |b| candidate.score() > b.score());
                    if improves && path_weight > 0.0 {
                        best.insert(neighbor, candidate);
                        next.push(candidate);
                    }
                }
            }
            if next.is_empty() { break; }
            frontier = next;
        }
        let mut reached: Vec<Reach> = best.into_values().collect();
        reached.sort_by(|a, b| b.score().total_cmp(&a.score()).then_with(|| a.node.index().cmp(&b.node.index())));
        reached
    }

    /// Direct neighbours in either direction with the connecting edge.
    pub fn incident(&self, idx: NodeIndex) -> impl Iterator<Item = (NodeIndex, &EdgeRecord)> + '_ {
        let out = self.graph.edges_directed(idx, Direction::Outgoing).map(|e| (e.target(), e.weight()));
        let inc = self.graph.edges_directed(idx, Direction::Incoming).map(|e| (e.source(), e.weight()));
        out.chain(inc)
    }
}

/// Edge weight from the edge override, else the relation table, else 1.0.
pub fn relation_weight(relation_weights: &BTreeMap<String, f32>, edge: &EdgeRecord) -> f32 {
    edge.weight
        .or_else(|| relation_weights.get(&edge.relation).copied())
        .unwrap_or(1.0)
        .clamp(0.0, 1.0)
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '§'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, label: &str, doc: Option<&str>) -> NodeRecord {
        NodeRecord { id: id.into(), label: label.into(), aliases: vec![], document_id: doc.map(Into::into), content: String::new(), metadata: Metadata::new() }
    }

    fn edge(source: &str, target: &str, relation: &str) -> EdgeRecord {
        EdgeRecord { source: source.into(), target: target.into(), relation: relation.into(), weight: None }
    }

    fn chain() -> GraphStore {
        GraphStore::from_snapshot(GraphSnapshot {
            nodes: vec![node("a", "Photovoltaik", None), node("b", "EEG 2023", Some("doc-b")), node("c", "Netzbetreiber", Some("doc-c"))],
            edges: vec![edge("b", "a", "regulates"), edge("b", "c", "obliges")],
        })
        .expect("store")
    }

    #[test]
    fn entities_match_whole_token_phrases() {
        let store = chain();
        let found = store.extract_entities("Wie regelt das EEG 2023 die Photovoltaik?");
        let ids: Vec<&str> = found.iter().filter_map(|i| store.node(*i)).map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(store.extract_entities("Photovoltaikanlage").is_empty());
    }

    #[test]
    fn traversal_follows_edges_backwards_and_decays_with_hops() {
        let store = chain();
        let seeds = vec![store.find("a").expect("a")];
        let reached = store.traverse(&seeds, 2, |_| 1.0);
        let score = |id: &str| reached.iter().find(|r| Some(r.node) == store.find(id)).map(Reach::score);
        assert_eq!(score("a"), Some(1.0));
        assert_eq!(score("b"), Some(0.5));
        assert!((score("c").expect("c") - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(store.traverse(&seeds, 1, |_| 1.0).len(), 2);
    }

    #[test]
    fn unknown_edge_endpoints_are_rejected() {
        let snapshot = GraphSnapshot { nodes: vec![node("a", "A", None)], edges: vec![edge("a", "zz", "x")] };
        assert!(GraphStore::from_snapshot(snapshot).is_err());
    }

    #[test]
    fn relation_weights_resolve_with_override_and_clamp() {
        let table = BTreeMap::from([("cites".to_string(), 0.9), ("boost".to_string(), 3.0)]);
        assert_eq!(relation_weight(&table, &edge("a", "b", "cites")), 0.9);
        assert_eq!(relation_weight(&table, &edge("a", "b", "boost")), 1.0);
        assert_eq!(relation_weight(&table, &edge("a", "b", "other")), 1.0);
        let mut e = edge("a", "b", "cites");
        e.weight = Some(0.2);
        assert_eq!(relation_weight(&table, &e), 0.2);
    }
}

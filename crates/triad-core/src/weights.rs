//! Per-backend fusion weights and the named presets.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::types::BackendKind;

/// Named weight sets. Both are documented defaults of the system, so neither
/// is hard-coded; configuration picks one.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeightPreset {
    /// vector 0.5, graph 0.3, keyword 0.2
    #[default]
    Balanced,
    /// vector 0.5, graph 0.5, keyword 0.0
    VectorGraph,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct FusionWeights(BTreeMap<BackendKind, f32>);

impl FusionWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preset(preset: WeightPreset) -> Self {
        match preset {
            WeightPreset::Balanced => Self::new()
                .with(BackendKind::Vector, 0.5)
                .with(BackendKind::Graph, 0.3)
                .with(BackendKind::Keyword, 0.2),
            WeightPreset::VectorGraph => Self::new()
                .with(BackendKind::Vector, 0.5)
                .with(BackendKind::Graph, 0.5)
                .with(BackendKind::Keyword, 0.0),
        }
    }

    pub fn with(mut self, kind: BackendKind, weight: f32) -> Self {
        self.0.insert(kind, weight);
        self
    }

    /// Missing entries weigh zero.
    pub fn get(&self, kind: BackendKind) -> f32 {
        self.0.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BackendKind, f32)> + '_ {
        self.0.iter().map(|(k, w)| (*k, *w))
    }

    /// Every weight must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        for (kind, w) in self.iter() {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidQuery(format!("weight for {kind} must be a non-negative number, got {w}")));
            }
        }
        Ok(())
    }

    /// Rescales the weights of `kinds` so they sum to 1. Kinds outside the set
    /// are dropped. Uniformly rescaled inputs give identical outputs.
    pub fn normalized_over(&self, kinds: &BTreeSet<BackendKind>) -> Result<FusionWeights> {
        self.validate()?;
        // f64 keeps the rounding of scaled inputs below f32 resolution
        let sum: f64 = kinds.iter().map(|k| f64::from(self.get(*k))).sum();
        if !(sum.is_finite() && sum > 0.0) {
            return Err(Error::InvalidQuery("weights of the requested backends must sum to a positive value".to_string()));
        }
        Ok(FusionWeights(kinds.iter().map(|k| (*k, (f64::from(self.get(*k)) / sum) as f32)).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_over_requested_kinds_only() {
        let kinds = BTreeSet::from([BackendKind::Vector, BackendKind::Graph]);
        let w = FusionWeights::preset(WeightPreset::Balanced).normalized_over(&kinds).expect("weights");
        assert!((w.get(BackendKind::Vector) - 0.625).abs() < 1e-6);
        assert!((w.get(BackendKind::Graph) - 0.375).abs() < 1e-6);
        assert_eq!(w.get(BackendKind::Keyword), 0.0);
    }

    #[test]
    fn uniform_scaling_is_invisible_after_normalization() {
        let kinds = BackendKind::all();
        let a = FusionWeights::new().with(BackendKind::Vector, 1.0).with(BackendKind::Graph, 2.0).with(BackendKind::Keyword, 3.0);
        let b = FusionWeights::new().with(BackendKind::Vector, 10.0).with(BackendKind::Graph, 20.0).with(BackendKind::Keyword, 30.0);
        let (a, b) = (a.normalized_over(&kinds).expect("a"), b.normalized_over(&kinds).expect("b"));
        for k in BackendKind::ALL {
            assert!((a.get(k) - b.get(k)).abs() < 1e-6);
        }
    }

    #[test]
    fn rejects_zero_sum_and_negative_weights() {
        let kinds = BTreeSet::from([BackendKind::Keyword]);
        assert!(FusionWeights::preset(WeightPreset::VectorGraph).normalized_over(&kinds).is_err());
        let negative = FusionWeights::new().with(BackendKind::Vector, -1.0).with(BackendKind::Graph, 2.0);
        assert!(matches!(negative.validate(), Err(Error::InvalidQuery(_))));
    }
}

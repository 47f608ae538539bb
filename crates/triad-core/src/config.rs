use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{BackendKind, DEFAULT_TOP_K};
use crate::weights::{FusionWeights, WeightPreset};

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, env_name };
        config.validate_for_env()?;
        Ok(config)
    }

    /// Wraps an already assembled figment (tests, embedding applications).
    pub fn from_figment(figment: Figment, env_name: &str) -> anyhow::Result<Self> {
        let config = Self { figment, env_name: env_name.to_string() };
        config.validate_for_env()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The `[engine]` table, with defaults when it is absent.
    pub fn engine(&self) -> anyhow::Result<EngineSettings> {
        if self.figment.find_value("engine").is_err() {
            return Ok(EngineSettings::default());
        }
        let settings: EngineSettings = self.get("engine")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    fn validate_for_env(&self) -> anyhow::Result<()> {
        let settings = self.engine()?;
        match self.env_name.as_str() {
            "prod" | "production" => {
                if let Some(kind) = settings.simulated_kinds().first() {
                    return Err(Error::InvalidConfig(format!("simulated {kind} adapter is not allowed in production")).into());
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    #[default]
    Weighted,
    Rrf,
}

/// Which concrete implementation serves a backend kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdapterChoice {
    Lance,
    Flat,
    Memory,
    Lexical,
    /// Demo stand-in; every result is flagged `simulated`.
    Simulated,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub enabled: BTreeSet<BackendKind>,
    pub default_top_k: usize,
    pub fusion: FusionSettings,
    pub timeouts: TimeoutSettings,
    pub embedding: EmbeddingSettings,
    pub corpus: CorpusSettings,
    pub vector: VectorSettings,
    pub graph: GraphSettings,
    pub keyword: KeywordSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            enabled: BackendKind::all(),
            default_top_k: DEFAULT_TOP_K,
            fusion: FusionSettings::default(),
            timeouts: TimeoutSettings::default(),
            embedding: EmbeddingSettings::default(),
            corpus: CorpusSettings::default(),
            vector: VectorSettings::default(),
            graph: GraphSettings::default(),
            keyword: KeywordSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.enabled.is_empty() {
            return Err(Error::InvalidConfig("at least one backend must be enabled".to_string()));
        }
        if self.default_top_k == 0 {
            return Err(Error::InvalidConfig("default_top_k must be positive".to_string()));
        }
        if self.fusion.candidate_multiplier == 0 {
            return Err(Error::InvalidConfig("fusion.candidate_multiplier must be at least 1".to_string()));
        }
        if let Some(weights) = &self.fusion.weights {
            weights.validate().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        }
        let t = &self.timeouts;
        if [t.vector_ms, t.graph_ms, t.keyword_ms, t.probe_ms].contains(&0) {
            return Err(Error::InvalidConfig("timeouts must be positive".to_string()));
        }
        Ok(())
    }

    /// (primary, fallback) for one kind.
    pub fn choices(&self, kind: BackendKind) -> (AdapterChoice, AdapterChoice) {
        match kind {
            BackendKind::Vector => (self.vector.primary, self.vector.fallback),
            BackendKind::Graph => (self.graph.primary, self.graph.fallback),
            BackendKind::Keyword => (self.keyword.primary, self.keyword.fallback),
        }
    }

    pub fn simulated_kinds(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|k| {
                let (p, f) = self.choices(*k);
                p == AdapterChoice::Simulated || f == AdapterChoice::Simulated
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FusionSettings {
    pub strategy: FusionStrategy,
    pub preset: WeightPreset,
    /// Explicit weights override the preset.
    pub weights: Option<FusionWeights>,
    pub rrf_k: u32,
    /// Each backend is asked for `top_k * candidate_multiplier` candidates.
    pub candidate_multiplier: usize,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self { strategy: FusionStrategy::Weighted, preset: WeightPreset::Balanced, weights: None, rrf_k: 60, candidate_multiplier: 2 }
    }
}

impl FusionSettings {
    pub fn default_weights(&self) -> FusionWeights {
        self.weights.clone().unwrap_or_else(|| FusionWeights::preset(self.preset))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutSettings {
    pub vector_ms: u64,
    pub graph_ms: u64,
    pub keyword_ms: u64,
    pub probe_ms: u64,
    pub fusion_overhead_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        // vector gets headroom for one embedding computation
        Self { vector_ms: 800, graph_ms: 300, keyword_ms: 300, probe_ms: 500, fusion_overhead_ms: 50 }
    }
}

impl TimeoutSettings {
    pub fn for_kind(&self, kind: BackendKind) -> Duration {
        Duration::from_millis(match kind {
            BackendKind::Vector => self.vector_ms,
            BackendKind::Graph => self.graph_ms,
            BackendKind::Keyword => self.keyword_ms,
        })
    }

    /// Outer request deadline: the slowest participating backend plus fusion overhead.
    pub fn request_deadline<'a>(&self, kinds: impl IntoIterator<Item = &'a BackendKind>) -> Duration {
        let slowest = kinds.into_iter().map(|k| self.for_kind(*k)).max().unwrap_or_default();
        slowest + Duration::from_millis(self.fusion_overhead_ms)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedderKind {
    #[default]
    BgeM3,
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub kind: EmbedderKind,
    pub model_dir: Option<String>,
    pub dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { kind: EmbedderKind::BgeM3, model_dir: None, dim: 1024 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CorpusSettings {
    /// Directory of `.txt` / `.jsonl` files backing the lexical index.
    pub path: Option<String>,
    pub max_files: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VectorSettings {
    pub primary: AdapterChoice,
    pub fallback: AdapterChoice,
    pub lance_uri: Option<String>,
    /// Default table when a query names no collection.
    pub table: String,
    /// JSONL snapshot of `{id, content, metadata, collection, vector}` records.
    pub flat_path: Option<String>,
    /// Embed the corpus at startup when no snapshot is given.
    pub embed_corpus: bool,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            primary: AdapterChoice::Lance,
            fallback: AdapterChoice::Flat,
            lance_uri: None,
            table: "documents".to_string(),
            flat_path: None,
            embed_corpus: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphSettings {
    pub primary: AdapterChoice,
    pub fallback: AdapterChoice,
    /// JSON snapshot with `nodes` and `edges`.
    pub path: Option<String>,
    pub max_hops: usize,
    /// Relation name -> weight in `[0, 1]`; unknown relations weigh 1.0.
    pub relation_weights: BTreeMap<String, f32>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self { primary: AdapterChoice::Memory, fallback: AdapterChoice::None, path: None, max_hops: 2, relation_weights: BTreeMap::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KeywordSettings {
    pub primary: AdapterChoice,
    pub fallback: AdapterChoice,
    /// Minimum number of lexical candidates fetched before filters are applied.
    pub candidate_pool: usize,
}

impl Default for KeywordSettings {
    fn default() -> Self {
        Self { primary: AdapterChoice::Lexical, fallback: AdapterChoice::None, candidate_pool: 50 }
    }
}

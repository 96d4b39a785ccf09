//! Typed configuration surface.
//!
//! One `RagConfig` struct with serde defaults, loaded by Figment from
//! `config.toml` merged with `APP_*` environment variables (`__` as the
//! nesting separator). Components receive their section by value; there
//! is no ambient/global lookup.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::Intent;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub max_chars: usize,
    /// Trailing/leading overlap between adjacent chunks, in characters.
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 480, overlap_chars: 80 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub k_list: usize,
    pub k_detail: usize,
    pub k_general: usize,
    /// Each method over-fetches `overfetch_factor * k` candidates so that
    /// fusion has enough to work with.
    pub overfetch_factor: usize,
    /// Cap on the evidence handed to the generator after all rounds.
    pub final_evidence_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k_list: 12, k_detail: 6, k_general: 8, overfetch_factor: 3, final_evidence_k: 12 }
    }
}

impl RetrievalConfig {
    pub fn k_for(&self, intent: Intent) -> usize {
        match intent {
            Intent::List => self.k_list,
            Intent::Detail => self.k_detail,
            Intent::General => self.k_general,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// RRF smoothing constant `c` in `1 / (c + rank)`.
    pub rrf_c: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { rrf_c: 60.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub enabled: bool,
    /// Size of the fused pool handed to the reranker (m >= k).
    pub pool: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self { enabled: true, pool: 24 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecursionConfig {
    /// Hard cap on retrieve/assess/reformulate rounds.
    pub max_rounds: usize,
    /// Optional wall-clock budget for the whole loop.
    pub wall_clock_ms: Option<u64>,
}

impl Default for RecursionConfig {
    fn default() -> Self {
        Self { max_rounds: 3, wall_clock_ms: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Expand evidence with the parent section's text when it fits.
    pub include_parents: bool,
    /// Budget for the evidence block of the prompt, in characters.
    pub max_context_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { include_parents: true, max_context_chars: 8000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible chat endpoint base URL.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Bounded retries for transient/rate-limit failures.
    pub max_retries: usize,
    /// Route intent classification through the model instead of rules.
    pub llm_router: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.moonshot.cn/v1".to_string(),
            model: "kimi-k2-0711-preview".to_string(),
            temperature: 0.1,
            max_tokens: 2048,
            api_key_env: "MOONSHOT_API_KEY".to_string(),
            max_retries: 3,
            llm_router: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: String,
    pub store_path: String,
    pub tantivy_dir: String,
    pub lancedb_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/docs".to_string(),
            store_path: "data/index/chunks.json".to_string(),
            tantivy_dir: "data/index/tantivy".to_string(),
            lancedb_dir: "data/index/lancedb".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub fusion: FusionConfig,
    pub rerank: RerankConfig,
    pub recursion: RecursionConfig,
    pub generation: GenerationConfig,
    pub llm: LlmConfig,
    pub paths: PathsConfig,
}

impl RagConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("APP_").split("__"));
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            return Err(Error::InvalidConfig("chunking.max_chars must be > 0".into()));
        }
        if self.chunking.overlap_chars >= self.chunking.max_chars {
            return Err(Error::InvalidConfig(
                "chunking.overlap_chars must be smaller than chunking.max_chars".into(),
            ));
        }
        if self.fusion.rrf_c <= 0.0 {
            return Err(Error::InvalidConfig("fusion.rrf_c must be positive".into()));
        }
        let max_k = self
            .retrieval
            .k_list
            .max(self.retrieval.k_detail)
            .max(self.retrieval.k_general);
        if max_k == 0 {
            return Err(Error::InvalidConfig("retrieval k values must be > 0".into()));
        }
        if self.rerank.enabled && self.rerank.pool < max_k {
            return Err(Error::InvalidConfig(
                "rerank.pool must be at least the largest retrieval k".into(),
            ));
        }
        if self.recursion.max_rounds == 0 {
            return Err(Error::InvalidConfig("recursion.max_rounds must be >= 1".into()));
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
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a base directory after
/// expansion. Absolute paths are returned as-is.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}

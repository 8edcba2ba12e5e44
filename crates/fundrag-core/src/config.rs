//! Configuration loader and path helpers.
//!
//! Uses Figment to merge typed defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys). Provides helpers to expand
//! `~` and `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(env_name)?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        match env {
            "prod" | "production" => {
                let settings = self.settings()?;
                if settings.rerank.enabled && settings.rerank.api_key.is_none() {
                    tracing::warn!("rerank enabled in production without an API key; results will not be reranked");
                }
            }
            _ => {
                self.settings()?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub rerank: RerankSettings,
    pub query_cache: QueryCacheSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::Error::InvalidConfig;
        let r = &self.retrieval;
        if !(0.0..=1.0).contains(&r.alpha) {
            return Err(InvalidConfig(format!("retrieval.alpha must be within [0, 1], got {}", r.alpha)));
        }
        if r.rrf_k <= 0.0 {
            return Err(InvalidConfig(format!("retrieval.rrf_k must be positive, got {}", r.rrf_k)));
        }
        if r.default_top_k == 0 || r.candidate_multiplier == 0 {
            return Err(InvalidConfig("retrieval.default_top_k and candidate_multiplier must be >= 1".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(InvalidConfig("embedding.dimension must be >= 1".into()));
        }
        if self.embedding.cache_capacity == 0 || self.query_cache.capacity == 0 {
            return Err(InvalidConfig("cache capacities must be >= 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub data_dir: String,
    pub faqs_file: String,
    pub funds_file: String,
    pub state_file: String,
    pub lancedb_dir: String,
    pub table_name: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            data_dir: "data/raw".into(),
            faqs_file: "faqs.csv".into(),
            funds_file: "funds.csv".into(),
            state_file: "data/index.state".into(),
            lancedb_dir: "data/lancedb".into(),
            table_name: "documents".into(),
        }
    }
}

impl DataSettings {
    pub fn faqs_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.data_dir).join(&self.faqs_file)
    }

    pub fn funds_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.data_dir).join(&self.funds_file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub dimension: usize,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model: "hash-xx64".into(), dimension: 384, cache_capacity: 10_000, cache_ttl_secs: 86_400 }
    }
}

impl EmbeddingSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub default_top_k: usize,
    pub alpha: f64,
    pub rrf_k: f64,
    pub candidate_multiplier: usize,
    pub query_timeout_ms: Option<u64>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { default_top_k: 5, alpha: 0.5, rrf_k: 60.0, candidate_multiplier: 3, query_timeout_ms: None }
    }
}

impl RetrievalSettings {
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub enabled: bool,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub top_k: usize,
    pub timeout_ms: u64,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "rerank-english-v3.0".into(),
            endpoint: "https://api.cohere.com/v1/rerank".into(),
            api_key: None,
            top_k: 3,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryCacheSettings {
    pub enabled: bool,
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for QueryCacheSettings {
    fn default() -> Self {
        Self { enabled: true, capacity: 1_000, ttl_secs: 300 }
    }
}

impl QueryCacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub progress: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".into(), progress: true }
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

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

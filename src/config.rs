//! TOML configuration.
//!
//! Every section is optional; a missing file or section falls back to the
//! defaults below. Credentials are never stored in the file: the generator
//! reads its API key from the environment variable named by
//! `generation.api_key_env`.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [chunking]
//! chunk_size = 500
//! chunk_overlap = 50
//!
//! [retrieval]
//! top_k = 3
//!
//! [embedding]
//! provider = "hash"
//!
//! [generation]
//! provider = "openai"
//! model = "gpt-4o-mini"
//!
//! # Tried in order when the primary fails. Each entry has its own model
//! # and url; unset fields use that provider's defaults, never the primary's.
//! [[generation.fallback]]
//! provider = "ollama"
//! model = "llama3.2:latest"
//! ```
//!
//! A bare provider name (`fallback = ["ollama"]`) is shorthand for an entry
//! with only `provider` set.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::index::DEFAULT_TOP_K;

/// Environment variable that overrides `server.bind`.
pub const BIND_ENV: &str = "PAGE_RAG_BIND";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key (OpenAI provider only).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            api_key_env: default_api_key_env(),
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    /// Providers tried, in order, after the primary one fails.
    #[serde(default)]
    pub fallback: Vec<FallbackConfig>,
}

/// One entry of `generation.fallback`.
///
/// Sampling settings (`temperature`, `max_tokens`, `num_ctx`,
/// `timeout_secs`) are shared with the primary. Connection settings are not.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(from = "FallbackEntry")]
pub struct FallbackConfig {
    pub provider: String,
    pub model: Option<String>,
    pub url: Option<String>,
    /// Defaults to the primary's `api_key_env` when unset.
    pub api_key_env: Option<String>,
}

impl FallbackConfig {
    pub fn named(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: None,
            url: None,
            api_key_env: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FallbackEntry {
    Name(String),
    Table {
        provider: String,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        api_key_env: Option<String>,
    },
}

impl From<FallbackEntry> for FallbackConfig {
    fn from(entry: FallbackEntry) -> Self {
        match entry {
            FallbackEntry::Name(provider) => FallbackConfig::named(provider),
            FallbackEntry::Table {
                provider,
                model,
                url,
                api_key_env,
            } => FallbackConfig {
                provider,
                model,
                url,
                api_key_env,
            },
        }
    }
}

impl GenerationConfig {
    /// Settings for one fallback candidate.
    ///
    /// Provider, model, url and key variable come from `fallback`; model and
    /// url left unset fall back to the provider's own defaults.
    pub fn for_fallback(&self, fallback: &FallbackConfig) -> GenerationConfig {
        GenerationConfig {
            provider: fallback.provider.clone(),
            model: fallback.model.clone(),
            url: fallback.url.clone(),
            api_key_env: fallback
                .api_key_env
                .clone()
                .unwrap_or_else(|| self.api_key_env.clone()),
            fallback: Vec::new(),
            ..self.clone()
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            num_ctx: default_num_ctx(),
            timeout_secs: default_generation_timeout_secs(),
            fallback: Vec::new(),
        }
    }
}

fn default_generation_provider() -> String {
    "openai".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_num_ctx() -> u32 {
    1024
}
fn default_generation_timeout_secs() -> u64 {
    60
}

const EMBEDDING_PROVIDERS: &[&str] = &["hash", "openai", "ollama", "local"];
const GENERATION_PROVIDERS: &[&str] = &["openai", "ollama"];

impl Config {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            anyhow::bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }

        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }

        if !EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be one of: {}.",
                self.embedding.provider,
                EMBEDDING_PROVIDERS.join(", ")
            );
        }
        if self.embedding.dims == Some(0) {
            anyhow::bail!("embedding.dims must be > 0");
        }
        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }

        let fallbacks = self.generation.fallback.iter().map(|f| &f.provider);
        for name in std::iter::once(&self.generation.provider).chain(fallbacks) {
            if !GENERATION_PROVIDERS.contains(&name.as_str()) {
                anyhow::bail!(
                    "Unknown generation provider: '{}'. Must be one of: {}.",
                    name,
                    GENERATION_PROVIDERS.join(", ")
                );
            }
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
        }

        Ok(())
    }
}

/// Parse and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load the config file if it exists, otherwise use defaults; then apply
/// environment overrides.
pub fn load_or_default(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        load_config(path)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    if let Ok(bind) = std::env::var(BIND_ENV) {
        if !bind.trim().is_empty() {
            config.server.bind = bind.trim().to_string();
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.embedding.provider, "hash");
        assert_eq!(config.generation.provider, "openai");
        assert_eq!(config.generation.api_key_env, "OPENAI_API_KEY");
        assert!(config.generation.fallback.is_empty());
    }

    #[test]
    fn test_partial_sections() {
        let config = parse(
            r#"
[chunking]
chunk_size = 800

[generation]
provider = "ollama"
model = "llama3.2:latest"
fallback = ["openai"]
"#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.generation.model.as_deref(), Some("llama3.2:latest"));
        assert_eq!(config.generation.fallback, vec![FallbackConfig::named("openai")]);
    }

    #[test]
    fn test_fallback_tables() {
        let config = parse(
            r#"
[generation]
provider = "openai"
model = "gpt-4o-mini"
url = "https://proxy.example.com"
api_key_env = "PRIMARY_KEY"

[[generation.fallback]]
provider = "ollama"
url = "http://gpu-box:11434"

[[generation.fallback]]
provider = "openai"
model = "gpt-4o"
api_key_env = "BACKUP_KEY"
"#,
        )
        .unwrap();
        assert_eq!(config.generation.fallback.len(), 2);

        let ollama = config.generation.for_fallback(&config.generation.fallback[0]);
        assert_eq!(ollama.provider, "ollama");
        assert_eq!(ollama.model, None);
        assert_eq!(ollama.url.as_deref(), Some("http://gpu-box:11434"));
        assert!(ollama.fallback.is_empty());

        let backup = config.generation.for_fallback(&config.generation.fallback[1]);
        assert_eq!(backup.model.as_deref(), Some("gpt-4o"));
        assert_eq!(backup.url, None);
        assert_eq!(backup.api_key_env, "BACKUP_KEY");
    }

    #[test]
    fn test_bare_fallback_does_not_inherit_primary_connection() {
        let config = parse(
            "[generation]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"\n\
             url = \"https://proxy.example.com\"\nfallback = [\"ollama\"]\n",
        )
        .unwrap();
        let ollama = config.generation.for_fallback(&config.generation.fallback[0]);
        assert_eq!(ollama.provider, "ollama");
        assert_eq!(ollama.model, None);
        assert_eq!(ollama.url, None);
        assert_eq!(ollama.api_key_env, "OPENAI_API_KEY");
        assert_eq!(ollama.num_ctx, config.generation.num_ctx);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let err = parse("[chunking]\nchunk_size = 50\nchunk_overlap = 50\n").unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_zero_top_k_rejected() {
        assert!(parse("[retrieval]\ntop_k = 0\n").is_err());
    }

    #[test]
    fn test_unknown_providers_rejected() {
        assert!(parse("[embedding]\nprovider = \"magic\"\n").is_err());
        assert!(parse("[generation]\nprovider = \"magic\"\n").is_err());
        assert!(parse("[generation]\nfallback = [\"magic\"]\n").is_err());
        assert!(parse("[[generation.fallback]]\nprovider = \"magic\"\n").is_err());
    }

    #[test]
    fn test_temperature_range() {
        assert!(parse("[generation]\ntemperature = 3.5\n").is_err());
        assert!(parse("[generation]\ntemperature = 0.7\n").is_ok());
    }
}

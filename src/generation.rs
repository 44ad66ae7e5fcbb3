//! Text generation backends.
//!
//! A [`Generator`] turns a fully rendered prompt into answer text. Two HTTP
//! backends are provided:
//!
//! - [`OpenAiGenerator`] — hosted chat-completions API (`POST /v1/chat/completions`).
//! - [`OllamaGenerator`] — local Ollama server (`POST /api/generate`).
//!
//! [`FallbackGenerator`] chains several generators and returns the first
//! successful answer. Generators do not retry on their own; the fallback
//! chain is the only recovery path.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::{RagError, Result};

/// Produces answer text for a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    ///
    /// An empty completion is an [`RagError::Upstream`] error.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RagError::Configuration(format!("failed to build HTTP client: {}", e)))
}

fn non_empty(provider: &str, text: Option<&str>, missing: &str) -> Result<String> {
    match text.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        Some(_) => Err(RagError::generation(provider, "empty completion")),
        None => Err(RagError::generation(provider, missing)),
    }
}

// ============ OpenAI ============

pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiGenerator {
    /// Build from config, reading the API key from `config.api_key_env`.
    ///
    /// # Errors
    ///
    /// [`RagError::Configuration`] when the environment variable is unset or blank.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                RagError::Configuration(format!(
                    "{} environment variable not set",
                    config.api_key_env
                ))
            })?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        debug!(url = %url, model = %self.model, "openai generation request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::generation("openai", format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::generation(
                "openai",
                format!("API error {}: {}", status, body),
            ));
        }

        let resp: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::generation("openai", format!("invalid JSON response: {}", e)))?;

        non_empty(
            "openai",
            resp["choices"][0]["message"]["content"].as_str(),
            "missing choices[0].message.content",
        )
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    num_ctx: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "llama3.2:latest".to_string()),
            temperature: config.temperature,
            num_ctx: config.num_ctx,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.url);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_ctx": self.num_ctx,
            },
        });

        debug!(url = %url, model = %self.model, "ollama generation request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::generation("ollama", format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::generation(
                "ollama",
                format!("API error {}: {}", status, body),
            ));
        }

        let resp: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::generation("ollama", format!("invalid JSON response: {}", e)))?;

        non_empty("ollama", resp["response"].as_str(), "missing response field")
    }
}

// ============ Fallback chain ============

/// Tries each candidate in order until one succeeds.
pub struct FallbackGenerator {
    candidates: Vec<Arc<dyn Generator>>,
}

impl FallbackGenerator {
    pub fn new(candidates: Vec<Arc<dyn Generator>>) -> Self {
        Self { candidates }
    }

    /// Like [`Generator::generate`], also returning the name of the
    /// candidate that produced the answer.
    ///
    /// When every candidate fails, the last error is returned.
    pub async fn generate_traced(&self, prompt: &str) -> Result<(String, String)> {
        let mut last_err = None;

        for (position, candidate) in self.candidates.iter().enumerate() {
            match candidate.generate(prompt).await {
                Ok(text) => return Ok((text, candidate.name().to_string())),
                Err(e) => {
                    if position + 1 < self.candidates.len() {
                        warn!(provider = candidate.name(), error = %e, "generator failed, trying next");
                    }
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| RagError::Internal("no generators configured".into())))
    }
}

#[async_trait]
impl Generator for FallbackGenerator {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_traced(prompt).await.map(|(text, _)| text)
    }
}

fn create_one(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => Err(RagError::Configuration(format!(
            "unknown generation provider: {}",
            other
        ))),
    }
}

/// Build the primary generator followed by the configured fallbacks.
///
/// Each fallback is built from its own entry (see
/// [`GenerationConfig::for_fallback`]), so it never talks to the primary's
/// model or URL. Every provider in the chain must initialize; a missing
/// credential for any of them is a [`RagError::Configuration`] error.
pub fn create_generator(config: &GenerationConfig) -> Result<FallbackGenerator> {
    let mut candidates = vec![create_one(config)?];
    for fallback in &config.fallback {
        candidates.push(create_one(&config.for_fallback(fallback))?);
    }
    Ok(FallbackGenerator::new(candidates))
}

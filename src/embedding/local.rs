//! In-process embedding via fastembed.
//!
//! The model is downloaded on first use and then loaded once for the
//! lifetime of the provider. Inference runs on the blocking thread pool.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

const DEFAULT_LOCAL_MODEL: &str = "bge-small-en-v1.5";

pub struct LocalProvider {
    model: Arc<Mutex<fastembed::TextEmbedding>>,
    model_name: String,
    dims: usize,
    batch_size: usize,
}

impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
        let (fastembed_model, default_dims) = local_model(&model_name)?;

        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
        )
        .map_err(|e| {
            RagError::Configuration(format!("failed to initialize local embedding model: {}", e))
        })?;

        tracing::info!(model = %model_name, "local embedding model loaded");

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name,
            dims: config.dims.unwrap_or(default_dims),
            batch_size: config.batch_size,
        })
    }
}

fn local_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    match name {
        "all-minilm-l6-v2" => Ok((fastembed::EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((fastembed::EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((fastembed::EmbeddingModel::BGEBaseENV15, 768)),
        "multilingual-e5-small" => Ok((fastembed::EmbeddingModel::MultilingualE5Small, 384)),
        other => Err(RagError::Configuration(format!(
            "unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, multilingual-e5-small",
            other
        ))),
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let batch_size = self.batch_size;

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| RagError::Internal("local embedding model lock poisoned".into()))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| RagError::embedding("local", format!("inference failed: {}", e)))
        })
        .await
        .map_err(|e| RagError::Internal(format!("embedding task failed: {}", e)))?
    }
}

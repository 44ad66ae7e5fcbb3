//! Per-request orchestration.
//!
//! [`RagPipeline::answer`] drives one request through a fixed sequence of
//! stages:
//!
//! ```text
//! Received → Validated → Chunked → Embedded → Indexed → Retrieved
//!          → Prompted → Generated → Responded
//! ```
//!
//! Any stage can fail. A failure stops the run and is reported as a
//! [`PipelineFailure`] naming the stage, together with whatever language
//! information was already known. Nothing is cached between requests: the
//! similarity index is built from the request's own document and dropped
//! when the request ends.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, warn, Instrument};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::{create_provider, embed_query, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::{create_generator, FallbackGenerator, Generator};
use crate::index::SimilarityIndex;
use crate::language::{detect_language, resolve_target, TargetLanguage};
use crate::models::{Answer, ChatRequest};
use crate::prompt::build_prompt;

/// Position of a request in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Chunked,
    Embedded,
    Indexed,
    Retrieved,
    Prompted,
    Generated,
    Responded,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Chunked => "chunked",
            Stage::Embedded => "embedded",
            Stage::Indexed => "indexed",
            Stage::Retrieved => "retrieved",
            Stage::Prompted => "prompted",
            Stage::Generated => "generated",
            Stage::Responded => "responded",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run that ended in the `Failed` state.
///
/// `stage` is the last stage that completed before the error.
#[derive(Debug)]
pub struct PipelineFailure {
    pub error: RagError,
    pub stage: Stage,
    pub detected_language: Option<String>,
    pub target_language: Option<String>,
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed after {}: {}", self.stage, self.error)
    }
}

impl std::error::Error for PipelineFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Tunables for chunking and retrieval.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let config = Config::default();
        Self::from(&config)
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            top_k: config.retrieval.top_k,
        }
    }
}

/// The question-answering pipeline and its two shared model clients.
pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    generator: FallbackGenerator,
    options: PipelineOptions,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        generators: Vec<Arc<dyn Generator>>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            embedder,
            generator: FallbackGenerator::new(generators),
            options,
        }
    }

    /// Initialize the embedding provider and generator chain from config.
    ///
    /// # Errors
    ///
    /// [`RagError::Configuration`] for a missing credential or an unusable provider.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        debug!(
            embedding = embedder.name(),
            embedding_model = embedder.model_name(),
            generation = %config.generation.provider,
            fallback = ?config.generation.fallback,
            "pipeline initialized"
        );
        Ok(Self {
            embedder,
            generator,
            options: PipelineOptions::from(config),
        })
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Answer `request.query` from `request.text`.
    pub async fn answer(&self, request: ChatRequest) -> std::result::Result<Answer, PipelineFailure> {
        let span = tracing::info_span!("chat", request_id = %Uuid::new_v4());
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: ChatRequest) -> std::result::Result<Answer, PipelineFailure> {
        debug!(stage = %Stage::Received, "request received");

        let (text, query, target) = validate(&request).map_err(|error| {
            warn!(error = %error, "request rejected");
            PipelineFailure {
                error,
                stage: Stage::Received,
                detected_language: None,
                target_language: None,
            }
        })?;

        let detected = detect_language(text);
        debug!(stage = %Stage::Validated, detected, target = target.code, "request validated");

        let mut stage = Stage::Validated;
        match self.process(text, query, &target, &mut stage).await {
            Ok((answer, served_by, chunks_total, chunks_retrieved)) => {
                debug!(stage = %Stage::Responded, served_by = %served_by, "request answered");
                Ok(Answer {
                    answer,
                    detected_language: detected.to_string(),
                    target_language: target.code.to_string(),
                    served_by,
                    chunks_total,
                    chunks_retrieved,
                })
            }
            Err(err) => {
                match &err {
                    RagError::EmptyDocument | RagError::Validation(_) => {
                        warn!(stage = %stage, error = %err, "request failed")
                    }
                    _ => error!(stage = %stage, error = %err, "request failed"),
                }
                Err(PipelineFailure {
                    error: err,
                    stage,
                    detected_language: Some(detected.to_string()),
                    target_language: Some(target.code.to_string()),
                })
            }
        }
    }

    /// Stages Chunked through Generated. `stage` tracks the last one reached.
    async fn process(
        &self,
        text: &str,
        query: &str,
        target: &TargetLanguage,
        stage: &mut Stage,
    ) -> Result<(String, String, usize, usize)> {
        let chunks = chunk_text(text, self.options.chunk_size, self.options.chunk_overlap);
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument);
        }
        let chunks_total = chunks.len();
        *stage = Stage::Chunked;
        debug!(stage = %stage, chunks = chunks_total, "document chunked");

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::embedding(
                self.embedder.name(),
                format!("expected {} vectors, got {}", chunks.len(), vectors.len()),
            ));
        }
        if let Some(v) = vectors.iter().find(|v| v.len() != self.embedder.dims()) {
            return Err(RagError::embedding(
                self.embedder.name(),
                format!(
                    "model '{}' returned {}-dimensional vectors but embedding.dims is {}",
                    self.embedder.model_name(),
                    v.len(),
                    self.embedder.dims()
                ),
            ));
        }
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;
        *stage = Stage::Embedded;
        debug!(stage = %stage, dims = query_vec.len(), "chunks embedded");

        let index = SimilarityIndex::build(chunks.into_iter().zip(vectors).collect())?;
        *stage = Stage::Indexed;
        debug!(stage = %stage, entries = index.len(), dims = index.dims(), "index built");

        let hits = index.top_k(&query_vec, self.options.top_k)?;
        *stage = Stage::Retrieved;
        debug!(
            stage = %stage,
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "chunks retrieved"
        );

        let prompt = build_prompt(&hits, query, target);
        *stage = Stage::Prompted;
        debug!(stage = %stage, prompt_chars = prompt.chars().count(), "prompt built");

        let (answer, served_by) = self.generator.generate_traced(&prompt).await?;
        *stage = Stage::Generated;
        debug!(stage = %stage, answer_chars = answer.chars().count(), "answer generated");

        Ok((answer, served_by, chunks_total, hits.len()))
    }
}

/// Check required fields and resolve the target language.
fn validate(request: &ChatRequest) -> Result<(&str, &str, TargetLanguage)> {
    let text = request
        .text
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| RagError::Validation("text must not be empty".into()))?;
    let query = request
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| RagError::Validation("query must not be empty".into()))?;
    let target = resolve_target(request.target_language.as_deref())?;
    Ok((text, query, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const LANGCHAIN: &str =
        "LangChain is a framework for developing applications powered by language models.";

    /// Echoes the prompt back so tests can inspect what the generator saw.
    struct Echo {
        prompts: Mutex<Vec<String>>,
    }

    impl Echo {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Generator for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(format!("answer based on {} chars", prompt.len()))
        }
    }

    struct Down;

    #[async_trait]
    impl Generator for Down {
        fn name(&self) -> &str {
            "down"
        }
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(RagError::generation("down", "connection refused"))
        }
    }

    /// Reports more dimensions than its vectors actually have.
    struct MisconfiguredEmbedder(HashProvider);

    #[async_trait]
    impl EmbeddingProvider for MisconfiguredEmbedder {
        fn name(&self) -> &str {
            "misconfigured"
        }
        fn model_name(&self) -> &str {
            "hash-16"
        }
        fn dims(&self) -> usize {
            1536
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.0.embed(texts).await
        }
    }

    struct CountingEmbedder {
        inner: HashProvider,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        fn name(&self) -> &str {
            "counting"
        }
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(texts).await
        }
    }

    fn pipeline(generators: Vec<Arc<dyn Generator>>) -> RagPipeline {
        RagPipeline::new(
            Arc::new(HashProvider::default()),
            generators,
            PipelineOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_answer_english_document() {
        let echo = Echo::new();
        let p = pipeline(vec![echo.clone()]);
        let answer = p
            .answer(ChatRequest::new(LANGCHAIN, "What is LangChain?").with_target_language("en"))
            .await
            .unwrap();

        assert!(!answer.answer.is_empty());
        assert_eq!(answer.detected_language, "en");
        assert_eq!(answer.target_language, "en");
        assert_eq!(answer.served_by, "echo");
        assert_eq!(answer.chunks_total, 1);
        assert_eq!(answer.chunks_retrieved, 1);

        let prompts = echo.prompts.lock().unwrap();
        assert!(prompts[0].contains(LANGCHAIN));
        assert!(prompts[0].contains("Question:\nWhat is LangChain?"));
    }

    #[tokio::test]
    async fn test_target_language_reaches_prompt() {
        let echo = Echo::new();
        let p = pipeline(vec![echo.clone()]);
        let answer = p
            .answer(ChatRequest::new(LANGCHAIN, "What is it?").with_target_language("ES"))
            .await
            .unwrap();
        assert_eq!(answer.target_language, "es");
        assert!(echo.prompts.lock().unwrap()[0].contains("in Spanish"));
    }

    #[tokio::test]
    async fn test_retrieval_bounded_by_top_k() {
        let echo = Echo::new();
        let p = RagPipeline::new(
            Arc::new(HashProvider::default()),
            vec![echo.clone()],
            PipelineOptions {
                chunk_size: 60,
                chunk_overlap: 10,
                top_k: 2,
            },
        );
        let text = "Rust has ownership. Borrowing is checked at compile time. \
                    Lifetimes name scopes. Traits describe shared behavior. \
                    Cargo builds crates. Tokio runs async tasks.";
        let answer = p
            .answer(ChatRequest::new(text, "What does Cargo do?"))
            .await
            .unwrap();
        assert!(answer.chunks_total > 2);
        assert_eq!(answer.chunks_retrieved, 2);
    }

    #[tokio::test]
    async fn test_validation_does_no_work() {
        let embedder = Arc::new(CountingEmbedder {
            inner: HashProvider::default(),
            calls: AtomicUsize::new(0),
        });
        let p = RagPipeline::new(embedder.clone(), vec![Echo::new()], PipelineOptions::default());

        for request in [
            ChatRequest::new("", "x"),
            ChatRequest::new("   \n", "x"),
            ChatRequest::new("some text", "  "),
            ChatRequest::default(),
            ChatRequest::new("some text", "q").with_target_language("xx"),
        ] {
            let failure = p.answer(request).await.unwrap_err();
            assert!(matches!(failure.error, RagError::Validation(_)));
            assert_eq!(failure.stage, Stage::Received);
            assert!(failure.detected_language.is_none());
        }
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generator_failure_reports_stage_and_languages() {
        let p = pipeline(vec![Arc::new(Down)]);
        let failure = p
            .answer(
                ChatRequest::new("Le chat est dans la maison.", "Où est le chat ?")
                    .with_target_language("de"),
            )
            .await
            .unwrap_err();
        assert!(matches!(failure.error, RagError::Upstream { stage: "generation", .. }));
        assert_eq!(failure.stage, Stage::Prompted);
        assert_eq!(failure.detected_language.as_deref(), Some("fr"));
        assert_eq!(failure.target_language.as_deref(), Some("de"));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_embedding_failure() {
        let p = RagPipeline::new(
            Arc::new(MisconfiguredEmbedder(HashProvider::new(16))),
            vec![Echo::new()],
            PipelineOptions::default(),
        );
        let failure = p.answer(ChatRequest::new(LANGCHAIN, "What?")).await.unwrap_err();
        assert!(matches!(
            failure.error,
            RagError::Upstream { stage: "embedding", ref message, .. } if message.contains("1536")
        ));
        assert_eq!(failure.stage, Stage::Chunked);
    }

    #[tokio::test]
    async fn test_fallback_records_served_by() {
        let p = pipeline(vec![Arc::new(Down), Echo::new()]);
        let answer = p.answer(ChatRequest::new(LANGCHAIN, "What?")).await.unwrap();
        assert_eq!(answer.served_by, "echo");
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Received.to_string(), "received");
        assert_eq!(Stage::Generated.as_str(), "generated");
    }
}

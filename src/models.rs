//! Core data models used throughout page-rag.
//!
//! These types represent the chunks, retrieval hits, requests and answers
//! that flow through one request. None of them outlive the request that
//! created them.

use serde::{Deserialize, Serialize};

/// A contiguous slice of the source document.
///
/// `start` and `end` are byte offsets into the source text, so
/// `&source[start..end] == text`. Consecutive chunks may overlap:
/// `next.start <= prev.end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// A chunk returned from a similarity query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity to the query vector.
    pub score: f32,
    /// 0-based position in the retrieval result.
    pub rank: usize,
}

/// Body of `POST /chat`.
///
/// Fields are optional at the serde level so that a missing field is
/// reported as a validation error (400) instead of a deserialization
/// rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub target_language: Option<String>,
}

impl ChatRequest {
    pub fn new(text: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            query: Some(query.into()),
            target_language: None,
        }
    }

    pub fn with_target_language(mut self, code: impl Into<String>) -> Self {
        self.target_language = Some(code.into());
        self
    }
}

/// The result of one successful pipeline run.
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub detected_language: String,
    pub target_language: String,
    /// Generator that produced the text (relevant when a fallback chain is configured).
    pub served_by: String,
    pub chunks_total: usize,
    pub chunks_retrieved: usize,
}

/// Body of a successful `POST /chat` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub detected_language: String,
    pub target_language: String,
}

impl From<Answer> for ChatResponse {
    fn from(a: Answer) -> Self {
        Self {
            answer: a.answer,
            detected_language: a.detected_language,
            target_language: a.target_language,
        }
    }
}

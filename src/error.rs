//! Error taxonomy for the RAG pipeline.
//!
//! Every failure the service can produce is a [`RagError`]. The HTTP layer
//! maps each variant to a status code and an error code, and only ever shows
//! [`RagError::public_message`] to clients. The full [`Display`] text, which
//! may include upstream response bodies, goes to the log.
//!
//! | Variant | HTTP | Code |
//! |---------|------|------|
//! | [`Configuration`](RagError::Configuration) | 500 | `not_initialized` |
//! | [`Validation`](RagError::Validation) | 400 | `bad_request` |
//! | [`EmptyDocument`](RagError::EmptyDocument) | 422 | `empty_document` |
//! | [`Upstream`](RagError::Upstream) | 502 | `upstream_error` |
//! | [`Internal`](RagError::Internal) | 500 | `internal` |
//!
//! [`Display`]: std::fmt::Display

use thiserror::Error;

/// Errors that can occur while answering a question about a document.
#[derive(Debug, Error)]
pub enum RagError {
    /// Missing credential or invalid configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request is missing a field or carries an invalid value.
    #[error("{0}")]
    Validation(String),

    /// Chunking the document produced nothing to index.
    #[error("document contains no text to index")]
    EmptyDocument,

    /// The embedding or generation service failed.
    #[error("{stage} provider '{provider}' failed: {message}")]
    Upstream {
        /// Pipeline stage that called out (`"embedding"` or `"generation"`).
        stage: &'static str,
        /// Provider name, e.g. `"openai"`.
        provider: String,
        /// Raw failure description. Never sent to clients.
        message: String,
    },

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    /// Builds an [`Upstream`](RagError::Upstream) error for the embedding stage.
    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            stage: "embedding",
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Builds an [`Upstream`](RagError::Upstream) error for the generation stage.
    pub fn generation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            stage: "generation",
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Machine-readable error code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "not_initialized",
            Self::Validation(_) => "bad_request",
            Self::EmptyDocument => "empty_document",
            Self::Upstream { .. } => "upstream_error",
            Self::Internal(_) => "internal",
        }
    }

    /// Text that is safe to show to a client.
    ///
    /// Validation messages are written by us and pass through unchanged.
    /// Everything else is replaced by a fixed sentence.
    pub fn public_message(&self) -> String {
        match self {
            Self::Configuration(_) => {
                "The service is not configured. Check the server logs.".to_string()
            }
            Self::Validation(msg) => msg.clone(),
            Self::EmptyDocument => "The document contains no text to analyze.".to_string(),
            Self::Upstream { stage, .. } => {
                format!("The {stage} service is unavailable. Please try again later.")
            }
            Self::Internal(_) => "An internal error occurred.".to_string(),
        }
    }
}

/// Convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;

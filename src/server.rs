//! HTTP server for the browser extension.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service description |
//! | `GET`  | `/health` | Health check (status and version) |
//! | `GET`  | `/languages` | Supported target languages |
//! | `POST` | `/chat` | Answer a question about a document |
//!
//! # Error Contract
//!
//! Every non-2xx response has the same shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! `/chat` failures that happen after validation also carry
//! `detected_language` and `target_language`. Messages are always the
//! client-safe text from [`RagError::public_message`].
//!
//! | Status | Code |
//! |--------|------|
//! | 400 | `bad_request` |
//! | 422 | `empty_document` |
//! | 500 | `not_initialized`, `internal` |
//! | 502 | `upstream_error` |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the extension can
//! call the server from any page.
//!
//! # Initialization
//!
//! When the pipeline cannot be built (for example a missing API key), the
//! server still starts: `/` and `/health` answer, while `/chat` and
//! `/languages` return `500 not_initialized`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::RagError;
use crate::language::SUPPORTED_LANGUAGES;
use crate::models::{ChatRequest, ChatResponse};
use crate::pipeline::{PipelineFailure, RagPipeline};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pipeline: Result<Arc<RagPipeline>, Arc<str>>,
}

impl AppState {
    pub fn ready(pipeline: RagPipeline) -> Self {
        Self {
            pipeline: Ok(Arc::new(pipeline)),
        }
    }

    /// State for a server whose pipeline failed to initialize.
    ///
    /// `reason` is logged, never returned to clients.
    pub fn uninitialized(reason: impl Into<String>) -> Self {
        Self {
            pipeline: Err(Arc::from(reason.into())),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.pipeline.is_ok()
    }

    fn pipeline(&self) -> Result<&Arc<RagPipeline>, AppError> {
        self.pipeline.as_ref().map_err(|reason| {
            warn!(reason = %reason, "request refused: pipeline not initialized");
            AppError::from(RagError::Configuration(reason.to_string()))
        })
    }
}

/// Build the router with all routes and the CORS layer.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/languages", get(handle_languages))
        .route("/chat", post(handle_chat))
        .layer(cors)
        .with_state(state)
}

/// Serve on an already-bound listener until ctrl-c.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind` (or `PAGE_RAG_BIND`) and builds the pipeline
/// from config. A pipeline initialization failure is logged and the server
/// runs in the uninitialized state.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = match RagPipeline::from_config(config) {
        Ok(pipeline) => AppState::ready(pipeline),
        Err(e) => {
            error!(error = %e, "pipeline initialization failed; /chat and /languages will return 500");
            AppState::uninitialized(e.to_string())
        }
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "page-rag listening");

    serve(listener, state).await
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    detected_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_language: Option<String>,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    /// Client-safe message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    detected_language: Option<String>,
    target_language: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
            detected_language: self.detected_language,
            target_language: self.target_language,
        };
        (self.status, Json(body)).into_response()
    }
}

/// HTTP status for each error kind.
fn status_for(err: &RagError) -> StatusCode {
    match err {
        RagError::Validation(_) => StatusCode::BAD_REQUEST,
        RagError::EmptyDocument => StatusCode::UNPROCESSABLE_ENTITY,
        RagError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        RagError::Configuration(_) | RagError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        AppError {
            status: status_for(&err),
            code: err.code().to_string(),
            message: err.public_message(),
            detected_language: None,
            target_language: None,
        }
    }
}

impl From<PipelineFailure> for AppError {
    fn from(failure: PipelineFailure) -> Self {
        AppError {
            detected_language: failure.detected_language,
            target_language: failure.target_language,
            ..AppError::from(failure.error)
        }
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError::from(RagError::Validation(message.into()))
}

// ============ GET / ============

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    endpoints: Vec<&'static str>,
    features: Vec<&'static str>,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "page-rag: ask questions about the page you are reading",
        endpoints: vec!["GET /", "GET /health", "GET /languages", "POST /chat"],
        features: vec![
            "retrieval-augmented answers grounded in the submitted document",
            "source language detection",
            "answers in any supported target language",
        ],
    })
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// `"ok"`, or `"degraded"` when the pipeline failed to initialize.
    status: &'static str,
    /// The crate version from `Cargo.toml`.
    version: &'static str,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if state.is_ready() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /languages ============

#[derive(Serialize)]
struct LanguagesResponse {
    languages: BTreeMap<&'static str, &'static str>,
}

async fn handle_languages(
    State(state): State<AppState>,
) -> Result<Json<LanguagesResponse>, AppError> {
    state.pipeline()?;
    Ok(Json(LanguagesResponse {
        languages: SUPPORTED_LANGUAGES.iter().copied().collect(),
    }))
}

// ============ POST /chat ============

/// Handler for `POST /chat`.
///
/// Malformed JSON is a 400 like any other validation failure.
async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let pipeline = state.pipeline()?;
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected malformed /chat body");
        bad_request(format!("invalid request body: {}", rejection.body_text()))
    })?;

    let answer = pipeline.answer(request).await?;
    Ok(Json(ChatResponse::from(answer)))
}

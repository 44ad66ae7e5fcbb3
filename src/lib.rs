//! # page-rag
//!
//! Ask questions about a web page and get answers grounded in its text.
//!
//! A browser extension posts the page text and a question to `POST /chat`.
//! The server splits the text into overlapping chunks, embeds them, retrieves
//! the chunks closest to the question, and asks a language model to answer
//! from those chunks only, in the language the user picked.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌───────────┐   ┌───────────┐
//! │  chunk   │──▶│embedding│──▶│   index   │──▶│  prompt   │
//! │ splitter │   │provider │   │ top-k cos │   │ template  │
//! └──────────┘   └─────────┘   └───────────┘   └─────┬─────┘
//!                                                    ▼
//!  ┌──────────┐        ┌──────────┐           ┌────────────┐
//!  │   HTTP   │───────▶│ pipeline │◀──────────│ generation │
//!  │  server  │        │per request│          │ + fallback │
//!  └──────────┘        └──────────┘           └────────────┘
//! ```
//!
//! Every request builds its own index and drops it afterwards. The only
//! state shared between requests is the embedding provider and the
//! generator chain, both read-only after startup.
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! page-rag serve                                   # listen on 127.0.0.1:8000
//! page-rag ask --file article.txt "What is it about?" --target fr
//! page-rag detect --file article.txt
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Request-scoped similarity index |
//! | [`language`] | Language detection and catalog |
//! | [`prompt`] | Prompt construction |
//! | [`generation`] | Generator backends and fallback chain |
//! | [`pipeline`] | Per-request orchestration |
//! | [`server`] | HTTP server |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod language;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod server;

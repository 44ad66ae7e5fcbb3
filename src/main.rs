//! # page-rag CLI
//!
//! ## Usage
//!
//! ```bash
//! page-rag --config ./config/page-rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `page-rag serve` | Start the HTTP server |
//! | `page-rag ask --file <path> "<question>"` | Answer one question about a file |
//! | `page-rag detect --file <path>` | Show the detected language of a file |
//! | `page-rag languages` | List supported target languages |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `page_rag=info`). A `.env` file in the working directory is
//! loaded before the config.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use page_rag::config::{load_or_default, Config};
use page_rag::language::{detect_language, language_scores, SUPPORTED_LANGUAGES};
use page_rag::models::ChatRequest;
use page_rag::pipeline::RagPipeline;
use page_rag::server::run_server;

/// Question answering over web pages with retrieval-augmented generation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(name = "page-rag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/page-rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server used by the browser extension.
    Serve,

    /// Answer a single question about a text file.
    Ask {
        /// File containing the document text.
        #[arg(long)]
        file: PathBuf,

        /// The question to answer.
        question: String,

        /// Language code for the answer (see `page-rag languages`).
        #[arg(long)]
        target: Option<String>,
    },

    /// Detect the language of a text file.
    Detect {
        #[arg(long)]
        file: PathBuf,
    },

    /// List supported target languages.
    Languages,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("page_rag=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = load(&cli.config)?;
            run_server(&config).await?;
        }
        Commands::Ask {
            file,
            question,
            target,
        } => {
            let config = load(&cli.config)?;
            let text = read_document(&file)?;
            let pipeline = RagPipeline::from_config(&config)?;

            let mut request = ChatRequest::new(text, question);
            if let Some(code) = target {
                request = request.with_target_language(code);
            }

            let answer = pipeline.answer(request).await?;
            println!("{}", answer.answer);
            eprintln!(
                "[{} -> {}, {} of {} chunks, served by {}]",
                answer.detected_language,
                answer.target_language,
                answer.chunks_retrieved,
                answer.chunks_total,
                answer.served_by
            );
        }
        Commands::Detect { file } => {
            let text = read_document(&file)?;
            println!("{}", detect_language(&text));
            for (code, hits) in language_scores(&text) {
                println!("  {:<4} {}", code, hits);
            }
        }
        Commands::Languages => {
            for (code, name) in SUPPORTED_LANGUAGES {
                println!("{:<4} {}", code, name);
            }
        }
    }

    Ok(())
}

fn load(path: &Path) -> anyhow::Result<Config> {
    load_or_default(path).with_context(|| format!("loading config {}", path.display()))
}

fn read_document(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

//! Config file loading from disk.

use page_rag::config::{load_config, load_or_default, FallbackConfig};
use page_rag::pipeline::RagPipeline;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_full_config_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("page-rag.toml");
    fs::write(
        &path,
        r#"
[server]
bind = "0.0.0.0:9000"

[chunking]
chunk_size = 300
chunk_overlap = 30

[retrieval]
top_k = 5

[embedding]
provider = "hash"
dims = 128

[generation]
provider = "ollama"
model = "llama3.2:latest"
num_ctx = 2048
fallback = ["openai"]
"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.server.bind, "0.0.0.0:9000");
    assert_eq!(config.chunking.chunk_size, 300);
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.embedding.dims, Some(128));
    assert_eq!(config.generation.num_ctx, 2048);
    assert_eq!(config.generation.fallback, vec![FallbackConfig::named("openai")]);
}

#[test]
fn test_missing_file_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = load_or_default(&tmp.path().join("absent.toml")).unwrap();
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.retrieval.top_k, 3);
    assert!(load_config(&tmp.path().join("absent.toml")).is_err());
}

#[test]
fn test_invalid_file_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.toml");

    fs::write(&path, "[chunking]\nchunk_size = \"big\"\n").unwrap();
    assert!(load_or_default(&path).is_err());

    fs::write(&path, "[chunking]\nchunk_size = 100\nchunk_overlap = 200\n").unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("chunk_overlap"));
}

#[test]
fn test_pipeline_from_ollama_config() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("page-rag.toml");
    fs::write(
        &path,
        "[generation]\nprovider = \"ollama\"\n\n[retrieval]\ntop_k = 4\n",
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    let pipeline = RagPipeline::from_config(&config).unwrap();
    assert_eq!(pipeline.options().top_k, 4);
}

#[test]
fn test_fallback_table_from_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("page-rag.toml");
    fs::write(
        &path,
        r#"
[generation]
provider = "ollama"
model = "qwen2.5:7b"
url = "http://gpu-box:11434"

[[generation.fallback]]
provider = "ollama"
model = "llama3.2:latest"
"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    let backup = config.generation.for_fallback(&config.generation.fallback[0]);
    assert_eq!(backup.model.as_deref(), Some("llama3.2:latest"));
    assert_eq!(backup.url, None);
    assert!(RagPipeline::from_config(&config).is_ok());
}

//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for one document: raw bytes → format
//! extraction → chunking → embedding → vector store. The whole document is
//! processed synchronously end to end; there is no batching queue and no
//! retry. An extraction failure does not stop the pipeline — the extractor
//! degrades to an inline error marker that is ingested like content — but
//! embedding and store failures propagate to the caller.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::extract::normalize;
use crate::models::RecordMetadata;
use crate::store::VectorStore;

#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub source: String,
    pub chunks: usize,
}

/// Ingest one document from raw bytes.
pub async fn ingest_bytes(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    config: &Config,
    source: &str,
    bytes: &[u8],
    declared_type: &str,
) -> Result<IngestSummary> {
    debug!(source, declared_type, input_bytes = bytes.len(), "ingest start");

    let text = normalize(bytes, declared_type);
    debug!(source, chars = text.chars().count(), "normalized");

    let chunks = chunk_text(
        source,
        &text,
        config.chunking.window_chars,
        config.chunking.overlap_chars,
    );

    if chunks.is_empty() {
        info!(source, "document produced no chunks; nothing stored");
        return Ok(IngestSummary {
            source: source.to_string(),
            chunks: 0,
        });
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder
        .embed(&texts)
        .await
        .with_context(|| format!("embedding failed for '{}'", source))?;
    if let Some(first) = embeddings.first() {
        debug!(source, dims = first.len(), vectors = embeddings.len(), "embedded");
    }

    let metadatas: Vec<RecordMetadata> = chunks.iter().map(RecordMetadata::from_chunk).collect();

    let collection = &config.retrieval.collection;
    store.get_or_create_collection(collection).await?;
    let written = store.add(collection, &embeddings, &metadatas).await?;

    info!(source, chunks = written, "ingest complete");
    Ok(IngestSummary {
        source: source.to_string(),
        chunks: written,
    })
}

/// Ingest a local file. The declared type is the file extension; the source
/// name is the file name.
pub async fn ingest_file(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    config: &Config,
    path: &Path,
) -> Result<IngestSummary> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let declared_type = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_else(|| "txt".to_string());

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();

    ingest_bytes(store, embedder, config, &source, &bytes, &declared_type).await
}

/// Download a remote document and ingest it. The declared type comes from
/// the Content-Type header, falling back to the URL's extension; the URL
/// itself becomes the source name.
pub async fn ingest_url(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    config: &Config,
    url: &str,
) -> Result<IngestSummary> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Failed to download: {}", url))?
        .error_for_status()
        .with_context(|| format!("Failed to download: {}", url))?;

    let declared_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| url_extension(url));

    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read body from: {}", url))?;

    ingest_bytes(store, embedder, config, url, &bytes, &declared_type).await
}

fn url_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('.').next() {
        Some(ext) if !ext.contains('/') => format!(".{}", ext),
        _ => "txt".to_string(),
    }
}

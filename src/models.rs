//! Core data models.
//!
//! These types represent the chunks, stored records, and retrieval results
//! that flow through the ingestion and question-answering pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sanitized window of document text, ready for embedding.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Sanitized chunk text; non-empty after trimming.
    pub text: String,
    /// Originating filename or URL.
    pub source: String,
    /// 0-based position among the *kept* chunks of this source. Windows that
    /// sanitize to empty are dropped without renumbering the window position,
    /// so this sequence is contiguous over emitted chunks only.
    pub index: i64,
    /// Chunk creation time.
    pub timestamp: DateTime<Utc>,
}

/// Metadata persisted alongside each embedding.
///
/// This shape is part of the storage contract: retrieval depends on
/// `source`, `chunk_index`, and `text` being present, and `text` duplicates
/// the chunk so retrieval never needs to re-embed or re-extract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordMetadata {
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
    /// ISO-8601 creation timestamp.
    pub timestamp: String,
}

impl RecordMetadata {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            source: chunk.source.clone(),
            chunk_index: chunk.index,
            text: chunk.text.clone(),
            timestamp: chunk.timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }
}

/// The persisted unit: id + raw text + metadata. Embedding vectors stay
/// inside the store adapter and are not read back on the query path.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    pub id: String,
    pub text: String,
    pub metadata: RecordMetadata,
}

/// A stored record paired with its similarity to a query vector.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: StoredRecord,
    pub score: f32,
}

//! Core domain types.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A search hit with its backend score.
///
/// The score direction is defined by the store that produced the hit:
/// vector stores return distances (smaller is better), keyword search
/// returns relevance (larger is better).
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit<T> {
    /// The matched record.
    pub record: T,

    /// Backend-defined score.
    pub score: f32,
}

impl<T> RankedHit<T> {
    pub fn new(record: T, score: f32) -> Self {
        Self { record, score }
    }
}

/// A chunk of a source document as kept in Storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Identifier shared with the matching [`ChunkIndex`]; the Storage key.
    pub chunk_id: Ulid,

    /// Origin document (file path or caller-assigned id).
    pub source: String,

    /// Chunk text.
    pub content: String,
}

/// The VectorStore side of a chunk: only scalar fields, joined back to
/// Storage by `chunk_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkIndex {
    pub chunk_id: Ulid,
    pub source: String,
}

impl DocumentChunk {
    /// Create a chunk with a fresh identifier.
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            chunk_id: Ulid::new(),
            source: source.into(),
            content: content.into(),
        }
    }

    /// The Storage key for this chunk.
    pub fn key(&self) -> String {
        self.chunk_id.to_string()
    }

    /// The matching VectorStore entry.
    pub fn index(&self) -> ChunkIndex {
        ChunkIndex {
            chunk_id: self.chunk_id,
            source: self.source.clone(),
        }
    }
}

impl ChunkIndex {
    /// The Storage key this entry points at.
    pub fn key(&self) -> String {
        self.chunk_id.to_string()
    }
}

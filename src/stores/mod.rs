//! Vector storage for embedded chunks.
//!
//! [`VectorBackend`] abstracts over the index implementation so the pipeline
//! and retriever never touch vector internals — they observe only chunk
//! metadata, counts, and similarity scores. The shipped backend is
//! [`sqlite::SqliteChunkStore`], which persists to a single SQLite file with
//! `sqlite-vec` providing cosine search.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

pub use sqlite::SqliteChunkStore;

/// Provenance attached to every stored chunk.
///
/// `start_page..end_page` is the owning chapter's span; `chunk_start_page..
/// chunk_end_page` is the estimated sub-range for this chunk, always contained
/// in the chapter span and non-decreasing across a chapter's chunks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub chapter: String,
    pub start_page: u32,
    pub end_page: u32,
    pub chunk_start_page: u32,
    pub chunk_end_page: u32,
}

/// A retrievable unit of text with its provenance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Unique id, assigned at ingestion time.
    pub id: String,
    /// Zero-based position of this chunk within its ingestion unit.
    pub chunk_index: usize,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// A chunk paired with its embedding, ready for insertion.
#[derive(Clone, Debug)]
pub struct EmbeddedChunk {
    pub chunk: StoredChunk,
    pub embedding: Vec<f32>,
}

/// Storage contract for the vector index.
///
/// `insert_chunks` must be durable when it returns: the ingestion pipeline
/// marks a unit done only after the insert call succeeds, and the at-most-once
/// guarantee depends on that ordering. Reads (`search_similar`, `count`) may
/// run concurrently with each other; implementations serialize writes against
/// reads internally.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Appends chunks to the index, creating it on first use. Durable on
    /// return.
    async fn insert_chunks(&self, chunks: Vec<EmbeddedChunk>) -> Result<(), RagError>;

    /// Returns up to `k` chunks ordered most-similar-first, with similarity
    /// scores where higher means more similar.
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(StoredChunk, f32)>, RagError>;

    /// Total number of chunks in the index.
    async fn count(&self) -> Result<usize, RagError>;

    /// All chunks ingested from one source, in insertion order.
    async fn chunks_for_source(&self, source: &str) -> Result<Vec<StoredChunk>, RagError>;
}

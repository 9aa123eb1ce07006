//! ```text
//! Document file ──► document::source ──► pages + optional ToC
//!                                │
//!                 ┌──────────────┴──────────────┐
//!                 ▼                             ▼
//!      document::segmenter              per-page fallback
//!      (chapters over pages)            (no-ToC documents)
//!                 │                             │
//!                 └──────► document::chunker ◄──┘
//!                                │
//!              document::page_map (page-range estimates)
//!                                │
//! ingestion::pipeline ──► embeddings ──► stores::SqliteChunkStore
//!        │ (guarded by ingestion::progress)
//!        ▼
//! Stored vectors ──► retrieval::Retriever ──► retrieval::ContextAssembler
//!                                │
//!                          chat::ChatSession ──► external chat model
//! ```
//!
pub mod chat;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod ingestion;
pub mod retrieval;
pub mod stores;
pub mod types;

pub use chat::{ChatModel, ChatSession, Message};
pub use config::{ChunkingConfig, RetrievalConfig, ScoreOrder};
pub use document::chunker::TextChunker;
pub use document::segmenter::{Chapter, segment_chapters};
pub use document::source::{DocumentSource, Page, PagedTextDocument, TocEntry};
pub use embeddings::EmbeddingProvider;
pub use ingestion::pipeline::{IngestReport, IngestionPipeline};
pub use ingestion::progress::ProgressLog;
pub use retrieval::context::{AssembledContext, ContextAssembler};
pub use retrieval::{RankedChunk, Retriever};
pub use stores::{ChunkMetadata, StoredChunk, VectorBackend};
pub use types::RagError;

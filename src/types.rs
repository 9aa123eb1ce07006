//! Crate-wide error type.

use thiserror::Error;

/// Errors surfaced by the ingestion and retrieval engine.
///
/// The variants follow the failure taxonomy of the pipeline: source problems
/// degrade to fallback strategies where the caller allows it, embedding and
/// storage problems are fatal to the current unit of work, and chat failures
/// are recovered into sentinel replies by [`crate::chat::ChatSession`].
#[derive(Debug, Error)]
pub enum RagError {
    /// The source document could not be read or parsed into pages.
    #[error("source error: {0}")]
    Source(String),

    /// The embedding capability failed for the current unit of work.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The vector store failed to open, persist, or search.
    #[error("storage error: {0}")]
    Storage(String),

    /// A query was issued before any index exists.
    #[error("no index found; run ingestion before querying")]
    IndexMissing,

    /// The chat capability failed or returned a malformed response.
    #[error("chat error: {0}")]
    Chat(String),

    /// Invalid configuration (e.g. chunk overlap >= chunk size).
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

//! Tunable parameters for chunking and retrieval.

use serde::{Deserialize, Serialize};

use crate::types::RagError;

/// Chapter length, in characters, at or below which it embeds whole.
pub const INLINE_EMBED_THRESHOLD: usize = 1000;

/// Characters carried over from the previous page in the no-ToC fallback.
pub const TAIL_OVERLAP_CHARS: usize = 200;

/// Controls how chapter (or page) text is split into embeddable chunks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters repeated from the end of the previous chunk.
    pub chunk_overlap: usize,
    /// Chapters at or below this length embed as a single chunk.
    pub inline_threshold: usize,
    /// Tail carried across page boundaries in the no-ToC fallback.
    pub tail_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            inline_threshold: INLINE_EMBED_THRESHOLD,
            tail_overlap: TAIL_OVERLAP_CHARS,
        }
    }
}

impl ChunkingConfig {
    /// Rejects configurations the chunker cannot make progress with.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Whether a larger or smaller raw score means "more similar".
///
/// The convention depends on the underlying index: cosine similarity grows
/// with relevance, raw distance metrics shrink. The retriever filters against
/// the threshold in the direction this enum declares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrder {
    HigherIsBetter,
    LowerIsBetter,
}

/// Controls candidate fetching, filtering, and ranking at query time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum number of results returned after filtering.
    pub top_k: usize,
    /// Minimum (or maximum, under [`ScoreOrder::LowerIsBetter`]) score a
    /// candidate must have to be considered relevant.
    pub score_threshold: f32,
    /// Score-direction convention of the backing index.
    pub score_order: ScoreOrder,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            score_threshold: 0.3,
            score_order: ScoreOrder::HigherIsBetter,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), RagError> {
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be positive".into()));
        }
        Ok(())
    }

    /// True when `score` passes the threshold under the configured direction.
    pub fn accepts(&self, score: f32) -> bool {
        match self.score_order {
            ScoreOrder::HigherIsBetter => score >= self.score_threshold,
            ScoreOrder::LowerIsBetter => score <= self.score_threshold,
        }
    }
}

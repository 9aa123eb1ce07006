//! Size-driven text splitting with fixed character overlap.

use crate::config::ChunkingConfig;
use crate::types::RagError;

/// Splits text into overlapping windows of at most `chunk_size` characters.
///
/// Each window after the first begins with the last `overlap` characters of
/// its predecessor, preserving local context across cuts. Splitting is purely
/// size-driven; paragraph and sentence boundaries are not consulted.
#[derive(Clone, Debug)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Fails with [`RagError::Config`] unless `overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, RagError> {
        let config = ChunkingConfig {
            chunk_size,
            chunk_overlap: overlap,
            ..Default::default()
        };
        config.validate()?;
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self, RagError> {
        config.validate()?;
        Ok(Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        })
    }

    /// Splits `text` into ordered overlapping windows.
    ///
    /// Boundaries always fall on character boundaries, so multi-byte input is
    /// safe. Empty input produces no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, plus the end of the text.
        let mut boundaries: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
        boundaries.push(text.len());
        let char_count = boundaries.len() - 1;

        if char_count <= self.chunk_size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            let end = (start + self.chunk_size).min(char_count);
            chunks.push(text[boundaries[start]..boundaries[end]].to_string());
            if end == char_count {
                break;
            }
            start = end - self.overlap;
        }
        chunks
    }
}

/// Returns the trailing `max_chars` characters of `text`.
///
/// Used by the per-page fallback to carry context across page boundaries.
pub fn tail(text: &str, max_chars: usize) -> &str {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        return text;
    }
    let (cut, _) = text
        .char_indices()
        .nth(char_count - max_chars)
        .unwrap_or((0, ' '));
    &text[cut..]
}

//! Embedding capability: the narrow seam between the pipeline and whatever
//! model turns text into vectors.

pub mod http;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::types::RagError;

pub use http::HttpEmbeddingProvider;

/// Produces fixed-length vectors for batches of text.
///
/// Implementations must be deterministic per model version: the same text
/// embeds to the same vector for the lifetime of an index. A failure is fatal
/// to the current ingestion unit; the pipeline stops before marking that unit
/// done so a rerun retries it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}

/// Deterministic hash-seeded embeddings for tests and offline demos.
///
/// Identical text always produces the identical vector, different text almost
/// always differs. The call counter lets tests assert how many embedding
/// requests a pipeline actually made.
#[derive(Debug, Default)]
pub struct MockEmbeddingProvider {
    calls: AtomicUsize,
}

impl MockEmbeddingProvider {
    pub const DIMS: usize = 8;

    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `embed_batch` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|text| hash_to_vec(text)).collect())
    }
}

fn hash_to_vec(text: &str) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();
    (0..MockEmbeddingProvider::DIMS)
        .map(|i| {
            let bits = seed.rotate_left((i * 8) as u32) ^ ((i as u64) << 24);
            (bits as f32) / u32::MAX as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let inputs = vec![
            "Hello world".to_string(),
            "Goodbye world".to_string(),
            "Hello world".to_string(),
        ];

        let first = provider.embed_batch(&inputs).await.unwrap();
        let second = provider.embed_batch(&inputs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0], first[2], "identical text, identical vector");
        assert_ne!(first[0], first[1], "different text, different vector");
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn mock_vectors_have_fixed_dims() {
        let provider = MockEmbeddingProvider::new();
        let vectors = provider.embed_batch(&["x".to_string()]).await.unwrap();
        assert_eq!(vectors[0].len(), MockEmbeddingProvider::DIMS);
    }
}

//! Query-time retrieval: candidate fetch, score filtering, and ranking.

pub mod context;

use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::{RetrievalConfig, ScoreOrder};
use crate::embeddings::EmbeddingProvider;
use crate::stores::{StoredChunk, VectorBackend};
use crate::types::RagError;

pub use context::{AssembledContext, ContextAssembler};

/// A retrieved chunk with its similarity score.
#[derive(Clone, Debug)]
pub struct RankedChunk {
    pub chunk: StoredChunk,
    pub score: f32,
}

/// Fetches, filters, and ranks chunks for a query.
///
/// The index is over-fetched at `2 × top_k` so that threshold filtering still
/// leaves enough candidates; survivors are ordered most-similar-first and
/// capped at `top_k`. An empty result after filtering is a valid outcome —
/// "no evidence found" — not an error. Querying before anything was ingested
/// is [`RagError::IndexMissing`].
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorBackend>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorBackend>,
        config: RetrievalConfig,
    ) -> Result<Self, RagError> {
        config.validate()?;
        Ok(Self {
            embedder,
            store,
            config,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Returns up to `top_k` above-threshold chunks, most similar first.
    pub async fn search(&self, query: &str) -> Result<Vec<RankedChunk>, RagError> {
        if self.store.count().await? == 0 {
            return Err(RagError::IndexMissing);
        }

        let vectors = self.embedder.embed_batch(&[query.to_string()]).await?;
        let embedding = vectors
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("no vector returned for query".into()))?;

        let fetch = self.config.top_k * 2;
        let candidates = self.store.search_similar(&embedding, fetch).await?;
        tracing::debug!(
            candidates = candidates.len(),
            fetch,
            "vector search returned"
        );

        let mut ranked: Vec<RankedChunk> = candidates
            .into_iter()
            .filter(|(_, score)| self.config.accepts(*score))
            .map(|(chunk, score)| RankedChunk { chunk, score })
            .collect();

        ranked.sort_by(|a, b| {
            let ordering = a
                .score
                .partial_cmp(&b.score)
                .unwrap_or(Ordering::Equal);
            match self.config.score_order {
                ScoreOrder::HigherIsBetter => ordering.reverse(),
                ScoreOrder::LowerIsBetter => ordering,
            }
        });
        ranked.truncate(self.config.top_k);

        tracing::debug!(results = ranked.len(), "retrieval complete");
        Ok(ranked)
    }
}

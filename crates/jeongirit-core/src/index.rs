//! Per-request in-memory similarity index.
//!
//! A [`SimilarityIndex`] is built once per upload from the document's
//! chunks, queried any number of times, and dropped with the request.
//! Search is brute-force cosine similarity, which is plenty for a single
//! document's worth of chunks.

use tracing::debug;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{Error, Result};
use crate::models::{Chunk, RetrievalResult};

struct IndexEntry {
    vector: Vec<f32>,
    chunk: Chunk,
}

/// Mapping from embedding vectors to the chunks they were computed from.
///
/// Invariant: exactly one vector per chunk, in chunk order.
pub struct SimilarityIndex {
    entries: Vec<IndexEntry>,
}

impl SimilarityIndex {
    /// Embeds `chunks` in batches of `batch_size` and builds the index.
    ///
    /// Provider failures are not retried here; they surface as
    /// [`Error::EmbeddingProvider`].
    pub async fn build(
        embedder: &dyn Embedder,
        chunks: Vec<Chunk>,
        batch_size: usize,
    ) -> Result<Self> {
        let batch_size = batch_size.max(1);
        let mut vectors = Vec::with_capacity(chunks.len());

        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            debug!(batch = batch_no, size = texts.len(), model = embedder.model_name(), "embedding batch");
            let embedded = embedder.embed_batch(&texts).await.map_err(Error::embedding)?;
            if embedded.len() != texts.len() {
                return Err(Error::EmbeddingProvider(format!(
                    "provider returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                )));
            }
            vectors.extend(embedded);
        }

        Self::from_parts(chunks, vectors)
    }

    /// Assembles an index from precomputed vectors.
    ///
    /// # Errors
    ///
    /// [`Error::EmbeddingProvider`] if the counts differ or the vectors do
    /// not share one dimensionality.
    pub fn from_parts(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(Error::EmbeddingProvider(format!(
                "{} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        if let Some(first) = vectors.first() {
            let dims = first.len();
            if vectors.iter().any(|v| v.len() != dims) {
                return Err(Error::EmbeddingProvider(
                    "embedding vectors have inconsistent dimensions".to_string(),
                ));
            }
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { vector, chunk })
            .collect();
        Ok(Self { entries })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the `min(k, len)` chunks most similar to `query_vec`, best first.
    ///
    /// Ties keep document order, so results are deterministic for a given
    /// index and query vector.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `k == 0`.
    pub fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be >= 1".to_string()));
        }

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(query_vec, &e.vector), e))
            .collect();

        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then(a.1.chunk.sequence_index.cmp(&b.1.chunk.sequence_index))
        });
        scored.truncate(k.min(self.entries.len()));

        Ok(scored
            .into_iter()
            .map(|(score, e)| RetrievalResult {
                chunk: e.chunk.clone(),
                score,
            })
            .collect())
    }

    /// Iterates over the indexed chunks in document order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }
}

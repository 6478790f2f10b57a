//! Question → top-k chunk retrieval over a [`SimilarityIndex`].

use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::index::SimilarityIndex;
use crate::models::RetrievalResult;

/// Embeds questions and looks them up in a per-request index.
///
/// The retriever adds no randomness: identical index and query embedding
/// always yield the same results in the same order.
pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self { embedder }
    }

    /// Returns up to `min(k, index.len())` results, most similar first.
    ///
    /// `k` is validated before the question is embedded, so an invalid `k`
    /// never costs a provider call.
    pub async fn query(
        &self,
        index: &SimilarityIndex,
        question: &str,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be >= 1".to_string()));
        }
        if index.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed_one(question)
            .await
            .map_err(Error::embedding)?;
        index.search(&query_vec, k)
    }
}

//! Error taxonomy shared by every core component.
//!
//! Provider traits ([`Embedder`](crate::embedding::Embedder),
//! [`ChatModel`](crate::llm::ChatModel)) return `anyhow::Result`; the
//! components that call them map failures into the typed variants below
//! so callers can tell bad input apart from upstream failures.

use thiserror::Error;

/// Errors produced by the document-QA and chat pipelines.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad chunking or pipeline parameters (e.g. `overlap >= chunk_size`).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A caller-supplied value is out of range (retrieval `k`, unknown role,
    /// empty question, unsolvable calculator input).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The embedding provider failed (network, auth, rate limit, bad response).
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// The chat-completion provider failed.
    #[error("completion provider error: {0}")]
    CompletionProvider(String),

    /// Model output was not the structured shape that was asked for.
    #[error("parse error: {0}")]
    Parse(String),

    /// A generated image could not be encoded.
    #[error("render error: {0}")]
    Render(String),
}

impl Error {
    /// Wraps an embedding provider failure, keeping the full cause chain.
    pub fn embedding(err: anyhow::Error) -> Self {
        Error::EmbeddingProvider(format!("{:#}", err))
    }

    /// Wraps a completion provider failure, keeping the full cause chain.
    pub fn completion(err: anyhow::Error) -> Self {
        Error::CompletionProvider(format!("{:#}", err))
    }

    /// True for failures caused by an upstream provider rather than the caller.
    pub fn is_provider(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingProvider(_) | Error::CompletionProvider(_)
        )
    }
}

/// Convenience result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

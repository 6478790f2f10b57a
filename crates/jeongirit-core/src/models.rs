//! Core data models that flow through the document-QA pipeline.
//!
//! Everything here is scoped to a single request: pages are extracted from
//! one upload, chunked, indexed, queried, and dropped when the answer has
//! been produced.

use serde::Serialize;

/// Text of a single extracted page.
///
/// `index` is 0-based, as reported by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub index: u32,
    pub text: String,
}

/// A passage of document text sized for embedding and retrieval.
///
/// Chunks are immutable once created. `page_number` keeps the extractor's
/// 0-based page index; conversion to the 1-based display number happens
/// only when a [`Citation`] is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub source_id: String,
    pub page_number: Option<u32>,
    pub sequence_index: usize,
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Source reference attached to an extractive answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    /// 1-based page number for display, or `None` when the page is unknown.
    pub page: Option<u32>,
    /// Name of the uploaded file the chunk came from.
    pub source: String,
}

impl Citation {
    /// Builds a citation from a chunk, shifting its 0-based page to 1-based.
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            page: chunk.page_number.map(|p| p + 1),
            source: chunk.source_id.clone(),
        }
    }
}

/// Final answer returned by the synthesizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerPackage {
    pub answer_text: String,
    /// Citations in retrieval order. Always empty in summary mode.
    pub citations: Vec<Citation>,
}

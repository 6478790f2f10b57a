//! Separator-aware text chunker with fixed character overlap.
//!
//! Splits extracted document text into overlapping passages for embedding.
//! Lengths and overlaps are counted in Unicode scalar values, so multibyte
//! text (Korean, unit symbols such as `Ω` or `°C`) never splits inside a
//! character.
//!
//! # Algorithm
//!
//! 1. If the remaining text fits in `chunk_size`, emit it and stop.
//! 2. Otherwise look for a break point inside the window
//!    `(start + overlap, start + chunk_size]`, trying each separator in
//!    priority order and taking its last occurrence. The break falls right
//!    after the separator, so the separator stays with the earlier chunk.
//! 3. The empty separator `""` means a hard cut at `start + chunk_size`.
//! 4. The next chunk starts `overlap` characters before the break.
//!
//! Because every chunk after the first starts exactly `overlap` characters
//! before the previous break, dropping the first `overlap` characters of each
//! later chunk and concatenating reproduces the input exactly.
//!
//! # Example
//!
//! ```rust
//! use jeongirit_core::chunk::{split, DEFAULT_SEPARATORS};
//!
//! let chunks = split("Ohm's law.\n\nKirchhoff's laws.", 16, 4, &DEFAULT_SEPARATORS).unwrap();
//! assert_eq!(chunks[0], "Ohm's law.\n\n");
//! assert!(chunks.iter().all(|c| c.chars().count() <= 16));
//! ```

use crate::error::{Error, Result};
use crate::models::{Chunk, PageText};

/// Separator priority: paragraph, line, sentence end, word, hard cut.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Chunking parameters, validated on construction.
#[derive(Debug, Clone)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl ChunkParams {
    /// Creates parameters with the [`DEFAULT_SEPARATORS`].
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        validate(chunk_size, overlap)?;
        Ok(Self {
            chunk_size,
            overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replaces the separator priority list.
    pub fn with_separators<S: AsRef<str>>(mut self, separators: &[S]) -> Self {
        self.separators = separators.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn separators(&self) -> &[String] {
        &self.separators
    }
}

fn validate(chunk_size: usize, overlap: usize) -> Result<()> {
    if overlap >= chunk_size {
        return Err(Error::Configuration(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

/// Splits `raw_text` into overlapping chunks.
///
/// Empty input yields an empty vector.
///
/// # Errors
///
/// [`Error::Configuration`] if `overlap >= chunk_size`.
pub fn split<S: AsRef<str>>(
    raw_text: &str,
    chunk_size: usize,
    overlap: usize,
    separators: &[S],
) -> Result<Vec<String>> {
    validate(chunk_size, overlap)?;

    let chars: Vec<char> = raw_text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    let seps: Vec<Vec<char>> = separators
        .iter()
        .map(|s| s.as_ref().chars().collect())
        .collect();

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        if chars.len() - start <= chunk_size {
            chunks.push(chars[start..].iter().collect());
            break;
        }
        let end = find_break(&chars, start, chunk_size, overlap, &seps);
        chunks.push(chars[start..end].iter().collect());
        start = end - overlap;
    }

    Ok(chunks)
}

/// Returns the exclusive end of the chunk starting at `start`.
///
/// The result is always in `(start + overlap, start + chunk_size]`, which
/// guarantees forward progress.
fn find_break(
    chars: &[char],
    start: usize,
    chunk_size: usize,
    overlap: usize,
    seps: &[Vec<char>],
) -> usize {
    let window_end = start + chunk_size;
    let min_end = start + overlap + 1;

    for sep in seps {
        if sep.is_empty() {
            return window_end;
        }
        if sep.len() > chunk_size {
            continue;
        }
        let mut pos = window_end - sep.len();
        loop {
            let end = pos + sep.len();
            if end < min_end {
                break;
            }
            if chars[pos..end] == sep[..] {
                return end;
            }
            if pos == start {
                break;
            }
            pos -= 1;
        }
    }

    window_end
}

/// Chunks every page of a document.
///
/// Pages are split independently so that each chunk maps to one page.
/// Blank pages are skipped. `sequence_index` is contiguous across the whole
/// document, starting at 0.
pub fn chunk_pages(pages: &[PageText], source_id: &str, params: &ChunkParams) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();

    for page in pages {
        if page.text.trim().is_empty() {
            continue;
        }
        for text in split(&page.text, params.chunk_size, params.overlap, &params.separators)? {
            chunks.push(Chunk {
                text,
                source_id: source_id.to_string(),
                page_number: Some(page.index),
                sequence_index: chunks.len(),
            });
        }
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(c);
            } else {
                out.extend(c.chars().skip(overlap));
            }
        }
        out
    }

    fn sample_text() -> String {
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(&format!(
                "Section {}. The inverter efficiency η is 97.5% at 25 °C. THD stays below 3% at pf 0.95.",
                i
            ));
            text.push_str(if i % 3 == 0 { "\n\n" } else if i % 3 == 1 { "\n" } else { " " });
        }
        text
    }

    #[test]
    fn test_empty_text() {
        let chunks = split("", 100, 10, &DEFAULT_SEPARATORS).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = split("Hello, world!", 100, 10, &DEFAULT_SEPARATORS).unwrap();
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_overlap_not_smaller_than_size_is_config_error() {
        let err = split("abc", 10, 10, &DEFAULT_SEPARATORS).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        let err = split("abc", 10, 25, &DEFAULT_SEPARATORS).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(ChunkParams::new(0, 0).is_err());
    }

    #[test]
    fn test_lossless_reconstruction() {
        let text = sample_text();
        for &(size, overlap) in &[(50, 0), (50, 10), (120, 40), (200, 199), (7, 3), (1200, 200)] {
            let chunks = split(&text, size, overlap, &DEFAULT_SEPARATORS).unwrap();
            assert_eq!(
                reconstruct(&chunks, overlap),
                text,
                "size={} overlap={}",
                size,
                overlap
            );
        }
    }

    #[test]
    fn test_chunk_lengths_within_size() {
        let text = sample_text();
        let chunks = split(&text, 120, 30, &DEFAULT_SEPARATORS).unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 120, "chunk too long: {}", c.chars().count());
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap_exactly() {
        let text = sample_text();
        let overlap = 25;
        let chunks = split(&text, 150, overlap, &DEFAULT_SEPARATORS).unwrap();
        for pair in chunks.windows(2) {
            let tail: String = {
                let chars: Vec<char> = pair[0].chars().collect();
                chars[chars.len() - overlap..].iter().collect()
            };
            let head: String = pair[1].chars().take(overlap).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let text = "First paragraph here.\n\nSecond one. It has two sentences.";
        let chunks = split(text, 40, 0, &DEFAULT_SEPARATORS).unwrap();
        assert_eq!(chunks[0], "First paragraph here.\n\n");
    }

    #[test]
    fn test_falls_back_to_word_boundary() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = split(text, 20, 0, &DEFAULT_SEPARATORS).unwrap();
        for c in &chunks[..chunks.len() - 1] {
            assert!(c.ends_with(' '), "expected word boundary in {:?}", c);
        }
    }

    #[test]
    fn test_hard_cut_for_unbroken_text() {
        let text = "x".repeat(95);
        let chunks = split(&text, 30, 5, &DEFAULT_SEPARATORS).unwrap();
        assert_eq!(chunks[0].len(), 30);
        assert_eq!(reconstruct(&chunks, 5), text);
    }

    #[test]
    fn test_multibyte_characters() {
        let text = "전압은 12V이고 저항은 220Ω입니다.\n\n효율 η는 97%입니다. ".repeat(10);
        let chunks = split(&text, 17, 4, &DEFAULT_SEPARATORS).unwrap();
        assert_eq!(reconstruct(&chunks, 4), text);
        for c in &chunks {
            assert!(c.chars().count() <= 17);
        }
    }

    #[test]
    fn test_restartable() {
        let text = sample_text();
        let a = split(&text, 90, 15, &DEFAULT_SEPARATORS).unwrap();
        let b = split(&text, 90, 15, &DEFAULT_SEPARATORS).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_chunk_pages_assigns_pages_and_sequence() {
        let params = ChunkParams::new(30, 5).unwrap();
        let pages = vec![
            PageText { index: 0, text: "Page one talks about voltage dividers and loads.".into() },
            PageText { index: 1, text: "   \n ".into() },
            PageText { index: 2, text: "Page three covers RLC resonance.".into() },
        ];
        let chunks = chunk_pages(&pages, "notes.pdf", &params).unwrap();
        assert!(chunks.len() >= 3);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.sequence_index, i);
            assert_eq!(c.source_id, "notes.pdf");
            assert_ne!(c.page_number, Some(1));
        }
        assert_eq!(chunks[0].page_number, Some(0));
        assert_eq!(chunks.last().unwrap().page_number, Some(2));
    }

    #[test]
    fn test_custom_separators() {
        let params = ChunkParams::new(12, 0).unwrap().with_separators(&[";", ""]);
        let pages = vec![PageText { index: 0, text: "aa;bbbbbbbbbbbbbbbb".into() }];
        let chunks = chunk_pages(&pages, "s", &params).unwrap();
        assert_eq!(chunks[0].text, "aa;");
    }
}

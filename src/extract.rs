//! Page-level text extraction for uploaded documents.
//!
//! Uploads arrive as bytes plus an optional content type and file name;
//! this module returns the document's pages as UTF-8 text with 0-based
//! page indices. PDFs go through `pdf-extract` page by page; plain text
//! and Markdown become a single page 0.

use jeongirit_core::models::PageText;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// Extraction error. Never a panic: malformed input is reported here.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("uploaded file is empty")]
    Empty,
}

/// Document formats this module can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

/// Decides the format from the content type, then the file extension,
/// then a `%PDF` magic prefix.
pub fn detect_kind(
    bytes: &[u8],
    content_type: Option<&str>,
    file_name: Option<&str>,
) -> Result<DocumentKind, ExtractError> {
    // Drop parameters such as "; charset=utf-8"
    let mime = content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

    match mime.as_deref() {
        Some(MIME_PDF) => return Ok(DocumentKind::Pdf),
        Some(MIME_TEXT) | Some(MIME_MARKDOWN) => return Ok(DocumentKind::Text),
        _ => {}
    }

    let extension = file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("pdf") => return Ok(DocumentKind::Pdf),
        Some("txt") | Some("md") | Some("markdown") => return Ok(DocumentKind::Text),
        _ => {}
    }

    if bytes.starts_with(b"%PDF") {
        return Ok(DocumentKind::Pdf);
    }

    Err(ExtractError::UnsupportedContentType(
        mime.or(extension)
            .unwrap_or_else(|| "unknown".to_string()),
    ))
}

/// Extracts the pages of an uploaded document.
pub fn extract_pages(
    bytes: &[u8],
    content_type: Option<&str>,
    file_name: Option<&str>,
) -> Result<Vec<PageText>, ExtractError> {
    if bytes.is_empty() {
        return Err(ExtractError::Empty);
    }
    match detect_kind(bytes, content_type, file_name)? {
        DocumentKind::Pdf => extract_pdf_pages(bytes),
        DocumentKind::Text => Ok(vec![PageText {
            index: 0,
            text: String::from_utf8_lossy(bytes).into_owned(),
        }]),
    }
}

fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<PageText>, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| PageText {
            index: i as u32,
            text,
        })
        .collect())
}

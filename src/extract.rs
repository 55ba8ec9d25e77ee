//! Text extraction for uploaded documents (PDF, plain text, Markdown).
//!
//! Extraction is build-path only: the background indexing job supplies the
//! stored file path and the declared content type; this module returns a
//! single plain-text blob. PDF pages are preceded by a `--- Page N ---`
//! marker so page attribution survives chunking.

use std::path::Path;

use crate::error::{DocChatError, Result};

/// Supported MIME types for extraction.
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_MD: &str = "text/md";

enum FileKind {
    Pdf,
    Text,
}

/// Dispatch on the declared content type, falling back to the file
/// extension. Runs before any I/O so unsupported types fail fast.
fn classify(path: &Path, content_type: &str) -> Result<FileKind> {
    match content_type {
        MIME_PDF => return Ok(FileKind::Pdf),
        MIME_TEXT | MIME_MARKDOWN | MIME_MD => return Ok(FileKind::Text),
        _ => {}
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => Ok(FileKind::Pdf),
        Some("txt") | Some("md") | Some("markdown") => Ok(FileKind::Text),
        _ => Err(DocChatError::UnsupportedType {
            content_type: content_type.to_string(),
        }),
    }
}

/// Extract a document's full text from its stored file.
pub fn extract_text(path: &Path, content_type: &str) -> Result<String> {
    match classify(path, content_type)? {
        FileKind::Pdf => extract_pdf(path),
        FileKind::Text => extract_plain(path),
    }
}

fn extract_pdf(path: &Path) -> Result<String> {
    let doc = lopdf::Document::load(path)
        .map_err(|e| DocChatError::Extraction(format!("failed to parse PDF: {}", e)))?;

    let mut full_text = String::new();
    for (&page_number, _) in doc.get_pages().iter() {
        let page_text = doc.extract_text(&[page_number]).map_err(|e| {
            DocChatError::Extraction(format!(
                "failed to extract text from PDF page {}: {}",
                page_number, e
            ))
        })?;
        full_text.push_str(&format!("\n--- Page {} ---\n", page_number));
        full_text.push_str(&page_text);
    }
    Ok(full_text)
}

fn extract_plain(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| DocChatError::Extraction(format!("failed to read file: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|_| DocChatError::Extraction("file is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn unsupported_type_fails_before_io() {
        // Path does not exist; classification must reject first.
        let err = extract_text(Path::new("/nonexistent/file.bin"), "application/octet-stream")
            .unwrap_err();
        assert!(matches!(err, DocChatError::UnsupportedType { .. }));
    }

    #[test]
    fn extension_fallback_covers_markdown() {
        let mut f = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        f.write_all(b"# Title\n\nbody text").unwrap();
        let text = extract_text(f.path(), "application/x-unknown-but-md").unwrap();
        assert!(text.contains("# Title"));
    }

    #[test]
    fn plain_text_roundtrip() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all("line one\nline two\n".as_bytes()).unwrap();
        let text = extract_text(f.path(), MIME_TEXT).unwrap();
        assert_eq!(text, "line one\nline two\n");
    }

    #[test]
    fn invalid_utf8_is_extraction_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0xff, 0xfe, 0x00, 0x41]).unwrap();
        let err = extract_text(f.path(), MIME_TEXT).unwrap_err();
        assert!(matches!(err, DocChatError::Extraction(_)));
    }

    #[test]
    fn invalid_pdf_is_extraction_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"not a pdf at all").unwrap();
        let err = extract_text(f.path(), MIME_PDF).unwrap_err();
        assert!(matches!(err, DocChatError::Extraction(_)));
    }

    #[test]
    fn missing_file_is_extraction_error() {
        let err = extract_text(Path::new("/nonexistent/notes.txt"), MIME_TEXT).unwrap_err();
        assert!(matches!(err, DocChatError::Extraction(_)));
    }
}

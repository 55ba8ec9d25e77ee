//! Error taxonomy for the document chat pipeline.
//!
//! Build-path errors ([`DocChatError::UnsupportedType`],
//! [`DocChatError::Extraction`], [`DocChatError::IndexBuild`]) are caught at
//! the background-job boundary and recorded on the document row. Query-path
//! errors surface synchronously to the caller; the HTTP layer maps them to
//! status codes so "your input is invalid" is distinguishable from
//! "the system failed".

use thiserror::Error;

/// Main error type for the document chat service.
#[derive(Error, Debug)]
pub enum DocChatError {
    /// Declared content type is not in the supported set. Raised before any I/O.
    #[error("unsupported content type: {content_type}")]
    UnsupportedType { content_type: String },

    /// File could not be read or parsed into text.
    #[error("text extraction failed: {0}")]
    Extraction(String),

    /// Index construction failed (empty input after filtering, or backend failure).
    #[error("index build failed: {0}")]
    IndexBuild(String),

    /// No built index exists for the document.
    #[error("no index found for document {document_id}")]
    IndexNotFound { document_id: String },

    /// A per-document search failed; the whole query is aborted.
    #[error("error searching documents: {0}")]
    Retrieval(String),

    /// The language-model backend failed; no automatic retry.
    #[error("error generating response: {0}")]
    Generation(String),

    /// One or more session documents are not in the `ready` state.
    #[error("documents are not ready: {}", titles.join(", "))]
    NotReady { titles: Vec<String> },

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Request parameters are outside their allowed ranges.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Database errors.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// I/O errors.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocChatError {
    /// Stable machine-readable code used in the HTTP error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            DocChatError::UnsupportedType { .. } => "unsupported_type",
            DocChatError::Extraction(_) => "extraction_failed",
            DocChatError::IndexBuild(_) => "index_build_failed",
            DocChatError::IndexNotFound { .. } => "index_not_found",
            DocChatError::Retrieval(_) => "retrieval_failed",
            DocChatError::Generation(_) => "generation_failed",
            DocChatError::NotReady { .. } => "not_ready",
            DocChatError::NotFound(_) => "not_found",
            DocChatError::InvalidRequest(_) => "bad_request",
            DocChatError::Storage(_) => "internal",
            DocChatError::Io(_) => "internal",
        }
    }

    /// Whether the error indicates a caller problem rather than a system fault.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DocChatError::UnsupportedType { .. }
                | DocChatError::NotReady { .. }
                | DocChatError::NotFound(_)
                | DocChatError::InvalidRequest(_)
        )
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, DocChatError>;

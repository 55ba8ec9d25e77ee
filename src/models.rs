//! Core data models used throughout the document chat pipeline.
//!
//! These types represent the documents, sessions, messages, and search
//! results that flow through the indexing and query paths, plus the
//! request/response shapes honored at the API boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DocChatError, Result};

/// Lifecycle state of an uploaded document.
///
/// A document's index is searchable only when the status is [`Ready`];
/// the query path enforces this before any search.
///
/// [`Ready`]: DocumentStatus::Ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Indexing,
    Ready,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Indexing => "indexing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DocumentStatus::Pending),
            "indexing" => Some(DocumentStatus::Indexing),
            "ready" => Some(DocumentStatus::Ready),
            "error" => Some(DocumentStatus::Error),
            _ => None,
        }
    }
}

/// A user-uploaded document stored in SQLite.
///
/// Created on upload with status `pending`; mutated only by the background
/// indexing job; destroyed on explicit deletion, which also removes its
/// on-disk index artifacts and any sessions referencing it.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub file_path: String,
    pub content_type: String,
    pub file_size: i64,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    /// Key of the on-disk index artifact set, set once indexing succeeds.
    pub index_key: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A chat session binding one or more documents to a conversation.
///
/// `document_ids` is the single canonical representation: a non-empty
/// ordered set, with single-document sessions being the size-1 case.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub document_ids: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Who produced a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One turn in a session. Immutable once written; destroyed only via
/// session cascade.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    /// Attributed context chunks, present on assistant turns only.
    pub context_chunks: Option<Vec<String>>,
    pub created_at: i64,
}

/// A single result from one per-document index query.
///
/// Normalized at the index engine boundary: whatever shape the underlying
/// retrieval structure produces, callers only ever see this.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// 1-based position within the per-document result list.
    pub rank: usize,
    pub text: String,
    pub score: f32,
}

// ============ API boundary shapes ============

/// Response to a document upload. Indexing continues in the background.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub document_id: String,
    pub filename: String,
    pub status: DocumentStatus,
    pub message: String,
}

/// Request to create a chat session over one or more ready documents.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionCreateRequest {
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// A session together with its transcript, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}

/// A RAG query against a session.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub session_id: String,
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_similarity: Option<f32>,
    /// Custom system instruction. When present it fully replaces the
    /// built-in prompt template text.
    #[serde(default)]
    pub system_instruction: Option<String>,
}

fn default_top_k() -> usize {
    5
}

impl QueryRequest {
    /// Validate parameter ranges: `top_k` in 1–20, `min_similarity` in [0, 1].
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(DocChatError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        if !(1..=20).contains(&self.top_k) {
            return Err(DocChatError::InvalidRequest(format!(
                "top_k must be between 1 and 20, got {}",
                self.top_k
            )));
        }
        if let Some(threshold) = self.min_similarity {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(DocChatError::InvalidRequest(format!(
                    "min_similarity must be between 0.0 and 1.0, got {}",
                    threshold
                )));
            }
        }
        Ok(())
    }
}

/// The timed, attributable answer to a query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub context_chunks: Vec<String>,
    pub session_id: String,
    pub message_id: String,
    pub query_timestamp: DateTime<Utc>,
    pub response_timestamp: DateTime<Utc>,
    pub elapsed_seconds: f64,
}

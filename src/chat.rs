//! Answer orchestration: validate → retrieve → generate → persist → respond.
//!
//! [`ChatEngine`] is the top-level query flow. Its collaborators (index
//! engine, chat model) are injected at construction; there are no global
//! instances. Timing fields in the response are computed here, not by the
//! model or storage layers.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{DocChatError, Result};
use crate::index::IndexEngine;
use crate::llm::ChatModel;
use crate::models::{DocumentStatus, QueryRequest, QueryResponse};
use crate::prompt::assemble_prompt;
use crate::retrieval;
use crate::store;

/// How many stored messages are fed to the prompt assembler (which then
/// keeps the most recent turns).
const HISTORY_FETCH_LIMIT: i64 = 10;

/// Top-level RAG query engine.
pub struct ChatEngine {
    pool: SqlitePool,
    index: Arc<IndexEngine>,
    model: Arc<dyn ChatModel>,
    default_min_similarity: f32,
}

impl ChatEngine {
    pub fn new(
        pool: SqlitePool,
        index: Arc<IndexEngine>,
        model: Arc<dyn ChatModel>,
        default_min_similarity: f32,
    ) -> Self {
        Self {
            pool,
            index,
            model,
            default_min_similarity,
        }
    }

    /// Answer one query against a session.
    ///
    /// On success the user/assistant message pair has been persisted
    /// atomically. On any error nothing is persisted and the error carries
    /// enough detail to distinguish invalid input from system failure.
    pub async fn answer(&self, request: &QueryRequest) -> Result<QueryResponse> {
        request.validate()?;

        let started = Instant::now();
        let query_timestamp = Utc::now();

        // Validate: session exists, all documents exist and are ready.
        let session = store::get_session(&self.pool, &request.session_id)
            .await?
            .ok_or_else(|| {
                DocChatError::NotFound(format!("chat session {}", request.session_id))
            })?;

        let documents = store::get_documents(&self.pool, &session.document_ids).await?;
        if documents.len() != session.document_ids.len() {
            return Err(DocChatError::NotFound(
                "one or more session documents".to_string(),
            ));
        }
        let not_ready: Vec<String> = documents
            .iter()
            .filter(|d| d.status != DocumentStatus::Ready)
            .map(|d| d.title.clone())
            .collect();
        if !not_ready.is_empty() {
            return Err(DocChatError::NotReady { titles: not_ready });
        }

        // Retrieve: merged, attributed evidence under the threshold.
        let threshold = request
            .min_similarity
            .unwrap_or(self.default_min_similarity);
        let hits = retrieval::retrieve(
            &self.index,
            &documents,
            &request.query,
            request.top_k,
            threshold,
        )
        .await?;
        let context_chunks: Vec<String> = hits.iter().map(|h| h.context_line()).collect();

        // Generate: assemble the prompt and call the model once.
        let history = store::recent_messages(&self.pool, &session.id, HISTORY_FETCH_LIMIT).await?;
        let prompt = assemble_prompt(
            &request.query,
            &hits,
            &history,
            request.system_instruction.as_deref(),
        );
        let answer = self
            .model
            .generate(&prompt)
            .await
            .map_err(|e| DocChatError::Generation(e.to_string()))?;

        // Persist: the message pair, atomically.
        let message_id = store::append_exchange(
            &self.pool,
            &session.id,
            &request.query,
            &answer,
            &context_chunks,
        )
        .await?;

        let response_timestamp = Utc::now();
        Ok(QueryResponse {
            answer,
            context_chunks,
            session_id: session.id,
            message_id,
            query_timestamp,
            response_timestamp,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        })
    }
}

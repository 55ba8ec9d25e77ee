//! Cross-document retrieval merging.
//!
//! Runs the index engine's search over every document bound to a session,
//! tags each hit with its source document title, then filters, re-ranks, and
//! truncates the pooled results. The `top_k` cap is global across all
//! documents, not per document, so one highly relevant document can crowd
//! out the others.

use crate::error::{DocChatError, Result};
use crate::index::IndexEngine;
use crate::models::{Document, SearchHit};

/// A search hit tagged with the document it came from.
#[derive(Debug, Clone)]
pub struct AttributedHit {
    pub source_document: String,
    pub rank: usize,
    pub text: String,
    pub score: f32,
}

impl AttributedHit {
    fn new(source_document: &str, hit: SearchHit) -> Self {
        Self {
            source_document: source_document.to_string(),
            rank: hit.rank,
            text: hit.text,
            score: hit.score,
        }
    }

    /// The serialized context form stored on assistant messages and shown
    /// to the model: `[From: <title>] <text>`.
    pub fn context_line(&self) -> String {
        format!("[From: {}] {}", self.source_document, self.text)
    }
}

/// Search every document and merge the results into one ranked evidence set.
///
/// Any per-document search failure aborts the whole query with
/// [`DocChatError::Retrieval`]; no partial result is returned.
pub async fn retrieve(
    index: &IndexEngine,
    documents: &[Document],
    query: &str,
    top_k: usize,
    min_similarity: f32,
) -> Result<Vec<AttributedHit>> {
    let mut pooled: Vec<AttributedHit> = Vec::new();
    for document in documents {
        let hits = index
            .search(&document.id, query, top_k)
            .await
            .map_err(|e| {
                DocChatError::Retrieval(format!(
                    "search failed for document '{}': {}",
                    document.title, e
                ))
            })?;
        pooled.extend(
            hits.into_iter()
                .map(|h| AttributedHit::new(&document.title, h)),
        );
    }
    Ok(merge_hits(pooled, top_k, min_similarity))
}

/// Filter by threshold, sort by score descending, and truncate to `top_k`.
///
/// A threshold of 0.0 means no filtering, matching the process-wide default.
pub fn merge_hits(
    mut pooled: Vec<AttributedHit>,
    top_k: usize,
    min_similarity: f32,
) -> Vec<AttributedHit> {
    if min_similarity > 0.0 {
        pooled.retain(|h| h.score >= min_similarity);
    }
    pooled.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    pooled.truncate(top_k);
    pooled
}

//! Document lifecycle: upload, background indexing, deletion.
//!
//! Uploads return immediately with status `pending`; the extract → chunk →
//! build pipeline runs out-of-band and communicates completion solely
//! through the document row's `status` and `error_message` fields. The job
//! owns its own pool handle; nothing request-scoped crosses the async
//! boundary.

use chrono::Utc;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::error::{DocChatError, Result};
use crate::extract::{extract_text, MIME_MARKDOWN, MIME_MD, MIME_PDF, MIME_TEXT};
use crate::index::IndexEngine;
use crate::models::{Document, DocumentStatus};
use crate::store;

/// Content types accepted for upload.
const ALLOWED_TYPES: &[&str] = &[MIME_PDF, MIME_TEXT, MIME_MARKDOWN, MIME_MD];

/// Persist an uploaded file and create its document row with status
/// `pending`. Indexing is the caller's next step (see [`index_document`]).
pub async fn save_upload(
    pool: &SqlitePool,
    uploads_dir: &Path,
    filename: &str,
    content_type: &str,
    title: Option<String>,
    bytes: &[u8],
) -> Result<Document> {
    if !ALLOWED_TYPES.contains(&content_type) {
        return Err(DocChatError::UnsupportedType {
            content_type: content_type.to_string(),
        });
    }

    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled");
    let title = title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| stem.to_string());

    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let stored_name = format!("{}{}", Uuid::new_v4(), extension);

    std::fs::create_dir_all(uploads_dir)?;
    let file_path = uploads_dir.join(stored_name);
    std::fs::write(&file_path, bytes)?;

    let now = Utc::now().timestamp();
    let document = Document {
        id: Uuid::new_v4().to_string(),
        title,
        filename: filename.to_string(),
        file_path: file_path.to_string_lossy().into_owned(),
        content_type: content_type.to_string(),
        file_size: bytes.len() as i64,
        status: DocumentStatus::Pending,
        error_message: None,
        index_key: None,
        created_at: now,
        updated_at: now,
    };
    store::insert_document(pool, &document).await?;
    Ok(document)
}

/// Background indexing job for one document.
///
/// Transitions the row `pending → indexing → ready | error`. Failures are
/// recorded on the row and never propagated; the upload caller already
/// received its `pending` response.
pub async fn index_document(
    pool: SqlitePool,
    index: Arc<IndexEngine>,
    chunking: ChunkingConfig,
    document_id: String,
) {
    let document = match store::get_document(&pool, &document_id).await {
        Ok(Some(doc)) => doc,
        Ok(None) => return,
        Err(e) => {
            eprintln!("indexing {}: failed to load document: {}", document_id, e);
            return;
        }
    };

    if let Err(e) =
        store::set_document_status(&pool, &document_id, DocumentStatus::Indexing, None).await
    {
        eprintln!("indexing {}: failed to set status: {}", document_id, e);
        return;
    }

    let outcome = build_index(&index, &chunking, &document).await;

    let update = match outcome {
        Ok(index_key) => store::mark_document_ready(&pool, &document_id, &index_key).await,
        Err(e) => {
            store::set_document_status(
                &pool,
                &document_id,
                DocumentStatus::Error,
                Some(&e.to_string()),
            )
            .await
        }
    };
    if let Err(e) = update {
        eprintln!("indexing {}: failed to record outcome: {}", document_id, e);
    }
}

async fn build_index(
    index: &IndexEngine,
    chunking: &ChunkingConfig,
    document: &Document,
) -> Result<String> {
    let text = extract_text(Path::new(&document.file_path), &document.content_type)?;
    let chunks = chunk_text(&text, chunking.chunk_size, chunking.overlap_lines);
    let outcome = index.build(&document.id, &chunks).await?;
    Ok(outcome.index_key)
}

/// Delete a document: its sessions (with their messages), its stored file,
/// its index artifacts, and finally its row.
pub async fn delete_document(
    pool: &SqlitePool,
    index: &IndexEngine,
    document_id: &str,
) -> Result<()> {
    let document = store::get_document(pool, document_id)
        .await?
        .ok_or_else(|| DocChatError::NotFound(format!("document {}", document_id)))?;

    for session in store::sessions_referencing(pool, document_id).await? {
        store::delete_session(pool, &session.id).await?;
    }

    // Best-effort cleanup of on-disk artifacts; the row deletion is what
    // makes the document disappear from the API.
    if let Err(e) = std::fs::remove_file(&document.file_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            eprintln!("deleting {}: failed to remove file: {}", document_id, e);
        }
    }
    if let Err(e) = index.delete(document_id) {
        eprintln!("deleting {}: failed to remove index: {}", document_id, e);
    }

    store::delete_document_row(pool, document_id).await?;
    Ok(())
}

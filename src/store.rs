//! CRUD operations over documents, chat sessions, and chat messages.
//!
//! Sessions carry their document set as a JSON-serialized list in the
//! `document_ids` column. The message pair for a successful query is written
//! in a single transaction so the transcript never contains orphaned turns.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{DocChatError, Result};
use crate::models::{ChatMessage, ChatSession, Document, DocumentStatus, Role};

// ============ Documents ============

pub async fn insert_document(pool: &SqlitePool, doc: &Document) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO documents (id, title, filename, file_path, content_type, file_size, status, error_message, index_key, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.title)
    .bind(&doc.filename)
    .bind(&doc.file_path)
    .bind(&doc.content_type)
    .bind(doc.file_size)
    .bind(doc.status.as_str())
    .bind(&doc.error_message)
    .bind(&doc.index_key)
    .bind(doc.created_at)
    .bind(doc.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Option<Document>> {
    let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(|r| document_from_row(&r)).transpose()
}

/// Fetch documents preserving the order of `ids`. Missing ids are skipped;
/// callers that need all of them compare lengths.
pub async fn get_documents(pool: &SqlitePool, ids: &[String]) -> Result<Vec<Document>> {
    let mut docs = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(doc) = get_document(pool, id).await? {
            docs.push(doc);
        }
    }
    Ok(docs)
}

pub async fn list_documents(pool: &SqlitePool) -> Result<Vec<Document>> {
    let rows = sqlx::query("SELECT * FROM documents ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(document_from_row).collect()
}

pub async fn set_document_status(
    pool: &SqlitePool,
    id: &str,
    status: DocumentStatus,
    error_message: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE documents SET status = ?, error_message = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(error_message)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_document_ready(pool: &SqlitePool, id: &str, index_key: &str) -> Result<()> {
    sqlx::query(
        "UPDATE documents SET status = 'ready', error_message = NULL, index_key = ?, updated_at = ? WHERE id = ?",
    )
    .bind(index_key)
    .bind(Utc::now().timestamp())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_document_row(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Sessions whose document set contains the given document id.
pub async fn sessions_referencing(pool: &SqlitePool, document_id: &str) -> Result<Vec<ChatSession>> {
    let sessions = list_sessions(pool).await?;
    Ok(sessions
        .into_iter()
        .filter(|s| s.document_ids.iter().any(|d| d == document_id))
        .collect())
}

// ============ Sessions ============

/// Create a session over the given documents.
///
/// Every referenced document must exist and be `ready` at creation time;
/// staleness afterward is tolerated and re-checked per query.
pub async fn create_session(
    pool: &SqlitePool,
    document_ids: &[String],
    title: Option<String>,
) -> Result<ChatSession> {
    if document_ids.is_empty() {
        return Err(DocChatError::InvalidRequest(
            "document_ids must not be empty".to_string(),
        ));
    }

    let documents = get_documents(pool, document_ids).await?;
    if documents.len() != document_ids.len() {
        return Err(DocChatError::NotFound(
            "one or more documents".to_string(),
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

    let title = title.unwrap_or_else(|| {
        if documents.len() == 1 {
            format!("Chat about {}", documents[0].title)
        } else {
            format!("Chat about {} documents", documents.len())
        }
    });

    let now = Utc::now().timestamp();
    let session = ChatSession {
        id: Uuid::new_v4().to_string(),
        title,
        document_ids: document_ids.to_vec(),
        created_at: now,
        updated_at: now,
    };
    insert_session(pool, &session).await?;
    Ok(session)
}

pub async fn insert_session(pool: &SqlitePool, session: &ChatSession) -> Result<()> {
    let document_ids = serde_json::to_string(&session.document_ids)
        .map_err(|e| DocChatError::InvalidRequest(e.to_string()))?;
    sqlx::query(
        "INSERT INTO sessions (id, title, document_ids, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&session.id)
    .bind(&session.title)
    .bind(document_ids)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_session(pool: &SqlitePool, id: &str) -> Result<Option<ChatSession>> {
    let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(|r| session_from_row(&r)).transpose()
}

pub async fn list_sessions(pool: &SqlitePool) -> Result<Vec<ChatSession>> {
    let rows = sqlx::query("SELECT * FROM sessions ORDER BY updated_at DESC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(session_from_row).collect()
}

/// Delete a session and cascade to its messages.
pub async fn delete_session(pool: &SqlitePool, id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM messages WHERE session_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

// ============ Messages ============

/// Append the user/assistant pair for one successful query as a single
/// atomic unit, and bump the session's `updated_at`. Returns the assistant
/// message id.
pub async fn append_exchange(
    pool: &SqlitePool,
    session_id: &str,
    user_content: &str,
    answer: &str,
    context_chunks: &[String],
) -> Result<String> {
    let now = Utc::now().timestamp();
    let chunks_json = serde_json::to_string(context_chunks)
        .map_err(|e| DocChatError::Retrieval(e.to_string()))?;
    let assistant_id = Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO messages (id, session_id, role, content, context_chunks, created_at) VALUES (?, ?, 'user', ?, NULL, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(session_id)
    .bind(user_content)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO messages (id, session_id, role, content, context_chunks, created_at) VALUES (?, ?, 'assistant', ?, ?, ?)",
    )
    .bind(&assistant_id)
    .bind(session_id)
    .bind(answer)
    .bind(chunks_json)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(assistant_id)
}

pub async fn list_messages(pool: &SqlitePool, session_id: &str) -> Result<Vec<ChatMessage>> {
    let rows =
        sqlx::query("SELECT * FROM messages WHERE session_id = ? ORDER BY created_at ASC, rowid ASC")
            .bind(session_id)
            .fetch_all(pool)
            .await?;
    rows.iter().map(message_from_row).collect()
}

/// The `limit` most recent messages of a session, in chronological order.
pub async fn recent_messages(
    pool: &SqlitePool,
    session_id: &str,
    limit: i64,
) -> Result<Vec<ChatMessage>> {
    let rows = sqlx::query(
        "SELECT * FROM messages WHERE session_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
    )
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    let mut messages: Vec<ChatMessage> = rows
        .iter()
        .map(message_from_row)
        .collect::<Result<Vec<_>>>()?;
    messages.reverse();
    Ok(messages)
}

// ============ Row mapping ============

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
    let status_text: String = row.get("status");
    let status = DocumentStatus::parse(&status_text).ok_or_else(|| {
        DocChatError::InvalidRequest(format!("unknown document status: {}", status_text))
    })?;
    Ok(Document {
        id: row.get("id"),
        title: row.get("title"),
        filename: row.get("filename"),
        file_path: row.get("file_path"),
        content_type: row.get("content_type"),
        file_size: row.get("file_size"),
        status,
        error_message: row.get("error_message"),
        index_key: row.get("index_key"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn session_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ChatSession> {
    let document_ids_json: String = row.get("document_ids");
    let document_ids: Vec<String> = serde_json::from_str(&document_ids_json)
        .map_err(|e| DocChatError::InvalidRequest(format!("corrupt document_ids: {}", e)))?;
    Ok(ChatSession {
        id: row.get("id"),
        title: row.get("title"),
        document_ids,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn message_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ChatMessage> {
    let role_text: String = row.get("role");
    let role = Role::parse(&role_text)
        .ok_or_else(|| DocChatError::InvalidRequest(format!("unknown role: {}", role_text)))?;
    let context_chunks: Option<String> = row.get("context_chunks");
    let context_chunks = context_chunks
        .map(|json| serde_json::from_str::<Vec<String>>(&json))
        .transpose()
        .map_err(|e| DocChatError::InvalidRequest(format!("corrupt context_chunks: {}", e)))?;
    Ok(ChatMessage {
        id: row.get("id"),
        session_id: row.get("session_id"),
        role,
        content: row.get("content"),
        context_chunks,
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn test_pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        pool
    }

    fn make_document(id: &str, title: &str, status: DocumentStatus) -> Document {
        Document {
            id: id.to_string(),
            title: title.to_string(),
            filename: format!("{}.md", title),
            file_path: format!("/tmp/{}.md", id),
            content_type: "text/markdown".to_string(),
            file_size: 42,
            status,
            error_message: None,
            index_key: None,
            created_at: 1000,
            updated_at: 1000,
        }
    }

    #[tokio::test]
    async fn document_roundtrip() {
        let pool = test_pool().await;
        let doc = make_document("d1", "Alpha", DocumentStatus::Pending);
        insert_document(&pool, &doc).await.unwrap();

        let fetched = get_document(&pool, "d1").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Alpha");
        assert_eq!(fetched.status, DocumentStatus::Pending);

        mark_document_ready(&pool, "d1", "doc_d1").await.unwrap();
        let fetched = get_document(&pool, "d1").await.unwrap().unwrap();
        assert_eq!(fetched.status, DocumentStatus::Ready);
        assert_eq!(fetched.index_key.as_deref(), Some("doc_d1"));
    }

    #[tokio::test]
    async fn create_session_requires_ready_documents() {
        let pool = test_pool().await;
        insert_document(&pool, &make_document("d1", "Alpha", DocumentStatus::Ready))
            .await
            .unwrap();
        insert_document(
            &pool,
            &make_document("d2", "Beta", DocumentStatus::Indexing),
        )
        .await
        .unwrap();

        let err = create_session(&pool, &["d1".to_string(), "d2".to_string()], None)
            .await
            .unwrap_err();
        match err {
            DocChatError::NotReady { titles } => assert_eq!(titles, vec!["Beta".to_string()]),
            other => panic!("expected NotReady, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn session_title_defaults() {
        let pool = test_pool().await;
        insert_document(&pool, &make_document("d1", "Alpha", DocumentStatus::Ready))
            .await
            .unwrap();
        insert_document(&pool, &make_document("d2", "Beta", DocumentStatus::Ready))
            .await
            .unwrap();

        let single = create_session(&pool, &["d1".to_string()], None).await.unwrap();
        assert_eq!(single.title, "Chat about Alpha");

        let multi = create_session(&pool, &["d1".to_string(), "d2".to_string()], None)
            .await
            .unwrap();
        assert_eq!(multi.title, "Chat about 2 documents");
    }

    #[tokio::test]
    async fn append_exchange_writes_pair_atomically() {
        let pool = test_pool().await;
        insert_document(&pool, &make_document("d1", "Alpha", DocumentStatus::Ready))
            .await
            .unwrap();
        let session = create_session(&pool, &["d1".to_string()], None).await.unwrap();

        let chunks = vec!["[From: Alpha] first chunk".to_string()];
        let assistant_id = append_exchange(&pool, &session.id, "what?", "this.", &chunks)
            .await
            .unwrap();

        let messages = list_messages(&pool, &session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert!(messages[0].context_chunks.is_none());
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].id, assistant_id);
        assert_eq!(messages[1].context_chunks.as_ref().unwrap(), &chunks);
    }

    #[tokio::test]
    async fn recent_messages_returns_chronological_tail() {
        let pool = test_pool().await;
        insert_document(&pool, &make_document("d1", "Alpha", DocumentStatus::Ready))
            .await
            .unwrap();
        let session = create_session(&pool, &["d1".to_string()], None).await.unwrap();

        for i in 0..4 {
            append_exchange(&pool, &session.id, &format!("q{}", i), &format!("a{}", i), &[])
                .await
                .unwrap();
        }

        let recent = recent_messages(&pool, &session.id, 4).await.unwrap();
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].content, "q2");
        assert_eq!(recent[1].content, "a2");
        assert_eq!(recent[2].content, "q3");
        assert_eq!(recent[3].content, "a3");
    }

    #[tokio::test]
    async fn delete_session_cascades_to_messages() {
        let pool = test_pool().await;
        insert_document(&pool, &make_document("d1", "Alpha", DocumentStatus::Ready))
            .await
            .unwrap();
        let session = create_session(&pool, &["d1".to_string()], None).await.unwrap();
        append_exchange(&pool, &session.id, "q", "a", &[]).await.unwrap();

        delete_session(&pool, &session.id).await.unwrap();
        assert!(get_session(&pool, &session.id).await.unwrap().is_none());
        assert!(list_messages(&pool, &session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_referencing_matches_membership() {
        let pool = test_pool().await;
        insert_document(&pool, &make_document("d1", "Alpha", DocumentStatus::Ready))
            .await
            .unwrap();
        insert_document(&pool, &make_document("d2", "Beta", DocumentStatus::Ready))
            .await
            .unwrap();
        let s1 = create_session(&pool, &["d1".to_string()], None).await.unwrap();
        let _s2 = create_session(&pool, &["d2".to_string()], None).await.unwrap();

        let referencing = sessions_referencing(&pool, "d1").await.unwrap();
        assert_eq!(referencing.len(), 1);
        assert_eq!(referencing[0].id, s1.id);
    }
}

//! End-to-end pipeline tests: upload → background indexing → session →
//! query, run in-process with deterministic stub backends.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use docchat::chat::ChatEngine;
use docchat::config::{ChunkingConfig, IndexConfig};
use docchat::embedding::EmbeddingClient;
use docchat::error::DocChatError;
use docchat::index::IndexEngine;
use docchat::ingest;
use docchat::llm::ChatModel;
use docchat::migrate;
use docchat::models::{ChatSession, DocumentStatus, QueryRequest};
use docchat::store;

/// Deterministic embedder: a bag-of-words vector over three marker words,
/// so relevance follows keyword counts.
struct KeywordEmbedder;

#[async_trait]
impl EmbeddingClient for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                vec![
                    t.matches("alpha").count() as f32,
                    t.matches("beta").count() as f32,
                    t.matches("gamma").count() as f32,
                    1.0,
                ]
            })
            .collect())
    }
}

/// Stub model that records the prompt it was given.
struct CapturingModel {
    last_prompt: Mutex<Option<String>>,
}

impl CapturingModel {
    fn new() -> Self {
        Self {
            last_prompt: Mutex::new(None),
        }
    }

    fn prompt(&self) -> String {
        self.last_prompt.lock().unwrap().clone().expect("no prompt captured")
    }
}

#[async_trait]
impl ChatModel for CapturingModel {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok("stub answer".to_string())
    }
}

struct TestEnv {
    _tmp: TempDir,
    pool: SqlitePool,
    index: Arc<IndexEngine>,
    model: Arc<CapturingModel>,
    engine: ChatEngine,
    uploads_dir: PathBuf,
    chunking: ChunkingConfig,
}

async fn setup(chunk_size: usize) -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("docchat.sqlite");

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    let index = Arc::new(IndexEngine::new(
        Arc::new(KeywordEmbedder),
        IndexConfig {
            root: tmp.path().join("index"),
            backend: "ollama".to_string(),
            device: "cpu".to_string(),
            batch_size: 8,
            default_min_similarity: 0.0,
        },
    ));
    let model = Arc::new(CapturingModel::new());
    let engine = ChatEngine::new(pool.clone(), index.clone(), model.clone(), 0.0);

    TestEnv {
        uploads_dir: tmp.path().join("uploads"),
        chunking: ChunkingConfig {
            chunk_size,
            overlap_lines: 3,
        },
        _tmp: tmp,
        pool,
        index,
        model,
        engine,
    }
}

/// Upload and index a document, waiting for the background job to finish.
async fn upload_and_index(env: &TestEnv, filename: &str, content_type: &str, body: &[u8]) -> String {
    let doc = ingest::save_upload(
        &env.pool,
        &env.uploads_dir,
        filename,
        content_type,
        None,
        body,
    )
    .await
    .unwrap();
    assert_eq!(doc.status, DocumentStatus::Pending);

    ingest::index_document(
        env.pool.clone(),
        env.index.clone(),
        env.chunking.clone(),
        doc.id.clone(),
    )
    .await;
    doc.id
}

fn query(session_id: &str, text: &str, top_k: usize) -> QueryRequest {
    QueryRequest {
        session_id: session_id.to_string(),
        query: text.to_string(),
        top_k,
        min_similarity: None,
        system_instruction: None,
    }
}

#[tokio::test]
async fn small_markdown_upload_end_to_end() {
    let env = setup(1000).await;

    // Three lines, well under the chunk size: exactly one chunk.
    let doc_id = upload_and_index(
        &env,
        "notes.md",
        "text/markdown",
        b"# Notes\nalpha topics are covered here\nand nothing else",
    )
    .await;

    let doc = store::get_document(&env.pool, &doc_id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Ready);
    assert_eq!(doc.index_key.as_deref(), Some(format!("doc_{}", doc_id).as_str()));
    assert!(env.index.exists(&doc_id));

    let session = store::create_session(&env.pool, &[doc_id.clone()], None)
        .await
        .unwrap();
    assert_eq!(session.title, "Chat about notes");

    let response = env
        .engine
        .answer(&query(&session.id, "what alpha topics?", 5))
        .await
        .unwrap();

    assert_eq!(response.answer, "stub answer");
    assert_eq!(response.context_chunks.len(), 1);
    assert!(response.context_chunks[0].starts_with("[From: notes]"));
    assert!(response.elapsed_seconds > 0.0);
    assert!(response.response_timestamp >= response.query_timestamp);

    // The exchange was persisted as a pair.
    let messages = store::list_messages(&env.pool, &session.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "what alpha topics?");
    assert_eq!(messages[1].id, response.message_id);
    assert_eq!(
        messages[1].context_chunks.as_ref().unwrap(),
        &response.context_chunks
    );
}

#[tokio::test]
async fn highly_relevant_document_can_crowd_out_another() {
    // Small chunk size so document A yields several chunks.
    let env = setup(60).await;

    let a_body: String = (0..20)
        .map(|i| format!("alpha item {:02}", i))
        .collect::<Vec<_>>()
        .join("\n");
    let a_id = upload_and_index(&env, "a.txt", "text/plain", a_body.as_bytes()).await;
    let b_id = upload_and_index(
        &env,
        "b.txt",
        "text/plain",
        b"gamma appendix\nnothing about the topic\nmore gamma notes",
    )
    .await;

    let session = store::create_session(&env.pool, &[a_id, b_id], None)
        .await
        .unwrap();
    assert_eq!(session.title, "Chat about 2 documents");

    let mut request = query(&session.id, "alpha", 3);
    request.min_similarity = Some(0.0);
    let response = env.engine.answer(&request).await.unwrap();

    assert_eq!(response.context_chunks.len(), 3);
    for chunk in &response.context_chunks {
        assert!(chunk.starts_with("[From: a]"), "expected A to crowd out B: {}", chunk);
    }
}

#[tokio::test]
async fn query_against_not_ready_documents_persists_nothing() {
    let env = setup(1000).await;

    let doc = ingest::save_upload(
        &env.pool,
        &env.uploads_dir,
        "slow.md",
        "text/markdown",
        None,
        b"still indexing",
    )
    .await
    .unwrap();

    // Session inserted directly: readiness is re-checked per query.
    let session = ChatSession {
        id: "s-stale".to_string(),
        title: "stale".to_string(),
        document_ids: vec![doc.id.clone()],
        created_at: 0,
        updated_at: 0,
    };
    store::insert_session(&env.pool, &session).await.unwrap();

    let err = env
        .engine
        .answer(&query(&session.id, "anything", 5))
        .await
        .unwrap_err();
    match err {
        DocChatError::NotReady { titles } => assert_eq!(titles, vec!["slow".to_string()]),
        other => panic!("expected NotReady, got {:?}", other),
    }

    assert!(store::list_messages(&env.pool, &session.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn deleting_a_document_cascades_and_invalidates_its_index() {
    let env = setup(1000).await;

    let doc_id = upload_and_index(&env, "doomed.md", "text/markdown", b"alpha content").await;
    let session = store::create_session(&env.pool, &[doc_id.clone()], None)
        .await
        .unwrap();
    env.engine
        .answer(&query(&session.id, "alpha?", 5))
        .await
        .unwrap();

    ingest::delete_document(&env.pool, &env.index, &doc_id)
        .await
        .unwrap();

    assert!(store::get_document(&env.pool, &doc_id).await.unwrap().is_none());
    assert!(store::get_session(&env.pool, &session.id).await.unwrap().is_none());
    assert!(store::list_messages(&env.pool, &session.id)
        .await
        .unwrap()
        .is_empty());

    let err = env.index.search(&doc_id, "alpha", 5).await.unwrap_err();
    assert!(matches!(err, DocChatError::IndexNotFound { .. }));
}

#[tokio::test]
async fn custom_instruction_replaces_the_default_template() {
    let env = setup(1000).await;

    let doc_id = upload_and_index(&env, "doc.md", "text/markdown", b"alpha facts").await;
    let session = store::create_session(&env.pool, &[doc_id], None).await.unwrap();

    let mut request = query(&session.id, "alpha?", 5);
    request.system_instruction = Some("Reply with exactly one word.".to_string());
    env.engine.answer(&request).await.unwrap();

    let prompt = env.model.prompt();
    assert!(prompt.contains("Reply with exactly one word."));
    assert!(!prompt.contains("based ONLY on the provided context"));
}

#[tokio::test]
async fn unsupported_upload_type_is_rejected_before_saving() {
    let env = setup(1000).await;

    let err = ingest::save_upload(
        &env.pool,
        &env.uploads_dir,
        "image.png",
        "image/png",
        None,
        b"\x89PNG",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DocChatError::UnsupportedType { .. }));
    assert!(store::list_documents(&env.pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn extraction_failure_is_recorded_on_the_document_row() {
    let env = setup(1000).await;

    // Declared as markdown but not valid UTF-8: the job must park the
    // document in the error state instead of propagating.
    let doc_id = upload_and_index(&env, "broken.md", "text/markdown", &[0xff, 0xfe, 0x00]).await;

    let doc = store::get_document(&env.pool, &doc_id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Error);
    assert!(doc.error_message.unwrap().contains("UTF-8"));
    assert!(!env.index.exists(&doc_id));
}

#[tokio::test]
async fn min_similarity_filters_weak_evidence() {
    let env = setup(1000).await;

    let a_id = upload_and_index(&env, "strong.txt", "text/plain", b"alpha facts only").await;
    let b_id = upload_and_index(&env, "weak.txt", "text/plain", b"gamma unrelated").await;
    let session = store::create_session(&env.pool, &[a_id, b_id], None)
        .await
        .unwrap();

    // strong scores 1.0 against the query vector, weak scores 0.5
    let mut request = query(&session.id, "alpha", 5);
    request.min_similarity = Some(0.8);
    let response = env.engine.answer(&request).await.unwrap();

    assert_eq!(response.context_chunks.len(), 1);
    assert!(response.context_chunks[0].starts_with("[From: strong]"));
}

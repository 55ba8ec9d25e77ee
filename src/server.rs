//! HTTP API server.
//!
//! Exposes the document chat pipeline as a JSON HTTP API. Routing is a thin
//! layer: handlers validate boundary shapes, then delegate to the store,
//! the ingest lifecycle, and the [`ChatEngine`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/documents` | Upload a document (multipart; indexing runs in the background) |
//! | `GET`  | `/documents` | List documents, newest first |
//! | `GET`  | `/documents/{id}` | Get one document |
//! | `DELETE` | `/documents/{id}` | Delete a document, its index, and referencing sessions |
//! | `POST` | `/sessions` | Create a chat session over ready documents |
//! | `GET`  | `/sessions` | List sessions |
//! | `GET`  | `/sessions/{id}` | Get a session with its transcript |
//! | `DELETE` | `/sessions/{id}` | Delete a session and its messages |
//! | `POST` | `/query` | Ask a question against a session (RAG) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses use one envelope:
//!
//! ```json
//! { "error": { "code": "not_ready", "message": "documents are not ready: Report B" } }
//! ```
//!
//! User-input problems map to 400/404; pipeline failures map to 500.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::ChatEngine;
use crate::config::Config;
use crate::embedding::OllamaEmbedder;
use crate::error::DocChatError;
use crate::index::IndexEngine;
use crate::ingest;
use crate::llm::OllamaChat;
use crate::models::{
    QueryRequest, SessionCreateRequest, SessionView, UploadResponse,
};
use crate::store;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: sqlx::SqlitePool,
    index: Arc<IndexEngine>,
    engine: Arc<ChatEngine>,
}

impl IntoResponse for DocChatError {
    fn into_response(self) -> Response {
        let status = match &self {
            DocChatError::NotFound(_) => StatusCode::NOT_FOUND,
            _ if self.is_user_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "error": { "code": self.code(), "message": self.to_string() }
        });
        (status, Json(body)).into_response()
    }
}

/// Starts the HTTP server and runs until the process is terminated.
pub async fn run_server(config: &Config, pool: sqlx::SqlitePool) -> anyhow::Result<()> {
    let embedder = Arc::new(OllamaEmbedder::new(&config.model)?);
    let index = Arc::new(IndexEngine::new(embedder, config.index.clone()));
    let model = Arc::new(OllamaChat::new(&config.model)?);
    let engine = Arc::new(ChatEngine::new(
        pool.clone(),
        index.clone(),
        model,
        config.index.default_min_similarity,
    ));

    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        index,
        engine,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/documents", post(handle_upload).get(handle_list_documents))
        .route(
            "/documents/{id}",
            get(handle_get_document).delete(handle_delete_document),
        )
        .route("/sessions", post(handle_create_session).get(handle_list_sessions))
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("docchat server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), DocChatError> {
    let mut title: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DocChatError::InvalidRequest(e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                filename = field.file_name().map(|s| s.to_string());
                content_type = field.content_type().map(|s| s.to_string());
                bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| DocChatError::InvalidRequest(e.to_string()))?
                        .to_vec(),
                );
            }
            Some("title") => {
                title = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| DocChatError::InvalidRequest(e.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| {
        DocChatError::InvalidRequest("multipart field 'file' is required".to_string())
    })?;
    let filename = filename
        .ok_or_else(|| DocChatError::InvalidRequest("uploaded file has no name".to_string()))?;
    let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    let document = ingest::save_upload(
        &state.pool,
        &state.config.uploads.dir,
        &filename,
        &content_type,
        title,
        &bytes,
    )
    .await?;

    // Fire-and-forget: the job owns its own pool handle and reports back
    // through the document row only.
    tokio::spawn(ingest::index_document(
        state.pool.clone(),
        state.index.clone(),
        state.config.chunking.clone(),
        document.id.clone(),
    ));

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            document_id: document.id,
            filename: document.filename,
            status: document.status,
            message: "Document uploaded successfully. Indexing in progress.".to_string(),
        }),
    ))
}

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Response, DocChatError> {
    let documents = store::list_documents(&state.pool).await?;
    Ok(Json(documents).into_response())
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, DocChatError> {
    let document = store::get_document(&state.pool, &id)
        .await?
        .ok_or_else(|| DocChatError::NotFound(format!("document {}", id)))?;
    Ok(Json(document).into_response())
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, DocChatError> {
    ingest::delete_document(&state.pool, &state.index, &id).await?;
    Ok(Json(serde_json::json!({ "message": "Document deleted successfully" })).into_response())
}

async fn handle_create_session(
    State(state): State<AppState>,
    Json(request): Json<SessionCreateRequest>,
) -> Result<Response, DocChatError> {
    let session =
        store::create_session(&state.pool, &request.document_ids, request.title).await?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

async fn handle_list_sessions(State(state): State<AppState>) -> Result<Response, DocChatError> {
    let sessions = store::list_sessions(&state.pool).await?;
    Ok(Json(sessions).into_response())
}

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, DocChatError> {
    let session = store::get_session(&state.pool, &id)
        .await?
        .ok_or_else(|| DocChatError::NotFound(format!("chat session {}", id)))?;
    let messages = store::list_messages(&state.pool, &id).await?;
    Ok(Json(SessionView { session, messages }).into_response())
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, DocChatError> {
    store::get_session(&state.pool, &id)
        .await?
        .ok_or_else(|| DocChatError::NotFound(format!("chat session {}", id)))?;
    store::delete_session(&state.pool, &id).await?;
    Ok(Json(serde_json::json!({ "message": "Chat session deleted successfully" })).into_response())
}

async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Response, DocChatError> {
    let response = state.engine.answer(&request).await?;
    Ok(Json(response).into_response())
}

async fn handle_health() -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

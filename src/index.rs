//! Per-document vector index engine.
//!
//! Each document gets one artifact set under the configured root, keyed
//! `doc_<document_id>`:
//!
//! - `doc_<id>.chunks.json` — the indexed chunk texts
//! - `doc_<id>.vectors.bin` — embeddings as little-endian f32 bytes
//! - `doc_<id>.meta.json` — backend, model, device, dims, chunk count
//!
//! The meta file is written last and its presence is the "index present"
//! marker, so an interrupted build is never treated as searchable. Searches
//! embed the query and rank chunks by cosine similarity in-process.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::IndexConfig;
use crate::embedding::{blob_to_vecs, cosine_similarity, vecs_to_blob, EmbeddingClient};
use crate::error::{DocChatError, Result};
use crate::models::SearchHit;

/// Outcome of a successful index build.
#[derive(Debug, Clone)]
pub struct IndexBuildOutcome {
    /// Number of chunks actually indexed (blank chunks excluded).
    pub chunk_count: usize,
    /// Artifact key under the index root, e.g. `doc_42`.
    pub index_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexMeta {
    backend: String,
    model: String,
    device: String,
    dims: usize,
    chunk_count: usize,
    built_at: i64,
}

/// Vector index engine over a directory of per-document artifacts.
///
/// Constructed once with its embedding backend and settings, then shared;
/// there is no global instance.
pub struct IndexEngine {
    root: PathBuf,
    embedder: Arc<dyn EmbeddingClient>,
    config: IndexConfig,
}

impl IndexEngine {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, config: IndexConfig) -> Self {
        Self {
            root: config.root.clone(),
            embedder,
            config,
        }
    }

    /// Artifact key for a document.
    pub fn index_key(document_id: &str) -> String {
        format!("doc_{}", document_id)
    }

    fn artifact_path(&self, document_id: &str, suffix: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", Self::index_key(document_id), suffix))
    }

    /// Whether a built index exists for the document.
    pub fn exists(&self, document_id: &str) -> bool {
        self.artifact_path(document_id, "meta.json").exists()
    }

    /// Build (or rebuild) the index for a document from its chunks.
    ///
    /// Blank chunks are filtered here; failing with nothing left to index is
    /// an [`DocChatError::IndexBuild`] error. Rebuilding replaces any prior
    /// artifact set.
    pub async fn build(&self, document_id: &str, chunks: &[String]) -> Result<IndexBuildOutcome> {
        let non_empty: Vec<String> = chunks
            .iter()
            .filter(|c| !c.trim().is_empty())
            .cloned()
            .collect();
        if non_empty.is_empty() {
            return Err(DocChatError::IndexBuild(
                "document produced no non-empty chunks".to_string(),
            ));
        }

        std::fs::create_dir_all(&self.root)?;

        // Invalidate any previous build before touching artifacts.
        self.delete(document_id)?;

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(non_empty.len());
        for batch in non_empty.chunks(self.config.batch_size) {
            let embedded = self
                .embedder
                .embed(batch)
                .await
                .map_err(|e| DocChatError::IndexBuild(format!("embedding failed: {}", e)))?;
            vectors.extend(embedded);
        }

        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        if dims == 0 || vectors.iter().any(|v| v.len() != dims) {
            return Err(DocChatError::IndexBuild(
                "embedding backend returned inconsistent vector dimensions".to_string(),
            ));
        }

        let chunks_json = serde_json::to_string(&non_empty)
            .map_err(|e| DocChatError::IndexBuild(e.to_string()))?;
        std::fs::write(self.artifact_path(document_id, "chunks.json"), chunks_json)?;
        std::fs::write(
            self.artifact_path(document_id, "vectors.bin"),
            vecs_to_blob(&vectors),
        )?;

        // Meta last: only a complete artifact set becomes searchable.
        let meta = IndexMeta {
            backend: self.config.backend.clone(),
            model: self.embedder.model_name().to_string(),
            device: self.config.device.clone(),
            dims,
            chunk_count: non_empty.len(),
            built_at: chrono::Utc::now().timestamp(),
        };
        let meta_json =
            serde_json::to_string(&meta).map_err(|e| DocChatError::IndexBuild(e.to_string()))?;
        std::fs::write(self.artifact_path(document_id, "meta.json"), meta_json)?;

        Ok(IndexBuildOutcome {
            chunk_count: non_empty.len(),
            index_key: Self::index_key(document_id),
        })
    }

    /// Search a document's index, returning hits by descending similarity.
    pub async fn search(
        &self,
        document_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let meta_path = self.artifact_path(document_id, "meta.json");
        if !meta_path.exists() {
            return Err(DocChatError::IndexNotFound {
                document_id: document_id.to_string(),
            });
        }

        let meta: IndexMeta = serde_json::from_str(&std::fs::read_to_string(&meta_path)?)
            .map_err(|e| DocChatError::Retrieval(format!("corrupt index metadata: {}", e)))?;
        let chunks: Vec<String> = serde_json::from_str(&std::fs::read_to_string(
            self.artifact_path(document_id, "chunks.json"),
        )?)
        .map_err(|e| DocChatError::Retrieval(format!("corrupt index chunks: {}", e)))?;
        let blob = std::fs::read(self.artifact_path(document_id, "vectors.bin"))?;
        let vectors = blob_to_vecs(&blob, meta.dims)
            .map_err(|e| DocChatError::Retrieval(format!("corrupt index vectors: {}", e)))?;
        if vectors.len() != chunks.len() {
            return Err(DocChatError::Retrieval(format!(
                "index for document {} has {} vectors but {} chunks",
                document_id,
                vectors.len(),
                chunks.len()
            )));
        }

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(|e| DocChatError::Retrieval(format!("query embedding failed: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| DocChatError::Retrieval("empty query embedding".to_string()))?;

        let mut scored: Vec<(f32, String)> = chunks
            .into_iter()
            .zip(vectors.iter())
            .map(|(text, vec)| (cosine_similarity(&query_vec, vec), text))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(idx, (score, text))| SearchHit {
                rank: idx + 1,
                text,
                score,
            })
            .collect())
    }

    /// Remove all persisted artifacts for a document.
    ///
    /// Returns whether anything was deleted; deleting a document that was
    /// never indexed is a no-op success.
    pub fn delete(&self, document_id: &str) -> Result<bool> {
        let prefix = format!("{}.", Self::index_key(document_id));
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        // Delete the meta file first so a partially-removed set is
        // immediately unsearchable.
        let mut names: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&prefix) {
                names.push(entry.path());
            }
        }
        names.sort_by_key(|p| !p.to_string_lossy().ends_with(".meta.json"));

        let mut deleted = false;
        for path in names {
            std::fs::remove_file(path)?;
            deleted = true;
        }
        Ok(deleted)
    }
}

//! Embedding backend abstraction and vector utilities.
//!
//! Defines the [`EmbeddingClient`] trait consumed by the index engine, plus
//! the [`OllamaEmbedder`] implementation that calls the Ollama embeddings
//! API. Vector helpers handle the little-endian f32 blob encoding used for
//! on-disk index artifacts:
//!
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vecs_to_blob`] / [`blob_to_vecs`] — encode/decode vector sets

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ModelConfig;

/// Trait for embedding backends.
///
/// The index engine treats this as a black box: texts in, one vector per
/// text out, in the same order. Implementations must be `Send + Sync` so a
/// single client can be shared across background jobs and request handlers.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embedding client backed by the Ollama `/api/embed` endpoint.
pub struct OllamaEmbedder {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
        })
    }
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await
            .with_context(|| format!("embedding request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("embedding API returned {}: {}", status, body);
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .await
            .context("failed to parse embedding response")?;

        if parsed.embeddings.len() != texts.len() {
            bail!(
                "embedding API returned {} vectors for {} inputs",
                parsed.embeddings.len(),
                texts.len()
            );
        }
        Ok(parsed.embeddings)
    }
}

// ============ Vector utilities ============

/// Cosine similarity between two vectors. Returns 0.0 for mismatched
/// lengths or zero-magnitude inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Encode a set of equal-length vectors as concatenated little-endian f32 bytes.
pub fn vecs_to_blob(vecs: &[Vec<f32>]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vecs.iter().map(|v| v.len() * 4).sum());
    for vec in vecs {
        for value in vec {
            blob.extend_from_slice(&value.to_le_bytes());
        }
    }
    blob
}

/// Decode a blob produced by [`vecs_to_blob`] back into `dims`-sized vectors.
pub fn blob_to_vecs(blob: &[u8], dims: usize) -> Result<Vec<Vec<f32>>> {
    if dims == 0 || blob.len() % (dims * 4) != 0 {
        bail!(
            "vector blob of {} bytes is not a multiple of {} dims",
            blob.len(),
            dims
        );
    }
    let values: Vec<f32> = blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(values.chunks_exact(dims).map(|c| c.to_vec()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![0.5, 0.5, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn blob_roundtrip() {
        let vecs = vec![vec![1.0f32, -2.5, 0.125], vec![3.0, 4.0, 5.0]];
        let blob = vecs_to_blob(&vecs);
        assert_eq!(blob.len(), 24);
        let decoded = blob_to_vecs(&blob, 3).unwrap();
        assert_eq!(decoded, vecs);
    }

    #[test]
    fn blob_with_wrong_dims_rejected() {
        let blob = vecs_to_blob(&[vec![1.0f32, 2.0, 3.0]]);
        assert!(blob_to_vecs(&blob, 2).is_err());
        assert!(blob_to_vecs(&blob, 0).is_err());
    }
}

//! Language-model backend abstraction.
//!
//! The orchestrator consumes a [`ChatModel`] trait object: a single call
//! taking a fully-assembled prompt and returning generated text. No
//! streaming, no retries; the caller decides any retry policy.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ModelConfig;

/// Trait for language-model backends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a completion for the prompt. Runs to completion or failure;
    /// no cancellation is provided beyond what the backend imposes.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Chat backend calling the Ollama `/api/chat` endpoint (non-streaming).
pub struct OllamaChat {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaChat {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    content: String,
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "stream": false,
                "options": {
                    "temperature": self.temperature,
                    "num_predict": self.max_tokens,
                    "top_p": 0.9,
                },
            }))
            .send()
            .await
            .with_context(|| format!("chat request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("chat API returned {}: {}", status, body);
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .context("failed to parse chat response")?;
        Ok(parsed.message.content)
    }
}

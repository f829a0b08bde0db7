//! OpenAI-compatible embedding client.
//!
//! Works with any endpoint exposing `POST {base_url}/embeddings` in the
//! OpenAI request/response shape (OpenAI, Azure proxies, Ollama, vLLM).

use async_trait::async_trait;
use flowplan_config::EmbeddingConfig;
use flowplan_core::{Embedder, EmbeddingError};
use serde::Deserialize;
use tracing::debug;

/// An [`Embedder`] backed by an OpenAI-compatible HTTP API.
pub struct OpenAiEmbedder {
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Build from the `[embedding]` config section. A missing API key is an
    /// authentication failure up front rather than on the first request.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| EmbeddingError::AuthenticationFailed("No API key configured".into()))?;
        Self::new(&config.model, &config.base_url, api_key, config.timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "encoding_format": "float",
        });

        debug!(model = %self.model, count = texts.len(), "Sending embedding request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(EmbeddingError::RateLimited {
                retry_after_secs: 5,
            });
        }
        if status == 401 || status == 403 {
            return Err(EmbeddingError::AuthenticationFailed("Invalid API key".into()));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: EmbeddingApiResponse =
            response.json().await.map_err(|e| EmbeddingError::ApiError {
                status_code: 200,
                message: format!("Failed to parse embedding response: {e}"),
            })?;

        let embeddings = api_resp.into_ordered_vectors();
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: embeddings.len(),
            });
        }
        Ok(embeddings)
    }
}

// --- Embedding API types ---

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
    #[allow(dead_code)]
    #[serde(default)]
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl EmbeddingApiResponse {
    /// Vectors in input order; the API tags each with its input index.
    fn into_ordered_vectors(mut self) -> Vec<Vec<f32>> {
        self.data.sort_by_key(|d| d.index);
        self.data.into_iter().map(|d| d.embedding).collect()
    }
}

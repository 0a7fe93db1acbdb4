use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragcrew_core::config::EmbeddingConfig;
use ragcrew_core::error::{Error, Result};
use ragcrew_core::traits::Embedder;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint. One text per request.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    dim: usize,
}

impl OpenAiEmbedder {
    pub fn new(cfg: &EmbeddingConfig) -> Result<Self> {
        if cfg.dimension == 0 {
            return Err(Error::Config("embedding dimension must be positive".to_string()));
        }
        let client = Client::builder()
            .timeout(cfg.timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|e| Error::Connection(format!("embedding client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            model: cfg.model_name.clone(),
            dim: cfg.dimension,
        })
    }
}

impl Embedder for OpenAiEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::EmptyInput("embedding text"));
        }
        debug!(model = %self.model, chars = text.chars().count(), "embedding request");

        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest { model: &self.model, input: [text] });
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().map_err(|e| Error::Embedding(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Embedding(format!("status {status}: {body}")));
        }
        let parsed: EmbeddingResponse =
            response.json().map_err(|e| Error::Embedding(format!("invalid response body: {e}")))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Embedding("no embedding data returned".to_string()))
    }
}

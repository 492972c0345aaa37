//! Ollama HTTP embedder.
//!
//! Uses the Ollama API at /api/embeddings to generate vectors
//! with the configured model (nomic-embed-text by default, 768 dimensions).

use async_trait::async_trait;
use kmindex_core::{KmError, KmResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedder::TextEmbedder;

/// Ollama embedding client.
#[derive(Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder with specified URL and model.
    pub fn new(base_url: &str, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the Ollama service is reachable and the model is available.
    pub async fn health_check(&self) -> bool {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                let text = resp.text().await.unwrap_or_default();
                text.contains(&self.model)
            }
            _ => false,
        }
    }
}

#[async_trait]
impl TextEmbedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> KmResult<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| KmError::embedding(format!("Failed to connect to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(KmError::embedding(format!("Ollama API error ({}): {}", status, body)));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| KmError::embedding(format!("Failed to parse Ollama response: {}", e)))?;

        if result.embedding.is_empty() {
            return Err(KmError::embedding("Ollama returned an empty embedding"));
        }

        debug!(model = %self.model, dim = result.embedding.len(), "Generated embedding");

        Ok(result.embedding)
    }
}

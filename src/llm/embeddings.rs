//! Remote embedding calls.
//!
//! OpenAI-compatible servers answer `{"data": [{"embedding": [...], "index": 0}]}`.
//! Older and Ollama-style servers answer with a bare `embeddings` matrix or a
//! single `embedding` vector. All shapes normalize to one vector per input.

use super::client::{LlmClient, api_error_message};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every input, returning vectors in input order.
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed_one(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed(model, &[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Data { data: Vec<EmbeddingRecord> },
    Matrix { embeddings: Vec<Vec<f32>> },
    Single { embedding: Vec<f32> },
}

#[derive(Debug, Deserialize)]
struct EmbeddingRecord {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl EmbeddingResponse {
    fn into_vectors(self) -> Vec<Vec<f32>> {
        match self {
            EmbeddingResponse::Data { mut data } => {
                if data.iter().all(|r| r.index.is_some()) {
                    data.sort_by_key(|r| r.index);
                }
                data.into_iter().map(|r| r.embedding).collect()
            }
            EmbeddingResponse::Matrix { embeddings } => embeddings,
            EmbeddingResponse::Single { embedding } => vec![embedding],
        }
    }
}

/// Parse an embeddings response body into one vector per input.
pub(crate) fn parse_embeddings(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| RagError::Embedding(format!("Unrecognized embeddings response: {}", e)))?;

    let vectors = parsed.into_vectors();

    if vectors.len() != expected {
        return Err(RagError::Embedding(format!(
            "Expected {} embeddings, got {}",
            expected,
            vectors.len()
        )));
    }

    Ok(vectors)
}

impl LlmClient {
    /// Request embeddings for `inputs`.
    pub async fn embeddings(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model,
            input: inputs,
        };

        tracing::debug!(model, count = inputs.len(), "embedding request");

        let response = self
            .client
            .post(self.url("embeddings"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RagError::Embedding(api_error_message(status, &body)));
        }

        parse_embeddings(&body, inputs.len())
    }
}

#[async_trait]
impl Embedder for LlmClient {
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embeddings(model, inputs).await
    }
}

use async_trait::async_trait;
use meetrag_core::error::{AppError, ErrorKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::ollama::OllamaClient;

/// Upper bound on a single embedding input, in bytes.
const MAX_INPUT_BYTES: usize = 12_000;

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn embed_blocking(&self, input: &str) -> Result<Vec<f32>, AppError> {
        let url = format!("{}/api/embeddings", self.client.base_url());
        let req = EmbeddingsRequest {
            model: &self.model,
            prompt: bounded(input),
        };
        let v: EmbeddingsResponse = post_json(&url, &req)?;
        if v.embedding.is_empty() {
            return Err(embed_error("Embeddings response was empty"));
        }
        Ok(v.embedding)
    }

    fn embed_batch_blocking(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let url = format!("{}/api/embed", self.client.base_url());
        let req = EmbedBatchRequest {
            model: &self.model,
            input: inputs.iter().map(|s| bounded(s)).collect(),
        };
        let v: EmbedBatchResponse = post_json(&url, &req)?;
        if v.embeddings.len() != inputs.len() {
            return Err(embed_error("Embeddings response count mismatch")
                .with_details(format!("expected={}; got={}", inputs.len(), v.embeddings.len())));
        }
        Ok(v.embeddings)
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize)]
struct EmbedBatchRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedBatchResponse {
    embeddings: Vec<Vec<f32>>,
}

fn bounded(input: &str) -> &str {
    if input.len() <= MAX_INPUT_BYTES {
        return input;
    }
    let mut end = MAX_INPUT_BYTES;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

fn embed_error(message: &str) -> AppError {
    AppError::new(ErrorKind::IndexBuild, "AI_EMBEDDINGS_FAILED", message)
}

fn post_json<Req: Serialize, Resp: DeserializeOwned>(url: &str, req: &Req) -> Result<Resp, AppError> {
    let body = serde_json::to_value(req)
        .map_err(|e| embed_error("Failed to encode embeddings request").with_details(e.to_string()))?;
    let resp = ureq::post(url)
        .timeout(std::time::Duration::from_secs(30))
        .send_json(body);

    match resp {
        Ok(r) if r.status() == 200 => r
            .into_json()
            .map_err(|e| embed_error("Failed to decode embeddings response").with_details(e.to_string())),
        Ok(r) => Err(embed_error("Embeddings request failed").with_details(format!("status={}", r.status()))),
        Err(ureq::Error::Status(code, _)) => Err(embed_error("Embeddings request failed")
            .with_details(format!("status={code}"))
            .with_retryable(code >= 500 || code == 429)),
        Err(e) => Err(embed_error("Failed to call embeddings endpoint").with_details(e.to_string())),
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        let this = self.clone();
        let input = input.to_string();
        tokio::task::spawn_blocking(move || this.embed_blocking(&input))
            .await
            .map_err(|e| embed_error("Embedding worker failed").with_details(e.to_string()))?
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let this = self.clone();
        let inputs = inputs.to_vec();
        tokio::task::spawn_blocking(move || this.embed_batch_blocking(&inputs))
            .await
            .map_err(|e| embed_error("Embedding worker failed").with_details(e.to_string()))?
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

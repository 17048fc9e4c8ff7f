use async_trait::async_trait;
use meetrag_core::error::AppError;

/// Text to fixed-length vector. Identical input must yield identical output.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, input: &str) -> Result<Vec<f32>, AppError>;

    /// One vector per input, in input order. Index builds always go through here.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            out.push(self.embed(input).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str;
}

pub mod ollama_embed;

pub use ollama_embed::OllamaEmbedder;

use async_trait::async_trait;
use meetrag_core::error::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};

use super::{ChatMessage, Completer, CompletionRequest};
use crate::ollama::OllamaClient;

#[derive(Debug, Clone)]
pub struct OllamaCompleter {
    client: OllamaClient,
    model: String,
    temperature: f32,
    top_p: f32,
}

impl OllamaCompleter {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.1,
            top_p: 0.9,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, top_p: f32) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }

    fn complete_blocking(&self, messages: Vec<ChatMessage>) -> Result<String, AppError> {
        let url = format!("{}/api/chat", self.client.base_url());
        let req = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
                top_p: self.top_p,
            },
        };

        let resp = ureq::post(&url)
            .timeout(std::time::Duration::from_secs(120))
            .send_json(serde_json::to_value(req).map_err(|e| {
                completion_error("Failed to encode chat request").with_details(e.to_string())
            })?);

        match resp {
            Ok(r) if r.status() == 200 => {
                let v: ChatResponse = r.into_json().map_err(|e| {
                    completion_error("Failed to decode chat response").with_details(e.to_string())
                })?;
                if v.message.content.trim().is_empty() {
                    return Err(completion_error("Chat response was empty"));
                }
                Ok(v.message.content)
            }
            Ok(r) => Err(completion_error("Chat request failed").with_details(format!("status={}", r.status()))),
            Err(ureq::Error::Status(code, _)) => Err(completion_error("Chat request failed")
                .with_details(format!("status={code}"))
                .with_retryable(code >= 500 || code == 429)),
            Err(e) => Err(completion_error("Failed to call chat endpoint").with_details(e.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Clone, Serialize)]
struct ChatOptions {
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

fn completion_error(message: &str) -> AppError {
    AppError::new(ErrorKind::CompletionService, "AI_COMPLETION_FAILED", message)
}

#[async_trait]
impl Completer for OllamaCompleter {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, AppError> {
        let this = self.clone();
        let messages = req.to_messages();
        tokio::task::spawn_blocking(move || this.complete_blocking(messages))
            .await
            .map_err(|e| completion_error("Completion worker failed").with_details(e.to_string()))?
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

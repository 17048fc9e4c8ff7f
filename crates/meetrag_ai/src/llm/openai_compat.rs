//! Chat completions against an OpenAI-compatible endpoint (Groq by default).

use async_trait::async_trait;
use meetrag_core::error::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};

use super::{ChatMessage, Completer, CompletionRequest};
use crate::ollama::validate_base_url;

#[derive(Clone)]
pub struct OpenAiCompatCompleter {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

// Keeps the key out of debug logs.
impl std::fmt::Debug for OpenAiCompatCompleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatCompleter")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatCompleter {
    pub fn new(base_url: &str, api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, AppError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::new(
                ErrorKind::InvalidConfig,
                "AI_API_KEY_MISSING",
                "Completion provider API key is empty",
            ));
        }
        Ok(Self {
            base_url: validate_base_url(base_url)?,
            api_key,
            model: model.into(),
            temperature: 0.1,
            top_p: 0.9,
            max_tokens: 1024,
        })
    }

    pub fn with_sampling(mut self, temperature: f32, top_p: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self.max_tokens = max_tokens;
        self
    }

    fn complete_blocking(&self, messages: Vec<ChatMessage>) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);
        let req = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let resp = ureq::post(&url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .timeout(std::time::Duration::from_secs(120))
            .send_json(serde_json::to_value(req).map_err(|e| {
                completion_error("Failed to encode chat completion request").with_details(e.to_string())
            })?);

        match resp {
            Ok(r) if r.status() == 200 => {
                let v: ChatCompletionResponse = r.into_json().map_err(|e| {
                    completion_error("Failed to decode chat completion response").with_details(e.to_string())
                })?;
                let content = v
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .unwrap_or_default();
                if content.trim().is_empty() {
                    return Err(completion_error("Chat completion response was empty"));
                }
                Ok(content)
            }
            Ok(r) => Err(completion_error("Chat completion request failed")
                .with_details(format!("status={}", r.status()))),
            Err(ureq::Error::Status(code, _)) => Err(completion_error("Chat completion request failed")
                .with_details(format!("status={code}"))
                .with_retryable(code >= 500 || code == 429)),
            Err(e) => Err(completion_error("Failed to call chat completion endpoint").with_details(e.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

fn completion_error(message: &str) -> AppError {
    AppError::new(ErrorKind::CompletionService, "AI_COMPLETION_FAILED", message)
}

#[async_trait]
impl Completer for OpenAiCompatCompleter {
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

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an AI assistant specialized in analyzing meeting transcripts. \
Answer only from the meeting context and the conversation so far. \
If the context does not contain the answer, say that the meeting does not cover it.";

/// Runtime configuration. Every field has a default, so a config file only needs overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    pub artifacts_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Most recent completed turns replayed as chat history.
    pub max_history_turns: usize,
    pub source_preview_chars: usize,
    pub system_instruction: String,
    pub timeouts: TimeoutConfig,
    pub embedding: EmbeddingConfig,
    pub completion: CompletionConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("output"),
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            max_history_turns: 10,
            source_preview_chars: 200,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            timeouts: TimeoutConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: CompletionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub store_ms: u64,
    pub embedding_ms: u64,
    pub completion_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            store_ms: 5_000,
            embedding_ms: 60_000,
            completion_ms: 60_000,
        }
    }
}

impl TimeoutConfig {
    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }

    pub fn embedding(&self) -> Duration {
        Duration::from_millis(self.embedding_ms)
    }

    pub fn completion(&self) -> Duration {
        Duration::from_millis(self.completion_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "all-minilm".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionProvider {
    Ollama,
    OpenaiCompat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionConfig {
    pub provider: CompletionProvider,
    /// Defaults to the provider's usual endpoint when unset.
    pub base_url: Option<String>,
    /// Defaults to the provider's usual model when unset.
    pub model: Option<String>,
    /// Environment variable holding the bearer key for `openai_compat`.
    pub api_key_env: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: CompletionProvider::Ollama,
            base_url: None,
            model: None,
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.1,
            top_p: 0.9,
            max_tokens: 1024,
        }
    }
}

impl CompletionConfig {
    pub fn base_url(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url,
            (None, CompletionProvider::Ollama) => "http://127.0.0.1:11434",
            (None, CompletionProvider::OpenaiCompat) => "https://api.groq.com/openai/v1",
        }
    }

    pub fn model(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, CompletionProvider::Ollama) => "llama3",
            (None, CompletionProvider::OpenaiCompat) => "llama3-8b-8192",
        }
    }
}

impl RagConfig {
    /// Load a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path).map_err(|e| {
            AppError::new(ErrorKind::InvalidConfig, "CONFIG_READ_FAILED", "Failed to read config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let cfg: RagConfig = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::new(ErrorKind::InvalidConfig, "CONFIG_DECODE_FAILED", "Failed to decode config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(invalid("chunk_size must be greater than zero", format!("chunk_size={}", self.chunk_size)));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(invalid(
                "chunk_overlap must be smaller than chunk_size",
                format!("chunk_size={}; chunk_overlap={}", self.chunk_size, self.chunk_overlap),
            ));
        }
        if self.top_k == 0 {
            return Err(invalid("top_k must be greater than zero", "top_k=0".to_string()));
        }
        if self.source_preview_chars == 0 {
            return Err(invalid(
                "source_preview_chars must be greater than zero",
                "source_preview_chars=0".to_string(),
            ));
        }
        let t = &self.timeouts;
        if t.store_ms == 0 || t.embedding_ms == 0 || t.completion_ms == 0 {
            return Err(invalid(
                "timeouts must be greater than zero",
                format!("store_ms={}; embedding_ms={}; completion_ms={}", t.store_ms, t.embedding_ms, t.completion_ms),
            ));
        }
        Ok(())
    }
}

fn invalid(message: &str, details: String) -> AppError {
    AppError::new(ErrorKind::InvalidConfig, "CONFIG_INVALID", message).with_details(details)
}

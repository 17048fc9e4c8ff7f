use async_trait::async_trait;
use meetrag_core::domain::Turn;
use meetrag_core::error::AppError;
use serde::{Deserialize, Serialize};

/// Everything the completion collaborator sees for one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_instruction: String,
    /// Retrieved chunk texts in retrieval-rank order.
    pub context_chunks: Vec<String>,
    /// Prior turns, oldest first, already bounded by the caller.
    pub chat_history: Vec<Turn>,
    pub question: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl CompletionRequest {
    /// System message carrying the instruction and context, then history, then the question.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(2 + self.chat_history.len() * 2);
        out.push(ChatMessage {
            role: Role::System,
            content: format!(
                "{}\n\nUse the following context to answer questions about the meeting:\n\n{}",
                self.system_instruction,
                self.context_chunks.join("\n\n---\n\n")
            ),
        });
        for turn in &self.chat_history {
            out.push(ChatMessage {
                role: Role::User,
                content: turn.question.clone(),
            });
            out.push(ChatMessage {
                role: Role::Assistant,
                content: turn.answer.clone(),
            });
        }
        out.push(ChatMessage {
            role: Role::User,
            content: self.question.clone(),
        });
        out
    }
}

#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, AppError>;

    fn model_name(&self) -> &str;
}

pub mod ollama_llm;
pub mod openai_compat;

pub use ollama_llm::OllamaCompleter;
pub use openai_compat::OpenAiCompatCompleter;

use meetrag_core::domain::Turn;

use crate::index::RetrievedChunk;
use crate::llm::CompletionRequest;

pub fn compose_request(
    system_instruction: &str,
    retrieved: &[RetrievedChunk],
    history: Vec<Turn>,
    question: &str,
) -> CompletionRequest {
    CompletionRequest {
        system_instruction: system_instruction.to_string(),
        context_chunks: retrieved.iter().map(|c| c.text.clone()).collect(),
        chat_history: history,
        question: question.to_string(),
    }
}

/// First `max_chars` characters of the trimmed chunk, with `...` when cut.
pub fn source_preview(text: &str, max_chars: usize) -> String {
    let t = text.trim();
    match t.char_indices().nth(max_chars) {
        None => t.to_string(),
        Some((cut, _)) => {
            let mut s = t[..cut].to_string();
            s.push_str("...");
            s
        }
    }
}

pub mod chunking;
pub mod embeddings;
pub mod index;
pub mod lifecycle;
pub mod llm;
pub mod memory;
pub mod ollama;
pub mod qa;

pub use qa::MeetingQa;

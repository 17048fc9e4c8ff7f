//! One function per CLI command. Each returns `AppError` and leaves printing
//! formats to `print`.

use std::sync::Arc;

use meetrag_ai::embeddings::OllamaEmbedder;
use meetrag_ai::llm::{Completer, OllamaCompleter, OpenAiCompatCompleter};
use meetrag_ai::ollama::OllamaClient;
use meetrag_ai::MeetingQa;
use meetrag_core::artifacts::FsArtifactStore;
use meetrag_core::config::{CompletionProvider, RagConfig};
use meetrag_core::domain::QaResult;
use meetrag_core::error::{AppError, ErrorKind};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Serialize)]
pub struct AiHealthStatus {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    ok: bool,
}

pub fn build_service(config: RagConfig) -> Result<MeetingQa, AppError> {
    let store = FsArtifactStore::open(config.artifacts_dir.clone());
    let embedder = OllamaEmbedder::new(OllamaClient::new(&config.embedding.base_url)?, config.embedding.model.clone());
    let completer = build_completer(&config)?;
    tracing::info!(
        artifacts_dir = %config.artifacts_dir.display(),
        embedding_model = %config.embedding.model,
        completion_model = completer.model_name(),
        "meeting qa configured"
    );
    MeetingQa::new(config, Arc::new(store), Arc::new(embedder), completer)
}

fn build_completer(config: &RagConfig) -> Result<Arc<dyn Completer>, AppError> {
    let c = &config.completion;
    match c.provider {
        CompletionProvider::Ollama => {
            let client = OllamaClient::new(c.base_url())?;
            Ok(Arc::new(
                OllamaCompleter::new(client, c.model()).with_sampling(c.temperature, c.top_p),
            ))
        }
        CompletionProvider::OpenaiCompat => {
            let key = std::env::var(&c.api_key_env).unwrap_or_default();
            let completer = OpenAiCompatCompleter::new(c.base_url(), key, c.model())
                .map_err(|e| e.with_details(format!("env={}", c.api_key_env)))?;
            Ok(Arc::new(completer.with_sampling(c.temperature, c.top_p, c.max_tokens)))
        }
    }
}

pub async fn ai_health_check(config: &RagConfig) -> Result<AiHealthStatus, AppError> {
    let client = OllamaClient::new(&config.embedding.base_url)?;
    let base = client.base_url().to_string();
    tokio::task::spawn_blocking(move || client.health_check())
        .await
        .map_err(|e| {
            AppError::new(ErrorKind::CompletionService, "AI_HEALTH_TASK_FAILED", "Health check task failed")
                .with_details(e.to_string())
        })??;
    Ok(AiHealthStatus {
        ok: true,
        message: format!("Ollama reachable at {base}"),
    })
}

pub async fn list_meetings(qa: &MeetingQa, json: bool) -> Result<(), AppError> {
    let names = qa.list_meetings().await?;
    print(&names, json, |n| n.join("\n"))
}

pub async fn ask(qa: &MeetingQa, meeting: &str, question: &str, json: bool) -> Result<(), AppError> {
    let res = qa.ask_question(meeting, question).await?;
    print(&res, json, render_answer)
}

/// Question per stdin line. Per-question errors are reported and the session goes on.
pub async fn chat(qa: &MeetingQa, meeting: &str, json: bool) -> Result<(), AppError> {
    let status = qa.load_meeting(meeting).await?;
    eprintln!(
        "loaded {} ({} chunks); type /clear to reset, Ctrl-D to quit",
        status.artifact, status.chunk_count
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = lines.next_line().await.map_err(|e| {
            AppError::new(ErrorKind::InvalidRequest, "CLI_STDIN_FAILED", "Failed to read from stdin")
                .with_details(e.to_string())
        })?;
        let Some(line) = line else { break };
        let q = line.trim();
        if q.is_empty() {
            continue;
        }
        if q == "/clear" {
            let ok = qa.clear_context(meeting).await;
            print(&ClearResponse { ok }, json, |_| "conversation cleared".to_string())?;
            continue;
        }
        match qa.ask_question(meeting, q).await {
            Ok(res) => print(&res, json, render_answer)?,
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

fn render_answer(res: &QaResult) -> String {
    let mut out = res.answer.clone();
    if !res.sources.is_empty() {
        out.push_str("\n\nSources:");
        for (i, s) in res.sources.iter().enumerate() {
            out.push_str(&format!("\n  [{}] {}", i + 1, s));
        }
    }
    out
}

pub fn print<T: Serialize>(value: &T, json: bool, plain: impl FnOnce(&T) -> String) -> Result<(), AppError> {
    if json {
        let s = serde_json::to_string_pretty(value).map_err(|e| {
            AppError::new(ErrorKind::InvalidRequest, "CLI_OUTPUT_FAILED", "Failed to encode output")
                .with_details(e.to_string())
        })?;
        println!("{s}");
    } else {
        println!("{}", plain(value));
    }
    Ok(())
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use meetrag_ai::embeddings::Embedder;
use meetrag_ai::index::{Accelerator, DeviceIndex, HostMatrix};
use meetrag_ai::llm::{Completer, CompletionRequest};
use meetrag_ai::MeetingQa;
use meetrag_core::artifacts::{ArtifactEntry, ArtifactStore};
use meetrag_core::config::RagConfig;
use meetrag_core::domain::MeetingAnalysis;
use meetrag_core::error::{AppError, ErrorKind};

pub const WEEKLY_SYNC: &str = r#"{
    "transcript": "Alice: the budget for Q3 is approved. Bob: launch moves to June. Carol: hiring two engineers.",
    "summary": "Budget approved, launch in June, hiring plan agreed.",
    "key_points": ["Q3 budget approved", "Launch moved to June"],
    "action_items": ["Bob to update the launch plan"],
    "participants": ["Alice", "Bob", "Carol"],
    "follow_up": ["Confirm hiring budget"],
    "dates": ["June 14 launch"],
    "next_steps": "Bob circulates the revised launch plan."
}"#;

/// In-memory artifact store keyed by artifact file name.
pub struct MemoryStore {
    entries: Vec<ArtifactEntry>,
    bodies: HashMap<String, String>,
    pub list_calls: AtomicUsize,
    pub read_calls: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub list_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            bodies: HashMap::new(),
            list_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            list_delay: None,
        }
    }

    pub fn with(mut self, name: &str, unix_ts: i64, body: &str) -> Self {
        self.entries.push(ArtifactEntry {
            name: name.to_string(),
            created_at: OffsetDateTime::from_unix_timestamp(unix_ts).unwrap(),
        });
        self.bodies.insert(name.to_string(), body.to_string());
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn list(&self) -> Result<Vec<ArtifactEntry>, AppError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.list_delay {
            tokio::time::sleep(d).await;
        }
        Ok(self.entries.clone())
    }

    async fn read(&self, name: &str) -> Result<MeetingAnalysis, AppError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::new(ErrorKind::Store, "STORE_UNAVAILABLE", "disk went away"));
        }
        let body = self
            .bodies
            .get(name)
            .ok_or_else(|| AppError::new(ErrorKind::MeetingNotFound, "ARTIFACT_NOT_FOUND", "missing"))?;
        MeetingAnalysis::from_json_slice(body.as_bytes())
    }
}

const VOCAB: [&str; 6] = ["budget", "launch", "hiring", "june", "alice", "bob"];

/// Bag-of-keywords embedder. The trailing constant component keeps vectors non-zero.
pub struct KeywordEmbedder {
    pub embed_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub batch_delay: Option<Duration>,
    pub fail_batch: AtomicBool,
    pub fail_embed: AtomicBool,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            embed_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            batch_delay: None,
            fail_batch: AtomicBool::new(false),
            fail_embed: AtomicBool::new(false),
        }
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = Some(delay);
        self
    }

    fn vectorize(input: &str) -> Vec<f32> {
        let lower = input.to_lowercase();
        let mut v: Vec<f32> = VOCAB.iter().map(|w| lower.matches(w).count() as f32).collect();
        v.push(0.1);
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed.load(Ordering::SeqCst) {
            return Err(AppError::new(ErrorKind::IndexBuild, "AI_EMBEDDINGS_FAILED", "embedder down").with_retryable(true));
        }
        Ok(Self::vectorize(input))
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.batch_delay {
            tokio::time::sleep(d).await;
        }
        if self.fail_batch.load(Ordering::SeqCst) {
            return Err(AppError::new(ErrorKind::IndexBuild, "AI_EMBEDDINGS_FAILED", "embedder down").with_retryable(true));
        }
        Ok(inputs.iter().map(|i| Self::vectorize(i)).collect())
    }

    fn model_name(&self) -> &str {
        "keywords"
    }
}

/// Records every request and answers with a canned reply.
pub struct RecordingCompleter {
    pub requests: Mutex<Vec<CompletionRequest>>,
    pub fail: AtomicBool,
    pub reply: Mutex<String>,
    pub delay: Option<Duration>,
    /// Extra latency for specific questions.
    pub question_delays: HashMap<String, Duration>,
    /// Questions in the order their answers were produced.
    pub completed: Mutex<Vec<String>>,
}

impl RecordingCompleter {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            reply: Mutex::new(String::new()),
            delay: None,
            question_delays: HashMap::new(),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_question_delay(mut self, question: &str, delay: Duration) -> Self {
        self.question_delays.insert(question.to_string(), delay);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completer for RecordingCompleter {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, AppError> {
        self.requests.lock().unwrap().push(req.clone());
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if let Some(d) = self.question_delays.get(&req.question) {
            tokio::time::sleep(*d).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::new(ErrorKind::CompletionService, "AI_COMPLETION_FAILED", "rate limited").with_retryable(true));
        }
        self.completed.lock().unwrap().push(req.question.clone());
        let canned = self.reply.lock().unwrap().clone();
        if canned.is_empty() {
            Ok(format!("answer to: {}", req.question))
        } else {
            Ok(canned)
        }
    }

    fn model_name(&self) -> &str {
        "recording"
    }
}

/// Accelerator whose placements count their own releases.
pub struct CountingAccelerator {
    pub placed: AtomicUsize,
    pub released: Arc<AtomicUsize>,
}

impl CountingAccelerator {
    pub fn new() -> Self {
        Self {
            placed: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }
}

struct CountingDeviceIndex {
    matrix: HostMatrix,
    released: Arc<AtomicUsize>,
}

impl Accelerator for CountingAccelerator {
    fn name(&self) -> &str {
        "test-device"
    }

    fn place(&self, matrix: &HostMatrix) -> Result<Box<dyn DeviceIndex>, AppError> {
        self.placed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingDeviceIndex {
            matrix: matrix.clone(),
            released: Arc::clone(&self.released),
        }))
    }
}

impl DeviceIndex for CountingDeviceIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, AppError> {
        Ok(self.matrix.search(query, k))
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn small_chunks_config() -> RagConfig {
    RagConfig {
        chunk_size: 120,
        chunk_overlap: 20,
        ..RagConfig::default()
    }
}

pub fn weekly_store() -> MemoryStore {
    MemoryStore::new()
        .with("Weekly_Sync_20240501_120000.json", 1_714_564_800, WEEKLY_SYNC)
        .with("Design_Review_20240502_090000.json", 1_714_640_400, r#"{"transcript": "Dana: the new logo is approved."}"#)
}

pub struct Harness {
    pub qa: Arc<MeetingQa>,
    pub store: Arc<MemoryStore>,
    pub embedder: Arc<KeywordEmbedder>,
    pub completer: Arc<RecordingCompleter>,
}

pub fn harness(config: RagConfig, store: MemoryStore, embedder: KeywordEmbedder, completer: RecordingCompleter) -> Harness {
    let store = Arc::new(store);
    let embedder = Arc::new(embedder);
    let completer = Arc::new(completer);
    let qa = MeetingQa::new(config, store.clone(), embedder.clone(), completer.clone()).expect("valid config");
    Harness {
        qa: Arc::new(qa),
        store,
        embedder,
        completer,
    }
}

pub fn default_harness() -> Harness {
    harness(small_chunks_config(), weekly_store(), KeywordEmbedder::new(), RecordingCompleter::new())
}

//! Conversational question answering over one meeting at a time.
//!
//! `MeetingQa` owns a registry of per-meeting slots. Each slot moves through
//! `Unloaded -> Loading -> Ready`; a failed load drops back to `Unloaded` so the
//! next request retries. The index mutex is held for the whole build, which means
//! concurrent first questions for one meeting wait on a single build. Memory has
//! its own mutex, taken only to snapshot history and to append a finished turn.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use meetrag_core::artifacts::{artifact_meeting_name, resolve_artifact, ArtifactEntry, ArtifactStore};
use meetrag_core::config::RagConfig;
use meetrag_core::corpus::build_corpus;
use meetrag_core::domain::{MeetingState, QaResult, Turn};
use meetrag_core::error::{AppError, ErrorKind};
use tokio::sync::Mutex;

use crate::chunking;
use crate::embeddings::Embedder;
use crate::index::{Accelerator, IndexMeta, IndexStatus, VectorIndex};
use crate::lifecycle::ResourceTracker;
use crate::llm::Completer;
use crate::memory::ConversationMemory;

pub mod prompts;

const STATE_UNLOADED: u8 = 0;
const STATE_LOADING: u8 = 1;
const STATE_READY: u8 = 2;

struct MeetingSlot {
    state: AtomicU8,
    index: Mutex<Option<Arc<VectorIndex>>>,
    memory: Mutex<ConversationMemory>,
}

impl MeetingSlot {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_UNLOADED),
            index: Mutex::new(None),
            memory: Mutex::new(ConversationMemory::new()),
        }
    }

    fn set_state(&self, state: u8) {
        self.state.store(state, Ordering::SeqCst);
    }

    fn state(&self) -> MeetingState {
        match self.state.load(Ordering::SeqCst) {
            STATE_LOADING => MeetingState::Loading,
            STATE_READY => MeetingState::Ready,
            _ => MeetingState::Unloaded,
        }
    }
}

pub struct MeetingQa {
    config: RagConfig,
    store: Arc<dyn ArtifactStore>,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    accelerator: Option<Arc<dyn Accelerator>>,
    meetings: DashMap<String, Arc<MeetingSlot>>,
    resources: ResourceTracker,
    shut_down: AtomicBool,
}

impl MeetingQa {
    pub fn new(
        config: RagConfig,
        store: Arc<dyn ArtifactStore>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
    ) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            embedder,
            completer,
            accelerator: None,
            meetings: DashMap::new(),
            resources: ResourceTracker::new(),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn with_accelerator(mut self, accelerator: Arc<dyn Accelerator>) -> Self {
        self.accelerator = Some(accelerator);
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn resources(&self) -> &ResourceTracker {
        &self.resources
    }

    fn slot(&self, meeting_id: &str) -> Arc<MeetingSlot> {
        // Clone the Arc out so the map guard is dropped before any await.
        let entry = self
            .meetings
            .entry(meeting_id.to_string())
            .or_insert_with(|| Arc::new(MeetingSlot::new()));
        Arc::clone(entry.value())
    }

    fn existing_slot(&self, meeting_id: &str) -> Option<Arc<MeetingSlot>> {
        self.meetings.get(meeting_id.trim()).map(|s| Arc::clone(s.value()))
    }

    pub fn state(&self, meeting_id: &str) -> MeetingState {
        self.existing_slot(meeting_id)
            .map_or(MeetingState::Unloaded, |s| s.state())
    }

    /// Answer `question` about `meeting_id`, loading the meeting on first use.
    #[tracing::instrument(skip_all, fields(meeting_id = %meeting_id.trim()))]
    pub async fn ask_question(&self, meeting_id: &str, question: &str) -> Result<QaResult, AppError> {
        let meeting_id = require_non_empty(meeting_id, "QA_MEETING_ID_EMPTY", "Meeting id must not be empty")?;
        let question = require_non_empty(question, "QA_QUESTION_EMPTY", "Question must not be empty")?;
        let started = Instant::now();

        let slot = self.slot(meeting_id);
        let index = self.ensure_index(meeting_id, &slot).await?;

        let query_vec = bounded(self.config.timeouts.embedding(), self.embedder.embed(question), || {
            AppError::new(ErrorKind::Retrieval, "QA_EMBEDDING_TIMEOUT", "Embedding the question timed out")
        })
        .await
        .map_err(|e| e.reclassify(ErrorKind::Retrieval))?;
        let retrieved = index.query(&query_vec, self.config.top_k)?;

        let history = slot.memory.lock().await.recent(self.config.max_history_turns);
        let request = prompts::compose_request(&self.config.system_instruction, &retrieved, history, question);

        let answer = bounded(self.config.timeouts.completion(), self.completer.complete(&request), || {
            AppError::new(
                ErrorKind::CompletionService,
                "QA_COMPLETION_TIMEOUT",
                "Completion service timed out",
            )
        })
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, details = e.details.as_deref().unwrap_or(""), "completion failed");
            e.reclassify(ErrorKind::CompletionService)
        })?;
        if answer.trim().is_empty() {
            return Err(AppError::new(
                ErrorKind::CompletionService,
                "QA_EMPTY_ANSWER",
                "Completion service returned an empty answer",
            ));
        }

        slot.memory.lock().await.append(question, answer.clone());

        let sources = retrieved
            .iter()
            .map(|c| prompts::source_preview(&c.text, self.config.source_preview_chars))
            .collect();
        tracing::info!(
            sources = retrieved.len(),
            history_turns = request.chat_history.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "question answered"
        );
        Ok(QaResult { answer, sources })
    }

    /// Load the meeting's index without asking anything.
    pub async fn load_meeting(&self, meeting_id: &str) -> Result<IndexStatus, AppError> {
        let meeting_id = require_non_empty(meeting_id, "QA_MEETING_ID_EMPTY", "Meeting id must not be empty")?;
        let slot = self.slot(meeting_id);
        let index = self.ensure_index(meeting_id, &slot).await?;
        Ok(index.status())
    }

    /// Clear the conversation for a meeting. Always `true`; a meeting without memory is a no-op.
    pub async fn clear_context(&self, meeting_id: &str) -> bool {
        if let Some(slot) = self.existing_slot(meeting_id) {
            let removed = slot.memory.lock().await.clear();
            tracing::info!(meeting_id = %meeting_id.trim(), removed, "cleared conversation history");
        }
        true
    }

    pub async fn history(&self, meeting_id: &str) -> Vec<Turn> {
        let Some(slot) = self.existing_slot(meeting_id) else {
            return Vec::new();
        };
        let turns = slot.memory.lock().await.history().to_vec();
        turns
    }

    pub async fn index_status(&self, meeting_id: &str) -> Option<IndexStatus> {
        let slot = self.existing_slot(meeting_id)?;
        let status = slot.index.lock().await.as_ref().map(|idx| idx.status());
        status
    }

    /// Distinct meeting names found in the artifact store, sorted.
    pub async fn list_meetings(&self) -> Result<Vec<String>, AppError> {
        let entries = self.list_artifacts().await?;
        let names: BTreeSet<String> = entries
            .iter()
            .map(|e| artifact_meeting_name(&e.name).to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Ok(names.into_iter().collect())
    }

    /// Release every accelerator placement held by loaded meetings. Returns how many were freed.
    ///
    /// Meetings loaded afterwards stay in host memory, so nothing placed later is left unreleased.
    pub fn shutdown(&self) -> usize {
        self.shut_down.store(true, Ordering::SeqCst);
        let live = self.resources.len();
        let released = self.resources.release_all();
        tracing::info!(live, released, "meeting qa shut down");
        released
    }

    async fn ensure_index(&self, meeting_id: &str, slot: &MeetingSlot) -> Result<Arc<VectorIndex>, AppError> {
        let mut guard = slot.index.lock().await;
        if let Some(index) = guard.as_ref() {
            return Ok(Arc::clone(index));
        }

        slot.set_state(STATE_LOADING);
        match self.build_index(meeting_id).await {
            Ok(index) => {
                let index = Arc::new(index);
                // A build that raced with shutdown must not keep its placement.
                if self.shut_down.load(Ordering::SeqCst) {
                    index.release();
                }
                *guard = Some(Arc::clone(&index));
                self.resources.track(meeting_id, Arc::clone(&index));
                slot.set_state(STATE_READY);
                Ok(index)
            }
            Err(e) => {
                slot.set_state(STATE_UNLOADED);
                tracing::warn!(
                    error = %e,
                    kind = ?e.kind,
                    details = e.details.as_deref().unwrap_or(""),
                    "meeting load failed"
                );
                Err(e)
            }
        }
    }

    async fn list_artifacts(&self) -> Result<Vec<ArtifactEntry>, AppError> {
        bounded(self.config.timeouts.store(), self.store.list(), || {
            AppError::new(ErrorKind::Store, "QA_STORE_TIMEOUT", "Listing meeting artifacts timed out")
        })
        .await
    }

    async fn build_index(&self, meeting_id: &str) -> Result<VectorIndex, AppError> {
        let entries = self.list_artifacts().await?;
        let (entry, strategy) = resolve_artifact(&entries, meeting_id).ok_or_else(|| {
            AppError::new(
                ErrorKind::MeetingNotFound,
                "QA_MEETING_NOT_FOUND",
                "No meeting data found for this id",
            )
            .with_details(format!("meeting_id={meeting_id}; artifacts={}", entries.len()))
        })?;
        tracing::info!(artifact = %entry.name, strategy = ?strategy, "resolved meeting artifact");

        let analysis = bounded(self.config.timeouts.store(), self.store.read(&entry.name), || {
            AppError::new(ErrorKind::IndexBuild, "QA_STORE_TIMEOUT", "Reading the meeting artifact timed out")
        })
        .await
        .map_err(|e| match e.kind {
            ErrorKind::MalformedRecord | ErrorKind::MeetingNotFound | ErrorKind::IndexBuild => e,
            _ => e.reclassify(ErrorKind::IndexBuild),
        })?;

        let corpus = build_corpus(&analysis);
        let chunks = chunking::split(&corpus.text, self.config.chunk_size, self.config.chunk_overlap)?;
        tracing::debug!(chars = corpus.char_len(), chunks = chunks.len(), "corpus chunked");

        let meta = IndexMeta {
            meeting_id: meeting_id.to_string(),
            artifact: entry.name.clone(),
            corpus_sha256: corpus.text_sha256,
        };
        let accelerator = if self.shut_down.load(Ordering::SeqCst) {
            None
        } else {
            self.accelerator.as_deref()
        };
        let build = VectorIndex::build(meta, chunks, self.embedder.as_ref(), accelerator);
        bounded(self.config.timeouts.embedding(), build, || {
            AppError::new(ErrorKind::IndexBuild, "QA_EMBEDDING_TIMEOUT", "Embedding the meeting timed out")
        })
        .await
    }
}

fn require_non_empty<'a>(value: &'a str, code: &str, message: &str) -> Result<&'a str, AppError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(AppError::new(ErrorKind::InvalidRequest, code, message));
    }
    Ok(v)
}

/// Run a collaborator call under `limit`. Timeouts are retryable by construction.
async fn bounded<T, F>(limit: Duration, fut: F, on_timeout: impl FnOnce() -> AppError) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(on_timeout().with_details(format!("limit_ms={}", limit.as_millis())).with_retryable(true)),
    }
}

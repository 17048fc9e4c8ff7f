mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use pretty_assertions::assert_eq;

use common::{
    default_harness, harness, small_chunks_config, weekly_store, KeywordEmbedder, MemoryStore, RecordingCompleter,
    WEEKLY_SYNC,
};
use meetrag_ai::chunking::expected_chunk_count;
use meetrag_core::config::{RagConfig, TimeoutConfig};
use meetrag_core::corpus::build_corpus;
use meetrag_core::domain::{MeetingAnalysis, MeetingState, Turn};
use meetrag_core::error::ErrorKind;

#[tokio::test]
async fn answers_about_a_fuzzily_named_meeting() {
    let h = default_harness();
    assert_eq!(h.qa.state("weekly sync"), MeetingState::Unloaded);

    let res = h
        .qa
        .ask_question("weekly sync", "What was decided about the budget?")
        .await
        .expect("answer");

    assert_eq!(res.answer, "answer to: What was decided about the budget?");
    assert!(!res.sources.is_empty());
    assert!(res.sources.len() <= 3);
    for s in &res.sources {
        assert!(s.chars().count() <= 203, "preview too long: {s}");
    }
    assert_eq!(h.qa.state("weekly sync"), MeetingState::Ready);

    let status = h.qa.index_status("weekly sync").await.expect("loaded");
    assert_eq!(status.artifact, "Weekly_Sync_20240501_120000.json");

    let reqs = h.completer.requests();
    assert_eq!(reqs.len(), 1);
    assert!(reqs[0].context_chunks[0].to_lowercase().contains("budget"));
    assert!(reqs[0].system_instruction.contains("meeting"));
}

#[tokio::test]
async fn unknown_meeting_is_not_found_and_stays_unloaded() {
    let h = default_harness();
    let err = h
        .qa
        .ask_question("Nonexistent Meeting", "Anything?")
        .await
        .expect_err("no such meeting");

    assert_eq!(err.kind, ErrorKind::MeetingNotFound);
    assert!(!err.retryable);
    assert_eq!(h.qa.state("Nonexistent Meeting"), MeetingState::Unloaded);
    assert_eq!(h.embedder.batch_calls.load(Ordering::SeqCst), 0);
    assert!(h.completer.requests().is_empty());
}

#[tokio::test]
async fn second_question_sees_the_first_turn() {
    let h = default_harness();
    h.qa.ask_question("weekly sync", "Who attended?").await.unwrap();
    h.qa.ask_question("weekly sync", "What did Bob say?").await.unwrap();

    let reqs = h.completer.requests();
    assert_eq!(reqs.len(), 2);
    assert!(reqs[0].chat_history.is_empty());
    assert!(!reqs[0].chat_history.iter().any(|t| t.question == "What did Bob say?"));
    assert_eq!(
        reqs[1].chat_history,
        vec![Turn {
            question: "Who attended?".to_string(),
            answer: "answer to: Who attended?".to_string(),
        }]
    );

    let history = h.qa.history("weekly sync").await;
    let questions: Vec<&str> = history.iter().map(|t| t.question.as_str()).collect();
    assert_eq!(questions, vec!["Who attended?", "What did Bob say?"]);

    // The index is built once and reused.
    assert_eq!(h.embedder.batch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn history_sent_to_the_completer_is_bounded() {
    let config = RagConfig {
        max_history_turns: 2,
        ..small_chunks_config()
    };
    let h = harness(config, weekly_store(), KeywordEmbedder::new(), RecordingCompleter::new());
    for i in 0..4 {
        h.qa.ask_question("weekly sync", &format!("q{i}")).await.unwrap();
    }

    let reqs = h.completer.requests();
    let last: Vec<&str> = reqs[3].chat_history.iter().map(|t| t.question.as_str()).collect();
    assert_eq!(last, vec!["q1", "q2"]);
    assert_eq!(h.qa.history("weekly sync").await.len(), 4);
}

#[tokio::test]
async fn clear_context_is_idempotent_and_keeps_the_index() {
    let h = default_harness();
    assert!(h.qa.clear_context("never loaded").await);

    h.qa.ask_question("weekly sync", "Who attended?").await.unwrap();
    assert!(h.qa.clear_context("weekly sync").await);
    assert!(h.qa.clear_context("weekly sync").await);
    assert!(h.qa.history("weekly sync").await.is_empty());
    assert_eq!(h.qa.state("weekly sync"), MeetingState::Ready);

    h.qa.ask_question("weekly sync", "And the launch?").await.unwrap();
    let reqs = h.completer.requests();
    assert!(reqs[1].chat_history.is_empty());
    assert_eq!(h.embedder.batch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn completion_failure_leaves_memory_untouched() {
    let h = default_harness();
    h.completer.fail.store(true, Ordering::SeqCst);

    let err = h.qa.ask_question("weekly sync", "Who attended?").await.expect_err("down");
    assert_eq!(err.kind, ErrorKind::CompletionService);
    assert!(err.retryable);
    assert!(h.qa.history("weekly sync").await.is_empty());
    // The index survives a completion failure.
    assert_eq!(h.qa.state("weekly sync"), MeetingState::Ready);

    h.completer.fail.store(false, Ordering::SeqCst);
    h.qa.ask_question("weekly sync", "Who attended?").await.unwrap();
    let reqs = h.completer.requests();
    assert!(reqs[1].chat_history.is_empty());
    assert_eq!(h.qa.history("weekly sync").await.len(), 1);
}

#[tokio::test]
async fn blank_answer_is_an_error() {
    let h = default_harness();
    *h.completer.reply.lock().unwrap() = "   ".to_string();

    let err = h.qa.ask_question("weekly sync", "Who attended?").await.expect_err("blank");
    assert_eq!(err.code, "QA_EMPTY_ANSWER");
    assert_eq!(err.kind, ErrorKind::CompletionService);
    assert!(h.qa.history("weekly sync").await.is_empty());
}

#[tokio::test]
async fn failed_build_reverts_to_unloaded_and_is_retried() {
    let h = default_harness();
    h.embedder.fail_batch.store(true, Ordering::SeqCst);

    let err = h.qa.ask_question("weekly sync", "Who attended?").await.expect_err("build");
    assert_eq!(err.kind, ErrorKind::IndexBuild);
    assert!(err.retryable);
    assert_eq!(h.qa.state("weekly sync"), MeetingState::Unloaded);
    assert!(h.qa.index_status("weekly sync").await.is_none());
    assert!(h.qa.resources().is_empty());

    h.embedder.fail_batch.store(false, Ordering::SeqCst);
    h.qa.ask_question("weekly sync", "Who attended?").await.expect("retry");
    assert_eq!(h.embedder.batch_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.qa.state("weekly sync"), MeetingState::Ready);
    assert!(h.qa.resources().is_tracked("weekly sync"));
}

#[tokio::test]
async fn malformed_record_is_reported_as_such() {
    let store = weekly_store().with("Broken_20240101_000000.json", 1_704_067_200, r#"{"key_points": "oops"}"#);
    let h = harness(small_chunks_config(), store, KeywordEmbedder::new(), RecordingCompleter::new());

    let err = h.qa.ask_question("broken", "Anything?").await.expect_err("malformed");
    assert_eq!(err.kind, ErrorKind::MalformedRecord);
    assert!(!err.retryable);
    assert_eq!(h.qa.state("broken"), MeetingState::Unloaded);
}

#[tokio::test]
async fn store_read_failure_is_an_index_build_error() {
    let h = default_harness();
    h.store.fail_reads.store(true, Ordering::SeqCst);

    let err = h.qa.load_meeting("weekly sync").await.expect_err("read");
    assert_eq!(err.kind, ErrorKind::IndexBuild);
    assert_eq!(err.code, "STORE_UNAVAILABLE");
    assert!(err.retryable);
}

#[tokio::test]
async fn blank_inputs_are_rejected_before_any_work() {
    let h = default_harness();

    let err = h.qa.ask_question("  ", "Who attended?").await.expect_err("id");
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(err.code, "QA_MEETING_ID_EMPTY");

    let err = h.qa.ask_question("weekly sync", "\n").await.expect_err("question");
    assert_eq!(err.code, "QA_QUESTION_EMPTY");

    assert_eq!(h.store.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn load_meeting_reports_index_status() {
    let h = default_harness();
    let status = h.qa.load_meeting("Weekly Sync").await.expect("load");

    let analysis = MeetingAnalysis::from_json_slice(WEEKLY_SYNC.as_bytes()).unwrap();
    let corpus = build_corpus(&analysis);
    assert_eq!(status.chunk_count as usize, expected_chunk_count(corpus.char_len(), 120, 20));
    assert_eq!(status.corpus_sha256, corpus.text_sha256);
    assert_eq!(status.dims, 7);
    assert_eq!(h.qa.state("Weekly Sync"), MeetingState::Ready);
}

#[tokio::test]
async fn most_recent_artifact_wins() {
    let store = weekly_store().with(
        "Weekly_Sync_20240508_120000.json",
        1_715_169_600,
        r#"{"transcript": "Alice: launch is on track."}"#,
    );
    let h = harness(small_chunks_config(), store, KeywordEmbedder::new(), RecordingCompleter::new());

    let status = h.qa.load_meeting("weekly sync").await.unwrap();
    assert_eq!(status.artifact, "Weekly_Sync_20240508_120000.json");
}

#[tokio::test]
async fn meetings_have_independent_conversations() {
    let h = default_harness();
    h.qa.ask_question("weekly sync", "Who attended?").await.unwrap();
    h.qa.ask_question("design review", "Was the logo approved?").await.unwrap();

    let reqs = h.completer.requests();
    assert!(reqs[1].chat_history.is_empty());
    assert!(reqs[1].context_chunks.iter().any(|c| c.contains("logo")));
    assert_eq!(h.qa.history("weekly sync").await.len(), 1);
    assert_eq!(h.qa.history("design review").await.len(), 1);
    assert_eq!(h.qa.resources().live_meetings(), vec!["design review", "weekly sync"]);
}

#[tokio::test]
async fn lists_distinct_meeting_names() {
    let store = weekly_store().with("Weekly_Sync_20240508_120000.json", 1_715_169_600, WEEKLY_SYNC);
    let h = harness(small_chunks_config(), store, KeywordEmbedder::new(), RecordingCompleter::new());
    assert_eq!(h.qa.list_meetings().await.unwrap(), vec!["Design_Review", "Weekly_Sync"]);
}

#[tokio::test]
async fn question_embedding_failure_is_a_retrieval_error() {
    let h = default_harness();
    h.qa.load_meeting("weekly sync").await.unwrap();
    h.embedder.fail_embed.store(true, Ordering::SeqCst);

    let err = h.qa.ask_question("weekly sync", "Who attended?").await.expect_err("embed");
    assert_eq!(err.kind, ErrorKind::Retrieval);
    assert!(err.retryable);
    assert!(h.completer.requests().is_empty());
}

#[tokio::test]
async fn slow_completion_times_out_as_retryable() {
    let config = RagConfig {
        timeouts: TimeoutConfig {
            completion_ms: 20,
            ..TimeoutConfig::default()
        },
        ..small_chunks_config()
    };
    let h = harness(
        config,
        weekly_store(),
        KeywordEmbedder::new(),
        RecordingCompleter::new().with_delay(Duration::from_millis(500)),
    );

    let err = h.qa.ask_question("weekly sync", "Who attended?").await.expect_err("timeout");
    assert_eq!(err.kind, ErrorKind::CompletionService);
    assert_eq!(err.code, "QA_COMPLETION_TIMEOUT");
    assert!(err.retryable);
    assert!(h.qa.history("weekly sync").await.is_empty());
}

#[tokio::test]
async fn slow_store_times_out_as_retryable() {
    let config = RagConfig {
        timeouts: TimeoutConfig {
            store_ms: 20,
            ..TimeoutConfig::default()
        },
        ..small_chunks_config()
    };
    let store = MemoryStore::new()
        .with("Weekly_Sync_20240501_120000.json", 1_714_564_800, WEEKLY_SYNC)
        .with_list_delay(Duration::from_millis(500));
    let h = harness(config, store, KeywordEmbedder::new(), RecordingCompleter::new());

    let err = h.qa.ask_question("weekly sync", "Who attended?").await.expect_err("timeout");
    assert_eq!(err.kind, ErrorKind::Store);
    assert_eq!(err.code, "QA_STORE_TIMEOUT");
    assert!(err.retryable);
    assert_eq!(h.qa.state("weekly sync"), MeetingState::Unloaded);
}

#[test]
fn rejects_invalid_config_at_construction() {
    let config = RagConfig {
        chunk_overlap: 1_000,
        ..RagConfig::default()
    };
    let store = std::sync::Arc::new(MemoryStore::new());
    let err = meetrag_ai::MeetingQa::new(
        config,
        store,
        std::sync::Arc::new(KeywordEmbedder::new()),
        std::sync::Arc::new(RecordingCompleter::new()),
    )
    .err()
    .expect("invalid");
    assert_eq!(err.kind, ErrorKind::InvalidConfig);
}

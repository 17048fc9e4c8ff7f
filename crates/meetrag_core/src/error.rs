use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure classes callers can branch on without parsing codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No stored artifact matches the meeting id.
    MeetingNotFound,
    /// A stored artifact does not have the MeetingAnalysis shape.
    MalformedRecord,
    /// Reading, embedding or indexing failed while loading a meeting.
    IndexBuild,
    /// Embedding the question or searching the index failed.
    Retrieval,
    /// The completion collaborator failed or timed out.
    CompletionService,
    InvalidConfig,
    InvalidRequest,
    /// The artifact store could not be listed.
    Store,
}

impl ErrorKind {
    pub fn default_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::IndexBuild | ErrorKind::Retrieval | ErrorKind::CompletionService | ErrorKind::Store
        )
    }
}

/// Single structured error shape used across the workspace.
///
/// `message` is safe to show to a caller; collaborator specifics belong in `details`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: kind.default_retryable(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Re-classify an error raised by a lower layer, keeping its code and details.
    pub fn reclassify(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

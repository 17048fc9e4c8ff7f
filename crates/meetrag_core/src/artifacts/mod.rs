use async_trait::async_trait;
use time::OffsetDateTime;

use crate::domain::MeetingAnalysis;
use crate::error::AppError;

pub mod fs_store;
pub mod matching;

pub use fs_store::FsArtifactStore;
pub use matching::{artifact_meeting_name, normalize_meeting_id, resolve_artifact, MatchStrategy};

/// Listing entry for one stored analysis artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub name: String,
    pub created_at: OffsetDateTime,
}

/// Read-only view of the stored analysis artifacts. The core never writes artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn list(&self) -> Result<Vec<ArtifactEntry>, AppError>;

    async fn read(&self, name: &str) -> Result<MeetingAnalysis, AppError>;
}

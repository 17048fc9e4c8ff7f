use std::path::{Path, PathBuf};

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{ArtifactEntry, ArtifactStore};
use crate::domain::MeetingAnalysis;
use crate::error::{AppError, ErrorKind};

/// Artifact store over a directory of `*.json` analysis files.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_path(&self, name: &str) -> Result<PathBuf, AppError> {
        // A single normal path component; `..` inside a file name is fine.
        let plain = Path::new(name).file_name().is_some_and(|f| f == name);
        if !plain || name.contains('\\') {
            return Err(AppError::new(
                ErrorKind::InvalidRequest,
                "ARTIFACT_NAME_INVALID",
                "Artifact name must be a plain file name",
            )
            .with_details(format!("name={name}")));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn list(&self) -> Result<Vec<ArtifactEntry>, AppError> {
        let mut dir = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            AppError::new(ErrorKind::Store, "ARTIFACT_LIST_FAILED", "Failed to list meeting artifacts")
                .with_details(format!("path={}; err={}", self.root.display(), e))
        })?;

        let mut out = Vec::new();
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(AppError::new(
                        ErrorKind::Store,
                        "ARTIFACT_LIST_FAILED",
                        "Failed to list meeting artifacts",
                    )
                    .with_details(format!("path={}; err={}", self.root.display(), e)))
                }
            };
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.to_ascii_lowercase().ends_with(".json") {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(artifact = %name, error = %e, "skipping unreadable artifact");
                    continue;
                }
            };
            let created = meta.created().or_else(|_| meta.modified()).map_err(|e| {
                AppError::new(
                    ErrorKind::Store,
                    "ARTIFACT_LIST_FAILED",
                    "Failed to read artifact timestamps",
                )
                .with_details(format!("name={name}; err={e}"))
            })?;
            out.push(ArtifactEntry {
                name,
                created_at: OffsetDateTime::from(created),
            });
        }

        // Stable listing order for callers and logs.
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn read(&self, name: &str) -> Result<MeetingAnalysis, AppError> {
        let path = self.artifact_path(name)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::new(
                    ErrorKind::MeetingNotFound,
                    "ARTIFACT_NOT_FOUND",
                    "Meeting artifact not found",
                )
                .with_details(format!("name={name}"))
            } else {
                AppError::new(ErrorKind::IndexBuild, "ARTIFACT_READ_FAILED", "Failed to read meeting artifact")
                    .with_details(format!("path={}; err={}", path.display(), e))
            }
        })?;
        MeetingAnalysis::from_json_slice(&bytes).map_err(|e| {
            let details = format!("name={name}; {}", e.details.clone().unwrap_or_default());
            e.with_details(details)
        })
    }
}

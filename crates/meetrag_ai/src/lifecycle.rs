//! Tracking of live per-meeting indices for deterministic teardown.

use std::sync::Arc;

use dashmap::DashMap;

use crate::index::VectorIndex;

/// Concurrent set of meetings with a live `VectorIndex`.
///
/// Only shutdown drains it; request paths insert and never release.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    live: DashMap<String, Arc<VectorIndex>>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, meeting_id: &str, index: Arc<VectorIndex>) {
        self.live.insert(meeting_id.to_string(), index);
    }

    pub fn untrack(&self, meeting_id: &str) -> Option<Arc<VectorIndex>> {
        self.live.remove(meeting_id).map(|(_, idx)| idx)
    }

    pub fn is_tracked(&self, meeting_id: &str) -> bool {
        self.live.contains_key(meeting_id)
    }

    pub fn live_meetings(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.live.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Release every tracked index and empty the set. Returns how many accelerator
    /// placements were actually freed; a second call frees nothing.
    pub fn release_all(&self) -> usize {
        // Collect first so no map guard is held while releasing.
        let ids = self.live_meetings();
        let mut released = 0usize;
        for id in ids {
            if let Some((_, index)) = self.live.remove(&id) {
                if index.release() {
                    released += 1;
                }
            }
        }
        tracing::info!(released, "released live meeting indices");
        released
    }
}

use std::sync::Mutex;
use std::time::Instant;

use meetrag_core::error::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};

use crate::chunking::Chunk;
use crate::embeddings::Embedder;

pub mod accelerator;
pub mod similarity;

pub use accelerator::{Accelerator, DeviceIndex, HostMatrix};

/// Where the search structure of an index currently lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "device", rename_all = "snake_case")]
pub enum Placement {
    Host,
    Accelerator(String),
}

/// Identity of the corpus an index was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub meeting_id: String,
    pub artifact: String,
    pub corpus_sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub meeting_id: String,
    pub artifact: String,
    pub chunk_count: u32,
    pub dims: u32,
    pub corpus_sha256: String,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub ordinal: u32,
    pub text: String,
    pub score: f32,
}

struct Placed {
    device: String,
    index: Box<dyn DeviceIndex>,
}

/// Immutable similarity index over one meeting's chunks.
pub struct VectorIndex {
    meta: IndexMeta,
    chunks: Vec<Chunk>,
    matrix: HostMatrix,
    placed: Mutex<Option<Placed>>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("meta", &self.meta)
            .field("chunks", &self.chunks.len())
            .field("dims", &self.matrix.dims())
            .field("placement", &self.placement())
            .finish()
    }
}

impl VectorIndex {
    /// Embed every chunk in one batched call, then build the index.
    pub async fn build(
        meta: IndexMeta,
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        accelerator: Option<&dyn Accelerator>,
    ) -> Result<Self, AppError> {
        let started = Instant::now();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await.map_err(|e| {
            let details = format!("meeting_id={}; {}", meta.meeting_id, e.details.clone().unwrap_or_default());
            AppError::new(ErrorKind::IndexBuild, "AI_INDEX_BUILD_FAILED", "Failed to compute chunk embeddings")
                .with_details(format!("code={}; {details}", e.code))
                .with_retryable(e.retryable)
        })?;
        let index = Self::from_vectors(meta, chunks, vectors, accelerator)?;
        tracing::info!(
            meeting_id = %index.meta.meeting_id,
            artifact = %index.meta.artifact,
            chunks = index.chunks.len(),
            dims = index.matrix.dims(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "vector index built"
        );
        Ok(index)
    }

    /// Build from precomputed vectors (one per chunk, same order).
    pub fn from_vectors(
        meta: IndexMeta,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
        accelerator: Option<&dyn Accelerator>,
    ) -> Result<Self, AppError> {
        if chunks.is_empty() {
            return Err(AppError::new(
                ErrorKind::IndexBuild,
                "AI_INDEX_BUILD_FAILED",
                "No chunks to index",
            )
            .with_retryable(false));
        }
        if vectors.len() != chunks.len() {
            return Err(AppError::new(
                ErrorKind::IndexBuild,
                "AI_INDEX_BUILD_FAILED",
                "Embedding count does not match chunk count",
            )
            .with_details(format!("chunks={}; vectors={}", chunks.len(), vectors.len())));
        }

        let dims = vectors[0].len();
        if dims == 0 {
            return Err(AppError::new(ErrorKind::IndexBuild, "AI_INDEX_BUILD_FAILED", "Embedding vectors are empty"));
        }
        let mut rows = Vec::with_capacity(vectors.len());
        for (i, mut v) in vectors.into_iter().enumerate() {
            if v.len() != dims {
                return Err(AppError::new(
                    ErrorKind::IndexBuild,
                    "AI_INDEX_BUILD_FAILED",
                    "Embedding dimension mismatch across chunks",
                )
                .with_details(format!("expected={}; got={}; ordinal={}", dims, v.len(), i)));
            }
            similarity::normalize_in_place(&mut v);
            rows.push(v);
        }
        let matrix = HostMatrix::from_rows(dims, rows);

        let placed = accelerator.and_then(|acc| match acc.place(&matrix) {
            Ok(index) => {
                tracing::info!(meeting_id = %meta.meeting_id, device = acc.name(), "index placed on accelerator");
                Some(Placed {
                    device: acc.name().to_string(),
                    index,
                })
            }
            Err(e) => {
                tracing::warn!(
                    meeting_id = %meta.meeting_id,
                    device = acc.name(),
                    error = %e,
                    details = e.details.as_deref().unwrap_or(""),
                    "accelerator placement failed; index stays in host memory"
                );
                None
            }
        });

        Ok(Self {
            meta,
            chunks,
            matrix,
            placed: Mutex::new(placed),
        })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.matrix.dims()
    }

    pub fn placement(&self) -> Placement {
        match self.placed.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            Some(p) => Placement::Accelerator(p.device.clone()),
            None => Placement::Host,
        }
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            meeting_id: self.meta.meeting_id.clone(),
            artifact: self.meta.artifact.clone(),
            chunk_count: self.chunks.len() as u32,
            dims: self.matrix.dims() as u32,
            corpus_sha256: self.meta.corpus_sha256.clone(),
            placement: self.placement(),
        }
    }

    /// Top-`k` chunks for `query` by cosine similarity, highest first, ties by chunk order.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, AppError> {
        if query.len() != self.matrix.dims() {
            return Err(AppError::new(
                ErrorKind::Retrieval,
                "AI_RETRIEVAL_FAILED",
                "Query embedding dims do not match index dims",
            )
            .with_details(format!("index_dims={}; query_dims={}", self.matrix.dims(), query.len()))
            .with_retryable(false));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut q = query.to_vec();
        similarity::normalize_in_place(&mut q);

        let hits = self.search(&q, k);
        Ok(hits
            .into_iter()
            .map(|(row, score)| RetrievedChunk {
                ordinal: self.chunks[row].ordinal,
                text: self.chunks[row].text.clone(),
                score,
            })
            .collect())
    }

    fn search(&self, q: &[f32], k: usize) -> Vec<(usize, f32)> {
        let guard = self.placed.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(p) = guard.as_ref() {
            match p.index.search(q, k) {
                Ok(mut hits) if self.device_hits_usable(&hits, k) => {
                    accelerator::rank(&mut hits, k);
                    return hits;
                }
                Ok(hits) => {
                    tracing::warn!(
                        meeting_id = %self.meta.meeting_id,
                        device = %p.device,
                        returned = hits.len(),
                        "accelerator returned short or out-of-range results; using host search"
                    );
                }
                Err(e) => {
                    tracing::warn!(meeting_id = %self.meta.meeting_id, device = %p.device, error = %e, "accelerator search failed; using host search");
                }
            }
        }
        drop(guard);
        self.matrix.search(q, k)
    }

    // At least min(k, n) distinct in-range rows.
    fn device_hits_usable(&self, hits: &[(usize, f32)], k: usize) -> bool {
        let n = self.chunks.len();
        let mut seen = vec![false; n];
        let mut distinct = 0usize;
        for (row, _) in hits {
            if *row >= n {
                return false;
            }
            if !seen[*row] {
                seen[*row] = true;
                distinct += 1;
            }
        }
        distinct == hits.len() && distinct >= k.min(n)
    }

    /// Return the accelerator copy to host memory and free it.
    ///
    /// Safe to call repeatedly and on indices that were never placed. Returns whether
    /// a placement was released by this call.
    pub fn release(&self) -> bool {
        let taken = self.placed.lock().unwrap_or_else(|e| e.into_inner()).take();
        match taken {
            Some(mut p) => {
                p.index.release();
                tracing::info!(meeting_id = %self.meta.meeting_id, device = %p.device, "accelerator placement released");
                true
            }
            None => false,
        }
    }
}

impl Drop for VectorIndex {
    fn drop(&mut self) {
        self.release();
    }
}

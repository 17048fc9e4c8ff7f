//! Optional relocation of a search structure to faster specialised memory.
//!
//! Placement is best-effort. The host matrix is always kept, so an index whose
//! placement failed or was released keeps answering from host memory.

use meetrag_core::error::AppError;

use super::similarity;

/// Row-major matrix of unit-length vectors in host memory.
#[derive(Debug, Clone, PartialEq)]
pub struct HostMatrix {
    dims: usize,
    data: Vec<f32>,
}

impl HostMatrix {
    /// Rows must already be normalized and share `dims`.
    pub(crate) fn from_rows(dims: usize, rows: Vec<Vec<f32>>) -> Self {
        let mut data = Vec::with_capacity(dims * rows.len());
        for row in rows {
            data.extend(row);
        }
        Self { dims, data }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn rows(&self) -> usize {
        if self.dims == 0 {
            0
        } else {
            self.data.len() / self.dims
        }
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dims..(i + 1) * self.dims]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Exhaustive search. Returns `(row, score)` by descending score, ties by lower row.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut hits: Vec<(usize, f32)> = (0..self.rows())
            .map(|i| (i, similarity::dot(query, self.row(i))))
            .collect();
        rank(&mut hits, k);
        hits
    }
}

/// Sort by descending score with ascending row as the tie-breaker, then keep `k`.
pub(crate) fn rank(hits: &mut Vec<(usize, f32)>, k: usize) {
    hits.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    hits.truncate(k);
}

/// A device able to host a copy of an index's search structure.
pub trait Accelerator: Send + Sync {
    fn name(&self) -> &str;

    fn place(&self, matrix: &HostMatrix) -> Result<Box<dyn DeviceIndex>, AppError>;
}

/// Search structure resident on an accelerator, exclusively owned by one `VectorIndex`.
pub trait DeviceIndex: Send + Sync {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, AppError>;

    /// Free the device memory. Called at most once by the owning index.
    fn release(&mut self);
}

//! Request-scoped similarity index.
//!
//! A [`SimilarityIndex`] holds the chunks of exactly one document together
//! with their embedding vectors. It is built once per request, queried, and
//! dropped. There is no insert or update after [`SimilarityIndex::build`].
//!
//! Search is brute-force cosine similarity over every stored vector, which
//! is plenty for the few dozen chunks a single page produces.

use std::cmp::Ordering;

use crate::error::{RagError, Result};
use crate::models::{Chunk, ScoredChunk};

/// Default number of chunks returned by a query.
pub const DEFAULT_TOP_K: usize = 3;

/// Immutable top-k index over one document's chunks.
#[derive(Debug)]
pub struct SimilarityIndex {
    entries: Vec<(Chunk, Vec<f32>)>,
    dims: usize,
}

impl SimilarityIndex {
    /// Build an index from `(chunk, vector)` pairs.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyDocument`] if `pairs` is empty.
    /// - [`RagError::Internal`] if vectors have differing or zero dimensions.
    pub fn build(pairs: Vec<(Chunk, Vec<f32>)>) -> Result<Self> {
        let dims = match pairs.first() {
            Some((_, v)) => v.len(),
            None => return Err(RagError::EmptyDocument),
        };
        if dims == 0 {
            return Err(RagError::Internal("embedding vectors are empty".into()));
        }
        if let Some((chunk, v)) = pairs.iter().find(|(_, v)| v.len() != dims) {
            return Err(RagError::Internal(format!(
                "chunk {} has {} dimensions, expected {}",
                chunk.index,
                v.len(),
                dims
            )));
        }

        Ok(Self {
            entries: pairs,
            dims,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Return up to `k` chunks ordered by descending cosine similarity.
    ///
    /// Equal scores keep the original chunk order.
    pub fn top_k(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if query_vec.len() != self.dims {
            return Err(RagError::Internal(format!(
                "query vector has {} dimensions, index has {}",
                query_vec.len(),
                self.dims
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, v))| (i, cosine_similarity(query_vec, v)))
            .collect();

        // sort_by is stable; NaN sorts last
        scored.sort_by(|a, b| match (a.1.is_nan(), b.1.is_nan()) {
            (false, false) => b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (true, true) => Ordering::Equal,
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (i, score))| ScoredChunk {
                chunk: self.entries[i].0.clone(),
                score,
                rank,
            })
            .collect())
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero vector.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

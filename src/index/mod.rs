// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Flat exact vector index
//!
//! Exhaustive squared-L2 search over all stored vectors. At the target scale
//! (a moderate in-memory document collection) exact search beats an
//! approximate structure: results are deterministic and there is no index
//! maintenance on insert or clear.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// A vector with the wrong dimensionality reached the index. This is a
    /// configuration fault, not a per-document condition.
    #[error("Dimension mismatch: index is {expected}D, got {actual}D vector")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector for id {id}: contains NaN or infinite values")]
    NonFiniteVector { id: u64 },

    #[error("Mismatched insert batch: {ids} ids but {vectors} vectors")]
    BatchMismatch { ids: usize, vectors: usize },
}

/// A single search hit: chunk id and squared-L2 distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub id: u64,
    pub distance: f32,
}

/// Relevance score exposed to callers: monotonically decreasing in distance,
/// bounded to (0, 1], so ranking reads ascending-is-better without leaking
/// distance units.
pub fn relevance_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// Flat (exhaustive) vector index over fixed-dimension f32 vectors
#[derive(Debug)]
pub struct FlatIndex {
    dimension: usize,
    ids: Vec<u64>,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Append a batch of (id, vector) pairs
    ///
    /// The whole batch is validated before anything is stored, so a failed
    /// insert leaves the index untouched.
    pub fn insert(&mut self, ids: &[u64], vectors: Vec<Vec<f32>>) -> Result<(), IndexError> {
        if ids.len() != vectors.len() {
            return Err(IndexError::BatchMismatch {
                ids: ids.len(),
                vectors: vectors.len(),
            });
        }
        for (id, vector) in ids.iter().zip(vectors.iter()) {
            if vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(IndexError::NonFiniteVector { id: *id });
            }
        }
        self.ids.extend_from_slice(ids);
        self.vectors.extend(vectors);
        Ok(())
    }

    /// Exact k-nearest-neighbor search by squared-L2 distance
    ///
    /// Returns up to `min(k, len)` hits in ascending distance order, ties
    /// broken by ascending id. An empty index returns an empty vec.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .ids
            .iter()
            .zip(self.vectors.iter())
            .map(|(id, vector)| SearchHit {
                id: *id,
                distance: squared_l2(query, vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.vectors.clear();
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retrieval ranking: join index hits against the chunk store
//!
//! The index returns ids in ascending distance order, so ranking is a join
//! plus a score transform, no re-sorting. Every id the index hands back must
//! resolve in the store; a miss means the two structures diverged and the
//! request is aborted with a diagnostic rather than silently degraded.

use thiserror::Error;

use crate::index::{relevance_from_distance, FlatIndex, IndexError};
use crate::store::{Chunk, ChunkStore};

#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Index returned an id with no chunk behind it. Internal invariant
    /// violation, indicates a bug in the coordinator's write path.
    #[error("Consistency violation: index returned chunk id {id} with no entry in the chunk store")]
    Consistency { id: u64 },

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// A retrieved chunk with its query distance and relevance score
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Squared-L2 distance to the query vector
    pub distance: f32,
    /// Monotone transform of distance, higher is better
    pub relevance: f32,
}

/// Search the index with an already-computed query vector and resolve each
/// hit to its chunk, preserving index order.
///
/// Returns at most `k` results; an empty index yields an empty vec.
pub fn rank(
    index: &FlatIndex,
    store: &ChunkStore,
    query_vector: &[f32],
    k: usize,
) -> Result<Vec<ScoredChunk>, RetrievalError> {
    let hits = index.search(query_vector, k)?;

    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        let chunk = store
            .get(hit.id)
            .ok_or(RetrievalError::Consistency { id: hit.id })?;
        results.push(ScoredChunk {
            chunk: chunk.clone(),
            distance: hit.distance,
            relevance: relevance_from_distance(hit.distance),
        });
    }
    Ok(results)
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chunk storage keyed by stable chunk id
//!
//! Pure key-value semantics, parallel to the vector index. The chunk id is
//! the join key between the two; any id returned by the index must resolve
//! here, and a miss is a consistency bug in the coordinator.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One indexed segment of a source document
///
/// Immutable after ingestion; destroyed only by a full clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Globally unique, monotonically allocated id
    pub id: u64,
    pub text: String,
    /// Filename of the source document
    pub source: String,
    /// Position within the source document, contiguous from 0
    pub ordinal: usize,
    pub embedding: Vec<f32>,
}

/// In-memory chunk store
#[derive(Debug, Default)]
pub struct ChunkStore {
    chunks: HashMap<u64, Chunk>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chunk: Chunk) {
        self.chunks.insert(chunk.id, chunk);
    }

    pub fn get(&self, id: u64) -> Option<&Chunk> {
        self.chunks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Distinct source filenames across all stored chunks
    pub fn list_sources(&self) -> BTreeSet<String> {
        self.chunks.values().map(|c| c.source.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}

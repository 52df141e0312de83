// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Deterministic local embedding provider and LLM test doubles
//!
//! The hash embedder maps each whitespace token to a signed bucket of the
//! output vector via SHA-256, accumulates, and L2-normalizes. Texts sharing
//! tokens land near each other, and the same text always produces the same
//! vector, which is all the engine requires of an embedding. It stands in
//! when no hosted embedding API is configured and backs the test suite.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{EmbeddingError, EmbeddingProvider, LlmError, LlmProvider};

/// Hashed bag-of-tokens embedder
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text.to_lowercase().split_whitespace() {
            let mut hasher = Sha256::new();
            hasher.update(token.as_bytes());
            let hash = hasher.finalize();

            let bucket = u64::from_le_bytes(hash[0..8].try_into().unwrap()) as usize
                % self.dimension;
            let sign = if hash[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for v in &mut vector {
                *v /= magnitude;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "hash"
    }
}

/// LLM double that always returns a fixed answer
pub struct StaticLlm {
    answer: String,
}

impl StaticLlm {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for StaticLlm {
    async fn complete(
        &self,
        _prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, LlmError> {
        Ok(self.answer.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// LLM double that always fails, for exercising the extractive fallback
#[derive(Default)]
pub struct FailingLlm {
    calls: AtomicUsize,
}

impl FailingLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for FailingLlm {
    async fn complete(
        &self,
        _prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LlmError::ApiError {
            status: 503,
            message: "provider unavailable".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embedding_is_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("the quick brown fox").await.unwrap();
        let b = embedder.embed("the quick brown fox").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_embedding_is_normalized() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed("some text to embed").await.unwrap();
        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_tokens_are_closer() {
        let embedder = HashEmbedder::new(128);
        let base = embedder.embed("rust memory safety ownership").await.unwrap();
        let near = embedder.embed("rust memory model").await.unwrap();
        let far = embedder.embed("chocolate cake recipe").await.unwrap();

        let dist = |a: &[f32], b: &[f32]| -> f32 {
            a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
        };
        assert!(dist(&base, &near) < dist(&base, &far));
    }

    #[tokio::test]
    async fn test_empty_text_embeds_to_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}

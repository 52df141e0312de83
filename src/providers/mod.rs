// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! External capability interfaces: embedding and LLM providers
//!
//! The engine consumes models through these traits; it never runs one
//! in-process. Concrete clients call hosted inference APIs, the hash
//! embedder is a deterministic local implementation used when no API key is
//! configured and throughout the tests.

pub mod hash;
pub mod huggingface;
pub mod openai;

pub use hash::{FailingLlm, HashEmbedder, StaticLlm};
pub use huggingface::{HuggingFaceEmbedder, HuggingFaceLlm};
pub use openai::OpenAiLlm;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from embedding providers
///
/// Embedding is load-bearing: there is no fallback, so any of these fails
/// the ingest or query operation that needed the vector.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Embedding request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("No API key configured for embedding provider '{provider}'")]
    NoApiKey { provider: String },
}

/// Errors from LLM providers
///
/// Always recovered by the synthesizer's extractive fallback, never
/// surfaced to the caller as a request failure.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("LLM request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Maps text to a fixed-dimension vector
///
/// Implementations must be deterministic for identical input and model
/// configuration, so repeated ingests of the same text index identically.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch of texts, in order
    ///
    /// Default implementation embeds sequentially; providers with a native
    /// batch endpoint should override.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Output vector dimensionality
    fn dimension(&self) -> usize;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Generative completion backend for answer synthesis
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Issue one completion request
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

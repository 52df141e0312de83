// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration
//!
//! Resolved once from environment variables at startup and validated there,
//! so an invalid combination stops the process instead of surfacing
//! per-request.

use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_HF_LLM_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.2";
pub const DEFAULT_OPENAI_LLM_MODEL: &str = "gpt-3.5-turbo";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid LLM_PROVIDER '{0}' (expected one of: openai, huggingface, none)")]
    InvalidLlmProvider(String),

    #[error("CHUNK_OVERLAP ({overlap}) must be smaller than CHUNK_SIZE ({chunk_size})")]
    InvalidChunking { chunk_size: usize, overlap: usize },

    #[error("TOP_K_RESULTS must be at least 1")]
    ZeroTopK,

    #[error("EMBEDDING_DIMENSION must be greater than zero")]
    ZeroDimension,
}

/// Which generative backend answers queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAi,
    HuggingFace,
    /// No generative backend; every answer takes the extractive path
    None,
}

impl LlmBackend {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "huggingface" => Ok(Self::HuggingFace),
            "none" => Ok(Self::None),
            other => Err(ConfigError::InvalidLlmProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub api_port: u16,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub huggingface_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub llm_backend: LlmBackend,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    pub top_k_default: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
}

impl NodeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let llm_backend = LlmBackend::parse(
            &env::var("LLM_PROVIDER").unwrap_or_else(|_| "huggingface".to_string()),
        )?;

        let default_llm_model = match llm_backend {
            LlmBackend::OpenAi => DEFAULT_OPENAI_LLM_MODEL,
            _ => DEFAULT_HF_LLM_MODEL,
        };

        let config = Self {
            api_port: env::var("API_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: env::var("EMBEDDING_DIMENSION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(384),
            huggingface_api_key: env::var("HUGGINGFACE_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_backend,
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| default_llm_model.to_string()),
            llm_max_tokens: env::var("LLM_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            llm_temperature: env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.3),
            top_k_default: env::var("TOP_K_RESULTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            chunk_size: env::var("CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            chunk_overlap: env::var("CHUNK_OVERLAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
            max_upload_bytes: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(100)
                * 1024
                * 1024,
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunking {
                chunk_size: self.chunk_size,
                overlap: self.chunk_overlap,
            });
        }
        if self.top_k_default == 0 {
            return Err(ConfigError::ZeroTopK);
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_port: 8000,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: 384,
            huggingface_api_key: None,
            openai_api_key: None,
            llm_backend: LlmBackend::None,
            llm_model: DEFAULT_HF_LLM_MODEL.to_string(),
            llm_max_tokens: 500,
            llm_temperature: 0.3,
            top_k_default: 3,
            chunk_size: 500,
            chunk_overlap: 50,
            max_upload_bytes: 100 * 1024 * 1024,
            request_timeout: Duration::from_secs(30),
        }
    }
}

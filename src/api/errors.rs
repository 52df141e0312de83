// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::kb::KbError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

/// Errors the HTTP surface can return
///
/// LLM failures never appear here: the synthesizer resolves them to an
/// extractive answer before the handler sees anything.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// Malformed request input, rejected before reaching the core
    InvalidRequest(String),
    /// Query against an empty knowledge base; user-visible, explicit
    EmptyKnowledgeBase,
    /// Embedding provider failed; the operation cannot proceed
    EmbeddingFailed(String),
    /// Internal invariant violation or unexpected failure
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let (error_type, message) = match self {
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone()),
            ApiError::EmptyKnowledgeBase => (
                "empty_knowledge_base",
                "No documents in knowledge base. Please upload documents first.".to_string(),
            ),
            ApiError::EmbeddingFailed(msg) => {
                ("embedding_error", format!("Embedding failed: {}", msg))
            }
            ApiError::InternalError(msg) => ("internal_error", msg.clone()),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            details: None,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) => 400,
            ApiError::EmptyKnowledgeBase => 400,
            ApiError::EmbeddingFailed(_) => 502,
            ApiError::InternalError(_) => 500,
        }
    }
}

impl From<KbError> for ApiError {
    fn from(err: KbError) -> Self {
        match err {
            KbError::InvalidTopK => ApiError::InvalidRequest("top_k must be at least 1".to_string()),
            KbError::EmptyKnowledgeBase => ApiError::EmptyKnowledgeBase,
            KbError::Embedding(e) => ApiError::EmbeddingFailed(e.to_string()),
            // Index, retrieval and chunker faults indicate a bug or broken
            // configuration; surface the diagnostic, not a generic message
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::EmptyKnowledgeBase => write!(f, "Knowledge base is empty"),
            ApiError::EmbeddingFailed(msg) => write!(f, "Embedding failed: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP API surface
//!
//! Request/response wire types plus the axum server. Routing and validation
//! stay here at the boundary; the knowledge base never sees a malformed
//! request.

pub mod errors;
pub mod http_server;

pub use errors::{ApiError, ErrorResponse};
pub use http_server::{router, start_server, AppState};

use serde::{Deserialize, Serialize};

use crate::kb::SourceRef;
use crate::synthesis::AnswerMode;

/// Per-file outcome of an upload batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStatus {
    pub filename: String,
    /// "success" or "error"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileStatus {
    pub fn success(filename: String, chunks: usize) -> Self {
        Self {
            filename,
            status: "success".to_string(),
            chunks: Some(chunks),
            error: None,
        }
    }

    pub fn error(filename: String, reason: String) -> Self {
        Self {
            filename,
            status: "error".to_string(),
            chunks: None,
            error: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub files: Vec<FileStatus>,
    pub total_documents: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Defaults to the configured TOP_K_RESULTS
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    /// Whether the answer was LLM-generated or extractive
    pub mode: AnswerMode,
    pub sources: Vec<SourceRef>,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsResponse {
    pub total_documents: usize,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub message: String,
    pub documents_remaining: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub documents_indexed: usize,
}

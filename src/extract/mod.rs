// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text extraction seam for uploaded files
//!
//! Format-specific extraction (PDF parsing and friends) lives behind this
//! trait as an external collaborator. The built-in implementation handles
//! plain-text formats only; anything else is a per-file error the upload
//! path reports without failing the batch.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported file format: {extension} (supported: .txt, .md)")]
    UnsupportedFormat { extension: String },

    #[error("File contains no extractable text: {filename}")]
    EmptyContent { filename: String },
}

/// Turns uploaded file bytes into plain text
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Plain-text extractor for .txt and .md uploads
///
/// Decodes UTF-8 first, falls back to Latin-1 so legacy text files are not
/// rejected outright.
#[derive(Debug, Default, Clone)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if extension != "txt" && extension != "md" {
            return Err(ExtractionError::UnsupportedFormat {
                extension: if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    format!(".{}", extension)
                },
            });
        }

        let text = match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            // Latin-1 maps every byte to a char, so this cannot fail
            Err(_) => bytes.iter().map(|&b| b as char).collect(),
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ExtractionError::EmptyContent {
                filename: filename.to_string(),
            });
        }
        Ok(trimmed.to_string())
    }
}

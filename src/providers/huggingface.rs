// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HuggingFace Inference API providers
//!
//! Two clients against the hosted inference endpoint: text generation for
//! answer synthesis and the feature-extraction pipeline for sentence
//! embeddings (all-MiniLM class models return a single 384-dim vector per
//! input when used through that pipeline).

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::{EmbeddingError, EmbeddingProvider, LlmError, LlmProvider};

const HF_API_BASE: &str = "https://api-inference.huggingface.co";

/// HuggingFace text-generation client
pub struct HuggingFaceLlm {
    api_key: String,
    model: String,
    client: Client,
    timeout: Duration,
}

impl HuggingFaceLlm {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key,
            model,
            client,
            timeout,
        }
    }
}

#[derive(Serialize)]
struct GenerationParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
}

#[async_trait]
impl LlmProvider for HuggingFaceLlm {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/models/{}", HF_API_BASE, self.model);
        let request = GenerationRequest {
            inputs: prompt,
            parameters: GenerationParameters {
                max_new_tokens: max_tokens,
                temperature,
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    LlmError::ApiError {
                        status: 0,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();

        if status == 429 {
            return Err(LlmError::RateLimited {
                retry_after_secs: 60,
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        // Response is [{"generated_text": "..."}]
        let data: Value = response.json().await.map_err(|e| LlmError::ApiError {
            status: 0,
            message: format!("JSON parse error: {}", e),
        })?;

        let answer = data
            .get(0)
            .and_then(|entry| entry.get("generated_text"))
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        if answer.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(answer)
    }

    fn name(&self) -> &'static str {
        "huggingface"
    }
}

/// HuggingFace feature-extraction embedding client
pub struct HuggingFaceEmbedder {
    api_key: String,
    model: String,
    dimension: usize,
    client: Client,
    timeout: Duration,
}

impl HuggingFaceEmbedder {
    /// # Arguments
    /// * `model` - Sentence-transformer model id
    /// * `dimension` - Expected output dimensionality; responses with any
    ///   other shape are rejected as malformed
    pub fn new(api_key: String, model: String, dimension: usize, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key,
            model,
            dimension,
            client,
            timeout,
        }
    }

    fn parse_vector(&self, data: Value) -> Result<Vec<f32>, EmbeddingError> {
        // The pipeline returns either a flat vector or a single-element batch
        let flat = match &data {
            Value::Array(items) if items.first().map_or(false, Value::is_array) => {
                data.get(0).cloned().unwrap_or(Value::Null)
            }
            _ => data,
        };

        let vector: Vec<f32> = flat
            .as_array()
            .ok_or_else(|| {
                EmbeddingError::MalformedResponse("expected an array of floats".to_string())
            })?
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| {
                EmbeddingError::MalformedResponse("non-numeric value in embedding".to_string())
            })?;

        if vector.len() != self.dimension {
            return Err(EmbeddingError::MalformedResponse(format!(
                "expected {}D embedding, got {}D",
                self.dimension,
                vector.len()
            )));
        }
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.api_key.is_empty() {
            return Err(EmbeddingError::NoApiKey {
                provider: "huggingface".to_string(),
            });
        }

        let url = format!(
            "{}/pipeline/feature-extraction/{}",
            HF_API_BASE, self.model
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "inputs": text }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    EmbeddingError::ApiError {
                        status: 0,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let data: Value = response.json().await.map_err(|e| {
            EmbeddingError::MalformedResponse(format!("JSON parse error: {}", e))
        })?;

        self.parse_vector(data)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "huggingface"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn embedder(dim: usize) -> HuggingFaceEmbedder {
        HuggingFaceEmbedder::new(
            "key".to_string(),
            "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dim,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_parse_flat_vector() {
        let v = embedder(3).parse_vector(json!([0.1, 0.2, 0.3])).unwrap();
        assert_eq!(v.len(), 3);
    }

    #[test]
    fn test_parse_batched_vector() {
        let v = embedder(2).parse_vector(json!([[0.5, -0.5]])).unwrap();
        assert_eq!(v, vec![0.5, -0.5]);
    }

    #[test]
    fn test_wrong_dimension_is_malformed() {
        let err = embedder(4).parse_vector(json!([0.1, 0.2])).unwrap_err();
        assert!(matches!(err, EmbeddingError::MalformedResponse(_)));
    }

    #[test]
    fn test_non_numeric_is_malformed() {
        let err = embedder(2).parse_vector(json!(["a", "b"])).unwrap_err();
        assert!(matches!(err, EmbeddingError::MalformedResponse(_)));
    }
}

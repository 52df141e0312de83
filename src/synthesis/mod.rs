// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Answer synthesis with extractive fallback
//!
//! Builds a grounded prompt from the retrieved chunks and issues one LLM
//! call. Synthesis never fails past this module: any LLM-side problem
//! (error, timeout, rate limit, missing configuration, empty output)
//! resolves to an extractive answer assembled from the top-ranked chunks,
//! labelled so the caller can tell the two apart.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::providers::{LlmError, LlmProvider};
use crate::retrieval::ScoredChunk;

/// Preview length used in extractive answers
const FALLBACK_PREVIEW_CHARS: usize = 300;

/// How many chunks an extractive answer quotes at most
const FALLBACK_MAX_CHUNKS: usize = 3;

#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    /// Character budget for the concatenated context block
    pub max_context_chars: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-request deadline for the LLM call
    pub llm_timeout: Duration,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 8000,
            max_tokens: 500,
            temperature: 0.3,
            llm_timeout: Duration::from_secs(30),
        }
    }
}

/// How an answer was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// LLM-synthesized from the retrieved context
    Generative,
    /// Composed directly from retrieved source text
    Extractive,
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub mode: AnswerMode,
}

/// Grounded answer synthesizer
///
/// Constructed without an LLM provider it runs extractive-only, which is a
/// valid configuration, not an error.
pub struct AnswerSynthesizer {
    llm: Option<Arc<dyn LlmProvider>>,
    config: SynthesizerConfig,
}

impl AnswerSynthesizer {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, config: SynthesizerConfig) -> Self {
        Self { llm, config }
    }

    /// Synthesize an answer from retrieved chunks
    ///
    /// Callers must not invoke this with zero chunks; the coordinator
    /// reports "no documents" before synthesis is reached.
    pub async fn synthesize(&self, query: &str, chunks: &[ScoredChunk]) -> Answer {
        debug_assert!(!chunks.is_empty(), "synthesize called with no chunks");

        let llm = match &self.llm {
            Some(llm) => llm,
            None => {
                tracing::debug!("No LLM provider configured, using extractive answer");
                return self.extractive_answer(chunks);
            }
        };

        let prompt = self.build_prompt(query, chunks);

        let result = timeout(
            self.config.llm_timeout,
            llm.complete(&prompt, self.config.max_tokens, self.config.temperature),
        )
        .await
        .unwrap_or(Err(LlmError::Timeout {
            timeout_ms: self.config.llm_timeout.as_millis() as u64,
        }));

        match result {
            Ok(text) if !text.trim().is_empty() => {
                tracing::info!(provider = llm.name(), "Generated answer with LLM");
                Answer {
                    text: text.trim().to_string(),
                    mode: AnswerMode::Generative,
                }
            }
            Ok(_) => {
                tracing::warn!(provider = llm.name(), "LLM returned empty answer, falling back");
                self.extractive_answer(chunks)
            }
            Err(e) => {
                tracing::warn!(provider = llm.name(), error = %e, "LLM call failed, falling back");
                self.extractive_answer(chunks)
            }
        }
    }

    /// Assemble the grounded prompt, dropping lowest-relevance chunks when
    /// the context block would exceed the budget.
    fn build_prompt(&self, query: &str, chunks: &[ScoredChunk]) -> String {
        let mut context = String::new();
        for scored in chunks {
            let block = format!(
                "[Source: {}, Chunk {}]\n{}\n\n",
                scored.chunk.source, scored.chunk.ordinal, scored.chunk.text
            );
            if !context.is_empty()
                && context.chars().count() + block.chars().count() > self.config.max_context_chars
            {
                // Chunks arrive ranked, so everything past this point is
                // lower relevance and gets dropped
                break;
            }
            context.push_str(&block);
        }
        if context.chars().count() > self.config.max_context_chars {
            context = context.chars().take(self.config.max_context_chars).collect();
        }

        format!(
            "Using the following documents from the knowledge base, answer the \
user's question succinctly and accurately.\n\n\
Context from documents:\n{context}\n\
User's question: {query}\n\n\
Instructions:\n\
- Provide a clear, concise answer based on the context\n\
- If the context doesn't contain enough information, say so\n\
- Cite sources when possible (e.g., \"According to [source]...\")\n\
- Be factual and don't make up information\n\n\
Answer:"
        )
    }

    /// Extractive answer: a short digest of the top-ranked chunks
    fn extractive_answer(&self, chunks: &[ScoredChunk]) -> Answer {
        let mut text = String::from("Based on the available documents:\n\n");
        for (i, scored) in chunks.iter().take(FALLBACK_MAX_CHUNKS).enumerate() {
            text.push_str(&format!(
                "{}. From {}:\n{}\n\n",
                i + 1,
                scored.chunk.source,
                preview(&scored.chunk.text, FALLBACK_PREVIEW_CHARS)
            ));
        }
        Answer {
            text: text.trim_end().to_string(),
            mode: AnswerMode::Extractive,
        }
    }
}

/// Truncate text to `max_chars` characters, appending an ellipsis when cut
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{FailingLlm, StaticLlm};
    use crate::store::Chunk;

    fn scored(id: u64, text: &str, relevance: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id,
                text: text.to_string(),
                source: "doc.txt".to_string(),
                ordinal: id as usize,
                embedding: vec![],
            },
            distance: 1.0 / relevance - 1.0,
            relevance,
        }
    }

    #[tokio::test]
    async fn test_generative_answer_on_success() {
        let synthesizer = AnswerSynthesizer::new(
            Some(Arc::new(StaticLlm::new("The answer is 42."))),
            SynthesizerConfig::default(),
        );
        let answer = synthesizer
            .synthesize("what is the answer?", &[scored(0, "answer: 42", 0.9)])
            .await;
        assert_eq!(answer.mode, AnswerMode::Generative);
        assert_eq!(answer.text, "The answer is 42.");
    }

    #[tokio::test]
    async fn test_fallback_on_llm_failure_quotes_top_chunk() {
        let llm = Arc::new(FailingLlm::new());
        let synthesizer =
            AnswerSynthesizer::new(Some(llm.clone()), SynthesizerConfig::default());
        let chunks = vec![
            scored(0, "most relevant passage", 0.9),
            scored(1, "less relevant passage", 0.5),
        ];
        let answer = synthesizer.synthesize("query", &chunks).await;

        assert_eq!(answer.mode, AnswerMode::Extractive);
        assert!(answer.text.contains("most relevant passage"));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_fallback_when_no_llm_configured() {
        let synthesizer = AnswerSynthesizer::new(None, SynthesizerConfig::default());
        let answer = synthesizer
            .synthesize("query", &[scored(0, "the only passage", 0.8)])
            .await;
        assert_eq!(answer.mode, AnswerMode::Extractive);
        assert!(answer.text.contains("the only passage"));
    }

    #[tokio::test]
    async fn test_empty_llm_output_triggers_fallback() {
        let synthesizer = AnswerSynthesizer::new(
            Some(Arc::new(StaticLlm::new("   "))),
            SynthesizerConfig::default(),
        );
        let answer = synthesizer
            .synthesize("query", &[scored(0, "passage text", 0.8)])
            .await;
        assert_eq!(answer.mode, AnswerMode::Extractive);
    }

    #[tokio::test]
    async fn test_context_budget_drops_lowest_relevance_first() {
        let config = SynthesizerConfig {
            max_context_chars: 120,
            ..Default::default()
        };
        let synthesizer = AnswerSynthesizer::new(None, config.clone());
        let chunks = vec![
            scored(0, &"a".repeat(80), 0.9),
            scored(1, &"b".repeat(80), 0.5),
        ];
        let prompt = synthesizer.build_prompt("q", &chunks);
        assert!(prompt.contains(&"a".repeat(80)));
        assert!(!prompt.contains(&"b".repeat(80)));
    }

    #[tokio::test]
    async fn test_fallback_truncates_long_chunks() {
        let synthesizer = AnswerSynthesizer::new(None, SynthesizerConfig::default());
        let long_text = "x".repeat(500);
        let answer = synthesizer.synthesize("q", &[scored(0, &long_text, 0.8)]).await;
        assert!(answer.text.contains("..."));
        assert!(!answer.text.contains(&"x".repeat(301)));
    }

    #[test]
    fn test_preview_edge_cases() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("exactly10!", 10), "exactly10!");
        assert_eq!(preview("0123456789abc", 10), "0123456789...");
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Knowledge base coordinator
//!
//! Owns the vector index and chunk store as one consistent unit behind a
//! single lock. Provider calls (embedding, LLM) are long-latency external
//! I/O and never happen while the lock is held: ingest computes all vectors
//! first and takes the write lock only for the in-memory insert, query
//! embeds and synthesizes outside the lock and holds a read lock just long
//! enough to search and resolve chunks. Readers therefore always observe
//! either the fully-pre- or fully-post-mutation state, never a torn one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::timeout;

use crate::chunker::{chunk_text, ChunkerConfig, ChunkerError};
use crate::config::NodeConfig;
use crate::index::{FlatIndex, IndexError};
use crate::providers::{EmbeddingError, EmbeddingProvider, LlmProvider};
use crate::retrieval::{rank, RetrievalError, ScoredChunk};
use crate::store::{Chunk, ChunkStore};
use crate::synthesis::{preview, AnswerMode, AnswerSynthesizer, SynthesizerConfig};

/// Source preview length in query responses
const SOURCE_PREVIEW_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum KbError {
    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error("No documents in knowledge base. Please upload documents first.")]
    EmptyKnowledgeBase,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Chunker(#[from] ChunkerError),
}

/// One ingested file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    /// Chunk ids in document order
    pub chunk_ids: Vec<u64>,
}

/// A cited source in a query result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: String,
    pub chunk_id: u64,
    pub ordinal: usize,
    pub score: f32,
    pub preview: String,
}

/// Answer plus citations, built fresh per query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub mode: AnswerMode,
    pub sources: Vec<SourceRef>,
}

/// Index, store and document records guarded as one unit
struct KbState {
    index: FlatIndex,
    store: ChunkStore,
    documents: Vec<DocumentRecord>,
    next_chunk_id: u64,
}

/// Top-level retrieval-and-synthesis engine
///
/// One instance per process, injected into request handlers; tests construct
/// isolated instances with their own providers.
pub struct KnowledgeBase {
    state: RwLock<KbState>,
    embedder: Arc<dyn EmbeddingProvider>,
    synthesizer: AnswerSynthesizer,
    chunker: ChunkerConfig,
    request_timeout: Duration,
}

impl KnowledgeBase {
    pub fn new(
        config: &NodeConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Result<Self, KbError> {
        let chunker = ChunkerConfig::new(config.chunk_size, config.chunk_overlap)?;
        let synthesizer = AnswerSynthesizer::new(
            llm,
            SynthesizerConfig {
                max_tokens: config.llm_max_tokens,
                temperature: config.llm_temperature,
                llm_timeout: config.request_timeout,
                ..Default::default()
            },
        );
        let dimension = embedder.dimension();

        Ok(Self {
            state: RwLock::new(KbState {
                index: FlatIndex::new(dimension),
                store: ChunkStore::new(),
                documents: Vec::new(),
                next_chunk_id: 0,
            }),
            embedder,
            synthesizer,
            chunker,
            request_timeout: config.request_timeout,
        })
    }

    /// Ingest one document: chunk, embed, then apply to index and store as
    /// a single atomic unit.
    ///
    /// Returns the number of chunks indexed. A document that produces no
    /// chunks (empty text) is a no-op, not an error.
    pub async fn ingest(&self, filename: &str, text: &str) -> Result<usize, KbError> {
        let chunk_texts = chunk_text(text, self.chunker);
        if chunk_texts.is_empty() {
            tracing::warn!(filename, "Document produced no chunks");
            return Ok(0);
        }
        tracing::debug!(filename, chunks = chunk_texts.len(), "Chunked document");

        // Embeddings are computed before the lock is taken; the write
        // section below is pure in-memory work.
        let embeddings = self.embed_batch(&chunk_texts).await?;

        let mut state = self.state.write().await;
        let first_id = state.next_chunk_id;
        state.next_chunk_id += chunk_texts.len() as u64;
        let ids: Vec<u64> = (0..chunk_texts.len() as u64).map(|i| first_id + i).collect();

        state.index.insert(&ids, embeddings.clone())?;
        for ((&id, text), embedding) in ids.iter().zip(chunk_texts).zip(embeddings) {
            let ordinal = (id - first_id) as usize;
            state.store.insert(Chunk {
                id,
                text,
                source: filename.to_string(),
                ordinal,
                embedding,
            });
        }
        state.documents.push(DocumentRecord {
            filename: filename.to_string(),
            uploaded_at: Utc::now(),
            chunk_ids: ids.clone(),
        });

        debug_assert_eq!(state.index.len(), state.store.len());
        tracing::info!(filename, chunks = ids.len(), "Indexed document");
        Ok(ids.len())
    }

    /// Answer a query: embed, retrieve the top_k chunks, synthesize
    pub async fn query(&self, text: &str, top_k: usize) -> Result<QueryResult, KbError> {
        if top_k == 0 {
            return Err(KbError::InvalidTopK);
        }
        if self.document_count().await == 0 {
            return Err(KbError::EmptyKnowledgeBase);
        }

        let query_vector = self.embed_one(text).await?;

        // Read lock held only across search + chunk resolution; the ranked
        // chunks are owned, so the LLM call runs against a stable snapshot.
        let ranked: Vec<ScoredChunk> = {
            let state = self.state.read().await;
            rank(&state.index, &state.store, &query_vector, top_k)?
        };

        if ranked.is_empty() {
            // A concurrent clear emptied the base between the count check
            // and the search
            return Err(KbError::EmptyKnowledgeBase);
        }

        let answer = self.synthesizer.synthesize(text, &ranked).await;

        let sources = ranked
            .iter()
            .map(|scored| SourceRef {
                source: scored.chunk.source.clone(),
                chunk_id: scored.chunk.id,
                ordinal: scored.chunk.ordinal,
                score: scored.relevance,
                preview: preview(&scored.chunk.text, SOURCE_PREVIEW_CHARS),
            })
            .collect();

        Ok(QueryResult {
            answer: answer.text,
            mode: answer.mode,
            sources,
        })
    }

    /// Filenames in ingest order, deduplicated
    pub async fn list_documents(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut seen = std::collections::HashSet::new();
        state
            .documents
            .iter()
            .filter(|d| seen.insert(d.filename.clone()))
            .map(|d| d.filename.clone())
            .collect()
    }

    /// Number of distinct documents, by filename
    ///
    /// Re-ingesting a filename adds chunks but not a second document, so
    /// this always agrees with `list_documents().len()`.
    pub async fn document_count(&self) -> usize {
        let state = self.state.read().await;
        let mut seen = std::collections::HashSet::new();
        state
            .documents
            .iter()
            .filter(|d| seen.insert(d.filename.as_str()))
            .count()
    }

    pub async fn chunk_count(&self) -> usize {
        self.state.read().await.store.len()
    }

    /// Number of vectors in the index; always equals `chunk_count`
    pub async fn vector_count(&self) -> usize {
        self.state.read().await.index.len()
    }

    /// Drop every document, chunk and vector atomically
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.index.clear();
        state.store.clear();
        state.documents.clear();
        // next_chunk_id is not reset: ids stay unique for the lifetime of
        // the instance
        tracing::info!("Knowledge base cleared");
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, KbError> {
        let vector = timeout(self.request_timeout, self.embedder.embed(text))
            .await
            .map_err(|_| EmbeddingError::Timeout {
                timeout_ms: self.request_timeout.as_millis() as u64,
            })??;
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
        let vectors = timeout(self.request_timeout, self.embedder.embed_batch(texts))
            .await
            .map_err(|_| EmbeddingError::Timeout {
                timeout_ms: self.request_timeout.as_millis() as u64,
            })??;
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{FailingLlm, HashEmbedder, StaticLlm};

    fn test_config() -> NodeConfig {
        NodeConfig {
            embedding_dimension: 64,
            chunk_size: 100,
            chunk_overlap: 20,
            ..Default::default()
        }
    }

    fn kb_with_llm(llm: Option<Arc<dyn LlmProvider>>) -> KnowledgeBase {
        KnowledgeBase::new(&test_config(), Arc::new(HashEmbedder::new(64)), llm).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_reports_chunk_count() {
        let kb = kb_with_llm(None);
        let text = "word ".repeat(60); // 300 chars -> several chunks
        let count = kb.ingest("doc.txt", &text).await.unwrap();
        assert!(count >= 3);
        assert_eq!(kb.chunk_count().await, count);
        assert_eq!(kb.document_count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_document_is_noop() {
        let kb = kb_with_llm(None);
        assert_eq!(kb.ingest("empty.txt", "").await.unwrap(), 0);
        assert_eq!(kb.document_count().await, 0);
    }

    #[tokio::test]
    async fn test_query_empty_kb_is_error() {
        let kb = kb_with_llm(None);
        let err = kb.query("anything", 3).await.unwrap_err();
        assert!(matches!(err, KbError::EmptyKnowledgeBase));
    }

    #[tokio::test]
    async fn test_query_zero_top_k_rejected() {
        let kb = kb_with_llm(None);
        kb.ingest("doc.txt", "some content here").await.unwrap();
        let err = kb.query("q", 0).await.unwrap_err();
        assert!(matches!(err, KbError::InvalidTopK));
    }

    #[tokio::test]
    async fn test_query_returns_generative_answer_and_sources() {
        let kb = kb_with_llm(Some(Arc::new(StaticLlm::new("synthesized"))));
        kb.ingest("doc.txt", "rust is a systems programming language")
            .await
            .unwrap();

        let result = kb.query("what is rust", 3).await.unwrap();
        assert_eq!(result.answer, "synthesized");
        assert_eq!(result.mode, AnswerMode::Generative);
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].source, "doc.txt");
        assert!(result.sources[0].score > 0.0);
    }

    #[tokio::test]
    async fn test_query_falls_back_when_llm_fails() {
        let kb = kb_with_llm(Some(Arc::new(FailingLlm::new())));
        kb.ingest("doc.txt", "the moon orbits the earth").await.unwrap();

        let result = kb.query("moon", 3).await.unwrap();
        assert_eq!(result.mode, AnswerMode::Extractive);
        assert!(result.answer.contains("the moon orbits the earth"));
    }

    #[tokio::test]
    async fn test_chunk_ids_stay_monotonic_across_documents() {
        let kb = kb_with_llm(None);
        kb.ingest("a.txt", &"alpha ".repeat(50)).await.unwrap();
        kb.ingest("b.txt", &"beta ".repeat(50)).await.unwrap();

        let result = kb.query("alpha", 10).await.unwrap();
        let mut ids: Vec<u64> = result.sources.iter().map(|s| s.chunk_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), result.sources.len(), "chunk ids must be unique");
    }

    #[tokio::test]
    async fn test_clear_empties_everything() {
        let kb = kb_with_llm(None);
        kb.ingest("a.txt", "content one").await.unwrap();
        kb.ingest("b.txt", "content two").await.unwrap();

        kb.clear().await;
        assert_eq!(kb.document_count().await, 0);
        assert_eq!(kb.chunk_count().await, 0);
        assert!(kb.list_documents().await.is_empty());
        assert!(matches!(
            kb.query("q", 3).await.unwrap_err(),
            KbError::EmptyKnowledgeBase
        ));
    }

    #[tokio::test]
    async fn test_reingest_does_not_inflate_document_count() {
        let kb = kb_with_llm(None);
        kb.ingest("a.txt", "first version").await.unwrap();
        kb.ingest("b.txt", "other document").await.unwrap();
        kb.ingest("a.txt", "second version").await.unwrap();

        assert_eq!(kb.document_count().await, 2);
        assert_eq!(kb.document_count().await, kb.list_documents().await.len());
    }

    #[tokio::test]
    async fn test_list_documents_in_order_deduplicated() {
        let kb = kb_with_llm(None);
        kb.ingest("first.txt", "one").await.unwrap();
        kb.ingest("second.txt", "two").await.unwrap();
        kb.ingest("first.txt", "one again").await.unwrap();

        assert_eq!(kb.list_documents().await, vec!["first.txt", "second.txt"]);
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod chunker;
pub mod config;
pub mod extract;
pub mod index;
pub mod kb;
pub mod providers;
pub mod retrieval;
pub mod store;
pub mod synthesis;

// Re-export main types
pub use chunker::{chunk_text, ChunkerConfig, ChunkerError, Chunks};
pub use config::{ConfigError, LlmBackend, NodeConfig};
pub use extract::{ExtractionError, PlainTextExtractor, TextExtractor};
pub use index::{relevance_from_distance, FlatIndex, IndexError, SearchHit};
pub use kb::{DocumentRecord, KbError, KnowledgeBase, QueryResult, SourceRef};
pub use providers::{
    EmbeddingError, EmbeddingProvider, FailingLlm, HashEmbedder, HuggingFaceEmbedder,
    HuggingFaceLlm, LlmError, LlmProvider, OpenAiLlm, StaticLlm,
};
pub use retrieval::{rank, RetrievalError, ScoredChunk};
pub use store::{Chunk, ChunkStore};
pub use synthesis::{Answer, AnswerMode, AnswerSynthesizer, SynthesizerConfig};

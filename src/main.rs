// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use kb_rag_node::{
    api::{start_server, AppState},
    config::{LlmBackend, NodeConfig},
    providers::{
        EmbeddingProvider, HashEmbedder, HuggingFaceEmbedder, HuggingFaceLlm, LlmProvider,
        OpenAiLlm,
    },
    extract::PlainTextExtractor,
    kb::KnowledgeBase,
};
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = NodeConfig::from_env()?;
    tracing::info!(
        port = config.api_port,
        embedding_model = %config.embedding_model,
        llm_backend = ?config.llm_backend,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "Starting knowledge base node"
    );

    let embedder: Arc<dyn EmbeddingProvider> = match &config.huggingface_api_key {
        Some(key) => Arc::new(HuggingFaceEmbedder::new(
            key.clone(),
            config.embedding_model.clone(),
            config.embedding_dimension,
            config.request_timeout,
        )),
        None => {
            tracing::warn!(
                "HUGGINGFACE_API_KEY not set, using deterministic local embeddings"
            );
            Arc::new(HashEmbedder::new(config.embedding_dimension))
        }
    };

    let llm: Option<Arc<dyn LlmProvider>> = match config.llm_backend {
        LlmBackend::OpenAi => match &config.openai_api_key {
            Some(key) => Some(Arc::new(OpenAiLlm::new(
                key.clone(),
                config.llm_model.clone(),
                config.request_timeout,
            ))),
            None => {
                tracing::warn!("OPENAI_API_KEY not set, answers will use the extractive fallback");
                None
            }
        },
        LlmBackend::HuggingFace => match &config.huggingface_api_key {
            Some(key) => Some(Arc::new(HuggingFaceLlm::new(
                key.clone(),
                config.llm_model.clone(),
                config.request_timeout,
            ))),
            None => {
                tracing::warn!(
                    "HUGGINGFACE_API_KEY not set, answers will use the extractive fallback"
                );
                None
            }
        },
        LlmBackend::None => {
            tracing::info!("LLM_PROVIDER=none, answers will use the extractive fallback");
            None
        }
    };

    let kb = Arc::new(KnowledgeBase::new(&config, embedder, llm)?);

    let state = AppState {
        kb,
        extractor: Arc::new(PlainTextExtractor::new()),
        config: Arc::new(config),
    };

    start_server(state)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

use axum::{
    extract::{DefaultBodyLimit, Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use axum_extra::extract::Multipart;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{
    ApiError, ClearResponse, DocumentsResponse, FileStatus, HealthResponse, QueryRequest,
    QueryResponse, UploadResponse,
};
use crate::config::NodeConfig;
use crate::extract::TextExtractor;
use crate::kb::KnowledgeBase;

#[derive(Clone)]
pub struct AppState {
    pub kb: Arc<KnowledgeBase>,
    pub extractor: Arc<dyn TextExtractor>,
    pub config: Arc<NodeConfig>,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + 64 * 1024; // multipart framing slack

    Router::new()
        .route("/", get(root_handler))
        .route("/upload", post(upload_handler))
        .route("/query", post(query_handler))
        .route("/documents", get(documents_handler))
        .route("/clear", delete(clear_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let port = state.config.api_port;
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "message": "Knowledge Base Search Engine API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/upload": "POST - Upload documents",
            "/query": "POST - Query the knowledge base",
            "/documents": "GET - List indexed documents",
            "/clear": "DELETE - Clear all documents",
            "/health": "GET - Health check"
        }
    }))
}

/// Upload one or more documents
///
/// Per-file failures (unsupported format, oversized, embedding error) are
/// reported in the per-file status and never abort the rest of the batch.
/// The whole request fails only when no file succeeded.
async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiErrorResponse> {
    let mut files: Vec<FileStatus> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        let filename = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue, // non-file form field
        };

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                files.push(FileStatus::error(
                    filename,
                    format!("Failed to read upload: {}", e),
                ));
                continue;
            }
        };

        if bytes.len() > state.config.max_upload_bytes {
            files.push(FileStatus::error(
                filename,
                format!(
                    "File too large: {} bytes (max: {})",
                    bytes.len(),
                    state.config.max_upload_bytes
                ),
            ));
            continue;
        }

        let text = match state.extractor.extract(&filename, &bytes).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(filename, error = %e, "Extraction failed");
                files.push(FileStatus::error(filename, e.to_string()));
                continue;
            }
        };

        match state.kb.ingest(&filename, &text).await {
            Ok(chunks) => files.push(FileStatus::success(filename, chunks)),
            Err(e) => {
                tracing::error!(filename, error = %e, "Ingest failed");
                files.push(FileStatus::error(filename, e.to_string()));
            }
        }
    }

    if files.is_empty() {
        return Err(ApiError::InvalidRequest("No files in upload".to_string()).into());
    }

    let any_success = files.iter().any(|f| f.status == "success");
    let body = UploadResponse {
        message: format!("Processed {} file(s)", files.len()),
        files,
        total_documents: state.kb.document_count().await,
    };

    let status = if any_success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(body)).into_response())
}

async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiErrorResponse> {
    if request.query.trim().is_empty() {
        return Err(ApiError::InvalidRequest("query must not be empty".to_string()).into());
    }
    let top_k = request.top_k.unwrap_or(state.config.top_k_default);
    if top_k == 0 {
        return Err(ApiError::InvalidRequest("top_k must be at least 1".to_string()).into());
    }

    let result = state
        .kb
        .query(&request.query, top_k)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(QueryResponse {
        answer: result.answer,
        mode: result.mode,
        sources: result.sources,
        query: request.query,
    }))
}

async fn documents_handler(State(state): State<AppState>) -> Json<DocumentsResponse> {
    let documents = state.kb.list_documents().await;
    Json(DocumentsResponse {
        total_documents: documents.len(),
        documents,
    })
}

async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.kb.clear().await;
    Json(ClearResponse {
        message: "Knowledge base cleared successfully".to_string(),
        documents_remaining: 0,
    })
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        documents_indexed: state.kb.document_count().await,
    })
}

// Error response wrapper
pub struct ApiErrorResponse(ApiError);

impl From<ApiError> for ApiErrorResponse {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.to_response())).into_response()
    }
}

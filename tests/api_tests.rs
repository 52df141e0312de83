// HTTP surface tests: routing, response shapes and error mapping,
// driven through the router with tower's oneshot

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use kb_rag_node::{
    api::{router, AppState},
    HashEmbedder, KnowledgeBase, NodeConfig, PlainTextExtractor, StaticLlm,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const DIM: usize = 64;

fn test_state(with_llm: bool) -> AppState {
    let config = NodeConfig {
        embedding_dimension: DIM,
        chunk_size: 500,
        chunk_overlap: 50,
        ..Default::default()
    };
    let llm: Option<Arc<dyn kb_rag_node::LlmProvider>> = if with_llm {
        Some(Arc::new(StaticLlm::new("An answer from the model.")))
    } else {
        None
    };
    let kb = Arc::new(
        KnowledgeBase::new(&config, Arc::new(HashEmbedder::new(DIM)), llm).unwrap(),
    );
    AppState {
        kb,
        extractor: Arc::new(PlainTextExtractor::new()),
        config: Arc::new(config),
    }
}

fn multipart_body(boundary: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (filename, content) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; \
filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn upload(state: &AppState, files: &[(&str, &str)]) -> (StatusCode, Value) {
    let boundary = "kbtestboundary";
    let request = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart_body(boundary, files)))
        .unwrap();
    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    (status, json_body(response).await)
}

async fn get(state: &AppState, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    (status, json_body(response).await)
}

async fn post_query(state: &AppState, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/query")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    (status, json_body(response).await)
}

#[tokio::test]
async fn test_health_reports_document_count() {
    let state = test_state(false);
    let (status, body) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["documents_indexed"], 0);

    state.kb.ingest("doc.txt", "some text").await.unwrap();
    let (_, body) = get(&state, "/health").await;
    assert_eq!(body["documents_indexed"], 1);
}

#[tokio::test]
async fn test_root_banner() {
    let state = test_state(false);
    let (status, body) = get(&state, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["endpoints"]["/query"].is_string());
}

#[tokio::test]
async fn test_upload_reports_per_file_status() {
    let state = test_state(false);
    let (status, body) = upload(
        &state,
        &[
            ("good.txt", "valid text content for the knowledge base"),
            ("bad.pdf", "%PDF-1.4 binary-ish"),
        ],
    )
    .await;

    // One valid file is enough for an overall 200
    assert_eq!(status, StatusCode::OK);
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["status"], "success");
    assert!(files[0]["chunks"].as_u64().unwrap() >= 1);
    assert_eq!(files[1]["status"], "error");
    assert!(files[1]["error"].as_str().unwrap().contains("Unsupported"));
    assert_eq!(body["total_documents"], 1);
}

#[tokio::test]
async fn test_upload_with_no_valid_files_is_400() {
    let state = test_state(false);
    let (status, body) = upload(&state, &[("a.pdf", "x"), ("b.png", "y")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let files = body["files"].as_array().unwrap();
    assert!(files.iter().all(|f| f["status"] == "error"));
}

#[tokio::test]
async fn test_query_empty_base_maps_to_400_with_message() {
    let state = test_state(false);
    let (status, body) = post_query(&state, serde_json::json!({"query": "hello"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "empty_knowledge_base");
    assert!(body["message"].as_str().unwrap().contains("upload"));
}

#[tokio::test]
async fn test_query_validation_rejects_blank_and_zero_k() {
    let state = test_state(false);
    let (status, body) = post_query(&state, serde_json::json!({"query": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "invalid_request");

    let (status, _) =
        post_query(&state, serde_json::json!({"query": "q", "top_k": 0})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_query_returns_answer_sources_and_query_echo() {
    let state = test_state(true);
    upload(&state, &[("facts.txt", "the sky appears blue because of rayleigh scattering")])
        .await;

    let (status, body) = post_query(
        &state,
        serde_json::json!({"query": "why is the sky blue", "top_k": 2}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "An answer from the model.");
    assert_eq!(body["mode"], "generative");
    assert_eq!(body["query"], "why is the sky blue");
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["source"], "facts.txt");
    assert!(sources[0]["score"].as_f64().unwrap() > 0.0);
    assert!(sources[0]["preview"].as_str().unwrap().contains("rayleigh"));
}

#[tokio::test]
async fn test_extractive_answer_is_labelled() {
    let state = test_state(false); // no LLM configured
    upload(&state, &[("doc.txt", "glass is an amorphous solid")]).await;

    let (status, body) = post_query(&state, serde_json::json!({"query": "glass"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "extractive");
    assert!(body["answer"].as_str().unwrap().contains("amorphous"));
}

#[tokio::test]
async fn test_documents_and_clear_flow() {
    let state = test_state(false);
    upload(&state, &[("one.txt", "first document")]).await;
    upload(&state, &[("two.txt", "second document")]).await;

    let (_, body) = get(&state, "/documents").await;
    assert_eq!(body["total_documents"], 2);
    assert_eq!(
        body["documents"].as_array().unwrap().len(),
        2
    );

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/clear")
        .body(Body::empty())
        .unwrap();
    let response = router(state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["documents_remaining"], 0);

    let (_, body) = get(&state, "/documents").await;
    assert_eq!(body["total_documents"], 0);
    let (_, body) = get(&state, "/health").await;
    assert_eq!(body["documents_indexed"], 0);
}

#[tokio::test]
async fn test_health_and_documents_agree_after_reupload() {
    let state = test_state(false);
    upload(&state, &[("a.txt", "first version of a")]).await;
    upload(&state, &[("b.txt", "the b document")]).await;
    upload(&state, &[("a.txt", "second version of a")]).await;

    let (_, documents) = get(&state, "/documents").await;
    let (_, health) = get(&state, "/health").await;
    assert_eq!(documents["total_documents"], 2);
    assert_eq!(health["documents_indexed"], documents["total_documents"]);
}

#[tokio::test]
async fn test_oversized_file_is_per_file_error() {
    let mut config = NodeConfig {
        embedding_dimension: DIM,
        ..Default::default()
    };
    config.max_upload_bytes = 64;
    let kb = Arc::new(
        KnowledgeBase::new(&config, Arc::new(HashEmbedder::new(DIM)), None).unwrap(),
    );
    let state = AppState {
        kb,
        extractor: Arc::new(PlainTextExtractor::new()),
        config: Arc::new(config),
    };

    let big = "x".repeat(200);
    let (status, body) = upload(&state, &[("big.txt", &big), ("small.txt", "tiny")]).await;
    assert_eq!(status, StatusCode::OK);
    let files = body["files"].as_array().unwrap();
    assert_eq!(files[0]["status"], "error");
    assert!(files[0]["error"].as_str().unwrap().contains("too large"));
    assert_eq!(files[1]["status"], "success");
}

//! HTTP API.

mod handlers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::AppContext;

pub use handlers::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AppContext>,
}

/// Build the router with open CORS and request tracing.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let body_limit = ctx.config.server.max_upload_bytes;
    let state = AppState { ctx };

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/documents", get(handlers::documents))
        .route("/ask", post(handlers::ask))
        .route("/upload", post(handlers::upload))
        .route("/upload-pdf", post(handlers::upload))
        .route("/ingest", post(handlers::ingest))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn serve<F>(ctx: Arc<AppContext>, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::models::Config;
    use crate::services::SqliteStore;
    use crate::services::testing::{FAKE_DIMENSION, FakeEmbedder, RecordingCompletion};

    const BOUNDARY: &str = "ragchat-test-boundary";

    fn test_app(dir: &TempDir, ingest_on_upload: bool) -> Router {
        let mut config = Config::default();
        config.storage.upload_dir = dir.path().join("uploads");
        config.server.ingest_on_upload = ingest_on_upload;

        let store = SqliteStore::open(&dir.path().join("store.db"), FAKE_DIMENSION).unwrap();
        let ctx = AppContext::from_parts(
            config,
            Arc::new(FakeEmbedder::default()),
            Arc::new(store),
            Arc::new(RecordingCompletion::new("It is blue.")),
        );
        router(Arc::new(ctx))
    }

    fn multipart_body(filename: &str, content: &[u8]) -> Body {
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn upload_request(filename: &str, content: impl AsRef<[u8]>) -> Request<Body> {
        Request::post("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body(filename, content.as_ref()))
            .unwrap()
    }

    fn ask_request(body: &str) -> Request<Body> {
        Request::post("/ask")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_root_reports_running() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);

        let (status, body) = send(&app, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "RAG API running");
    }

    #[tokio::test]
    async fn test_ask_rejects_blank_question() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);

        let (status, body) = send(&app, ask_request(r#"{"question": "   "}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_ask_rejects_malformed_body() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);

        let (status, body) = send(&app, ask_request(r#"{"q": 1}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_ask_empty_store_returns_canned_answer() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);

        let (status, body) = send(&app, ask_request(r#"{"question": "What color is the sky?"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], crate::services::NO_DOCUMENTS_ANSWER);
        assert_eq!(body["kind"], "no_documents");
    }

    #[tokio::test]
    async fn test_upload_rejects_disallowed_extension() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);

        let (status, body) = send(&app, upload_request("tool.exe", "MZ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert!(!dir.path().join("uploads").join("tool.exe").exists());
    }

    #[tokio::test]
    async fn test_upload_twice_skips_second() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);

        let (status, body) = send(&app, upload_request("sky.txt", "The sky is blue.")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "File uploaded");
        assert_eq!(body["filename"], "sky.txt");

        let (status, body) = send(&app, upload_request("sky.txt", "Something else.")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "File already exists, skipping upload");

        let saved = std::fs::read_to_string(dir.path().join("uploads").join("sky.txt")).unwrap();
        assert_eq!(saved, "The sky is blue.");
    }

    #[tokio::test]
    async fn test_pdf_upload_twice_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, true);

        let source = dir.path().join("source.pdf");
        crate::sources::pdf_tests::write_pdf(&source, &["Quarterly revenue grew.", "Costs fell."]);
        let pdf = std::fs::read(&source).unwrap();

        let (status, body) = send(&app, upload_request("report.pdf", &pdf)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "File uploaded and ingested");

        let (_, before) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(before["documents"], 1);
        assert_eq!(before["chunks"], 2);

        let (status, body) = send(&app, upload_request("report.pdf", &pdf)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "File already exists, skipping upload");
        assert_eq!(body["filename"], "report.pdf");

        let (_, after) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(after["documents"], before["documents"]);
        assert_eq!(after["chunks"], before["chunks"]);
    }

    #[tokio::test]
    async fn test_upload_ingests_then_answers() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, true);

        let (status, body) = send(&app, upload_request("sky.txt", "The sky is blue.")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "File uploaded and ingested");
        assert_eq!(body["ingest"]["status"], "ingested");

        let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["documents"], 1);
        assert_eq!(body["chunks"], 1);

        let (_, body) = send(&app, Request::get("/documents").body(Body::empty()).unwrap()).await;
        assert_eq!(body["documents"][0]["filename"], "sky.txt");
        assert_eq!(body["documents"][0]["chunk_count"], 1);

        let (status, body) = send(&app, ask_request(r#"{"question": "What color is the sky?"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "It is blue.");
        assert_eq!(body["sources"][0]["filename"], "sky.txt");
    }

    #[tokio::test]
    async fn test_ingest_endpoint_reports_nothing_to_do() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);

        let request = Request::post("/ingest").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "nothing_to_ingest");
        assert_eq!(body["stage"], "scanning");
    }
}

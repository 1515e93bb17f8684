use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::error::{IngestError, QueryError, UploadError, VectorStoreError};
use crate::services::{UploadOutcome, save_upload};

/// Error payload `{"error": "..."}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(error = %message, "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::InvalidQuestion(message) => Self::bad_request(message),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::InvalidFilename(_) | UploadError::NotAllowed(_) => {
                Self::bad_request(e.to_string())
            }
            UploadError::Io(_) => Self::internal(e.to_string()),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<VectorStoreError> for ApiError {
    fn from(e: VectorStoreError) -> Self {
        Self::internal(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

pub async fn root() -> impl IntoResponse {
    Json(json!({ "status": "RAG API running" }))
}

pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let ctx = &state.ctx;
    let healthy = ctx.store.health_check().await?;
    let documents = ctx.store.document_count().await?;
    let chunks = ctx.store.chunk_count().await?;

    Ok(Json(json!({
        "status": if healthy { "ok" } else { "degraded" },
        "vector_store": ctx.store.driver().to_string(),
        "documents": documents,
        "chunks": chunks,
        "embedding_model": ctx.embedder.model_id(),
    })))
}

pub async fn documents(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let records = state.ctx.store.list_documents().await?;
    Ok(Json(json!({ "documents": records })))
}

pub async fn ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let answer = state.ctx.query.ask(&request.question).await?;
    Ok(Json(answer))
}

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let ctx = &state.ctx;

    let mut received = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("file field has no filename"))?;
        let bytes = field.bytes().await.map_err(|e| ApiError {
            status: e.status(),
            message: e.body_text(),
        })?;
        received = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = received else {
        return Err(ApiError::bad_request("missing multipart field 'file'"));
    };

    match save_upload(&ctx.config.storage, &filename, &bytes).await? {
        UploadOutcome::AlreadyExists { filename } => Ok(Json(json!({
            "message": "File already exists, skipping upload",
            "filename": filename,
        }))
        .into_response()),
        UploadOutcome::Saved { filename, .. } => {
            if !ctx.config.server.ingest_on_upload {
                return Ok(Json(json!({
                    "message": "File uploaded",
                    "filename": filename,
                }))
                .into_response());
            }

            let outcome = ctx.ingest.run().await?;
            Ok(Json(json!({
                "message": "File uploaded and ingested",
                "filename": filename,
                "ingest": outcome,
            }))
            .into_response())
        }
    }
}

pub async fn ingest(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.ctx.ingest.run().await?;
    Ok(Json(outcome))
}

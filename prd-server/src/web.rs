//! HTTP surface: the form page, generation endpoint and artifact downloads.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use prd_agents::{ArtifactError, ArtifactStore, GenerationRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::server::SharedState;

/// Shortest accepted idea, in characters after trimming.
const MIN_IDEA_CHARS: usize = 10;
const ARCHIVE_NAME: &str = "prd_documents.zip";

/// Build the axum router.
pub fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/generate-prd", post(generate_prd))
        .route("/files", get(list_files))
        .route("/download-all", get(download_all))
        .route("/download/{filename}", get(download))
        .route("/copy/{filename}", get(copy))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Errors ─────────────────────────────────────────────────────────────

/// Error response rendered as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "File not found")
    }

    /// Missing or unsafe names are 404; anything else is a server error.
    fn from_artifact(e: ArtifactError, context: &str) -> Self {
        if e.is_not_found() {
            Self::not_found()
        } else {
            tracing::error!("{context}: {e}");
            Self::internal(format!("{context}: {e}"))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

// ── Pages ──────────────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(include_str!("static/index.html"))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    status_code: u16,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "PRD Agent System",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: local_timestamp(),
        status_code: 200,
    })
}

/// Current or last crew state.
async fn status(State(state): State<Arc<SharedState>>) -> Response {
    match &state.crew {
        Some(crew) => Json(crew.state().await).into_response(),
        None => Json(json!({ "state": "unavailable" })).into_response(),
    }
}

// ── Generation ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GenerateBody {
    #[serde(default)]
    idea_description: String,
    timestamp: Option<String>,
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    status: &'static str,
    message: &'static str,
    session_id: String,
    timestamp: String,
    result_summary: String,
    artifacts: Vec<String>,
    degraded_steps: Vec<String>,
}

fn local_timestamp() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

async fn generate_prd(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(body) =
        payload.map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e.body_text())))?;

    let idea = body.idea_description.trim();
    if idea.chars().count() < MIN_IDEA_CHARS {
        return Err(ApiError::bad_request(
            "Idea description is required (minimum 10 characters)",
        ));
    }

    let now = chrono::Local::now();
    let request = GenerationRequest {
        idea_description: idea.to_string(),
        timestamp: body.timestamp.unwrap_or_else(local_timestamp),
        session_id: body
            .session_id
            .unwrap_or_else(|| now.format("api_%Y%m%d_%H%M%S").to_string()),
    };

    let Some(crew) = &state.crew else {
        return Err(ApiError::internal("PRD Generator service not initialized"));
    };

    let preview: String = idea.chars().take(100).collect();
    tracing::info!(session = %request.session_id, idea = %preview, "Processing PRD request");

    let output = crew.run(&request).await.map_err(|e| {
        tracing::error!(session = %request.session_id, "PRD generation error: {e}");
        ApiError::internal(format!("PRD generation failed: {e}"))
    })?;

    Ok(Json(GenerateResponse {
        status: "completed",
        message: "PRD and development guide generated successfully",
        result_summary: output.summary(),
        session_id: request.session_id,
        timestamp: request.timestamp,
        artifacts: output.artifacts,
        degraded_steps: output.degraded_steps,
    }))
}

// ── Artifacts ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct FileEntry {
    filename: String,
    size: u64,
    modified: String,
    download_url: String,
    copy_url: String,
}

#[derive(Serialize)]
struct FileList {
    files: Vec<FileEntry>,
    total: usize,
}

async fn list_files(State(state): State<Arc<SharedState>>) -> Result<Json<FileList>, ApiError> {
    let files: Vec<FileEntry> = state
        .store
        .list()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to list files: {e}")))?
        .into_iter()
        .map(|f| FileEntry {
            download_url: format!("/download/{}", f.filename),
            copy_url: format!("/copy/{}", f.filename),
            modified: f.modified.to_rfc3339(),
            size: f.size,
            filename: f.filename,
        })
        .collect();
    Ok(Json(FileList {
        total: files.len(),
        files,
    }))
}

async fn download(
    State(state): State<Arc<SharedState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    ArtifactStore::validate_name(&filename).map_err(|_| ApiError::not_found())?;
    let bytes = state
        .store
        .read(&filename)
        .await
        .map_err(|e| ApiError::from_artifact(e, "Failed to download file"))?;
    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, bytes).into_response())
}

#[derive(Serialize)]
struct CopyResponse {
    filename: String,
    content: String,
    size: usize,
}

async fn copy(
    State(state): State<Arc<SharedState>>,
    Path(filename): Path<String>,
) -> Result<Json<CopyResponse>, ApiError> {
    ArtifactStore::validate_name(&filename).map_err(|_| ApiError::not_found())?;
    let content = state
        .store
        .read_to_string(&filename)
        .await
        .map_err(|e| ApiError::from_artifact(e, "Failed to copy file content"))?;
    Ok(Json(CopyResponse {
        // Characters, not bytes.
        size: content.chars().count(),
        filename,
        content,
    }))
}

async fn download_all(State(state): State<Arc<SharedState>>) -> Result<Response, ApiError> {
    let bytes = state
        .store
        .zip_all()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create ZIP file: {e}")))?;
    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={ARCHIVE_NAME}"),
        ),
    ];
    Ok((headers, bytes).into_response())
}

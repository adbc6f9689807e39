//! HTTP upload server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/documents` | Multipart upload (`file`, optional `title`, `user_id`) |
//! | `GET`  | `/documents/{id}` | Document metadata and chunks |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "encrypted", "message": "...", "document_id": "..." } }
//! ```
//!
//! Validation failures map to 400 (413 for `too_large`), extraction and
//! chunking failures to 422, storage failures to 500. `document_id` names
//! the row left in `failed` status when there is one.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use docingest_core::store::DocumentStore;

use crate::config::Config;
use crate::db;
use crate::error::{FailureCategory, IngestFailure};
use crate::get::{get_document, DocumentResponse};
use crate::ingest::{build_ingestor, IngestOutcome, Ingestor, UploadRequest};
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Headroom over `upload.max_bytes` so slightly oversized files still
/// reach the validator and get a recorded `too_large` failure.
const BODY_LIMIT_FACTOR: u64 = 2;

#[derive(Clone)]
struct AppState {
    ingestor: Ingestor,
}

/// Start the server on `[server].bind` and run until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(pool.clone()));
    let ingestor = build_ingestor(config, store)?;
    let app = router(ingestor, config.upload.max_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "docingest server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

/// Build the application router around an ingestor.
pub fn router(ingestor: Ingestor, max_upload_bytes: u64) -> Router {
    let body_limit = usize::try_from(max_upload_bytes.saturating_mul(BODY_LIMIT_FACTOR))
        .unwrap_or(usize::MAX);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/documents", post(handle_upload))
        .route("/documents/{id}", get(handle_get_document))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { ingestor })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested; draining in-flight requests");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_id: Option<String>,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    document_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                document_id: self.document_id,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<IngestFailure> for AppError {
    fn from(failure: IngestFailure) -> Self {
        let code = failure.error.code();
        let status = match failure.error.category() {
            FailureCategory::Client if code == "too_large" => StatusCode::PAYLOAD_TOO_LARGE,
            FailureCategory::Client => StatusCode::BAD_REQUEST,
            FailureCategory::Processing => StatusCode::UNPROCESSABLE_ENTITY,
            FailureCategory::System => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            code: code.to_string(),
            message: failure.error.to_string(),
            document_id: failure.document_id,
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
        document_id: None,
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
        document_id: None,
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
        document_id: None,
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    let status = err.status();
    AppError {
        status,
        code: if status == StatusCode::PAYLOAD_TOO_LARGE {
            "too_large".to_string()
        } else {
            "bad_request".to_string()
        },
        message: err.body_text(),
        document_id: None,
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /documents ============

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<IngestOutcome>), AppError> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut title: Option<String> = None;
    let mut user_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, mime, bytes.to_vec()));
            }
            "title" => title = Some(field.text().await.map_err(multipart_error)?),
            "user_id" => user_id = Some(field.text().await.map_err(multipart_error)?),
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let (filename, mime_type, bytes) =
        file.ok_or_else(|| bad_request("multipart field 'file' is required"))?;
    let request = UploadRequest {
        bytes,
        filename,
        mime_type,
        title,
        user_id: user_id.filter(|u| !u.trim().is_empty()),
    };

    // Runs to a terminal state even if the client disconnects.
    let ingestor = state.ingestor.clone();
    let handle = tokio::spawn(async move { ingestor.ingest(request).await });

    match handle.await {
        Ok(Ok(outcome)) => Ok((StatusCode::CREATED, Json(outcome))),
        Ok(Err(failure)) => Err(failure.into()),
        Err(e) => Err(internal(format!("ingestion task failed: {}", e))),
    }
}

// ============ GET /documents/{id} ============

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, AppError> {
    match get_document(state.ingestor.store().as_ref(), &id).await {
        Ok(Some(doc)) => Ok(Json(doc)),
        Ok(None) => Err(not_found(format!("document not found: {}", id))),
        Err(e) => Err(internal(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use docingest_core::error::{ChunkingError, StoreError, ValidationFailure};

    fn failure(error: IngestError) -> AppError {
        IngestFailure {
            document_id: Some("doc-1".to_string()),
            stage: None,
            error,
        }
        .into()
    }

    #[test]
    fn test_failure_status_mapping() {
        let e = failure(ValidationFailure::Encrypted.into());
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, "encrypted");
        assert_eq!(e.document_id.as_deref(), Some("doc-1"));

        let e = failure(ValidationFailure::TooLarge { size: 2, max: 1 }.into());
        assert_eq!(e.status, StatusCode::PAYLOAD_TOO_LARGE);

        let e = failure(ChunkingError::EmptyText.into());
        assert_eq!(e.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(e.code, "chunking_failed");

        let e = failure(StoreError::Backend("database is locked".into()).into());
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.code, "storage_failure");
    }
}

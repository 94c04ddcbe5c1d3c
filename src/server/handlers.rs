//! HTTP handlers for the upload service

use crate::upload::{UploadError, UploadService, WriteAuthorization};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

const UPLOAD_PAGE: &str = include_str!("ui.html");

/// Shared state handed to every request
pub struct AppState {
    pub uploads: UploadService,
    pub max_upload_bytes: usize,
    pub metrics_enabled: bool,
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// [`UploadError`] rendered as an HTTP response
#[derive(Debug)]
pub struct AppError(pub UploadError);

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        Self(e)
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            UploadError::MissingField(_) => (StatusCode::BAD_REQUEST, "missing_field"),
            UploadError::InvalidFilename(_) => (StatusCode::BAD_REQUEST, "invalid_filename"),
            UploadError::Malformed(_) => (StatusCode::BAD_REQUEST, "malformed_request"),
            UploadError::PayloadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large")
            }
            UploadError::Authorization(_) => (StatusCode::BAD_GATEWAY, "storage_unavailable"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, code, "Request failed");
        } else {
            warn!(error = %self.0, code, "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            code,
        });
        (status, body).into_response()
    }
}

/// `GET /`
pub async fn root() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "service": "KB Upload API" }))
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// `GET /ui`
pub async fn upload_page() -> Html<&'static str> {
    Html(UPLOAD_PAGE)
}

/// `GET /metrics`
#[cfg(feature = "metrics")]
pub async fn metrics_text() -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::gather_text(),
    )
}

/// Fields of the upload form
struct UploadForm {
    data: Vec<u8>,
    filename: String,
    content_type: Option<String>,
    category: String,
}

async fn read_form(mut multipart: Multipart, limit: usize) -> Result<UploadForm, UploadError> {
    let mut file: Option<(Vec<u8>, String, Option<String>)> = None;
    let mut category: Option<String> = None;

    let field_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::PayloadTooLarge { limit }
        } else {
            UploadError::Malformed(e.body_text())
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(field_error)? {
        let name = field.name().map(str::to_string).unwrap_or_default();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_string).unwrap_or_default();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(field_error)?;
                file = Some((data.to_vec(), filename, content_type));
            }
            "type" => {
                category = Some(field.text().await.map_err(field_error)?);
            }
            _ => {}
        }
    }

    let (data, filename, content_type) = file.ok_or(UploadError::MissingField("file"))?;
    let category = category.ok_or(UploadError::MissingField("type"))?;

    Ok(UploadForm {
        data,
        filename,
        content_type,
        category,
    })
}

/// `POST /api/get-upload-url`
pub async fn get_upload_url(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<WriteAuthorization>, AppError> {
    let multipart = multipart.map_err(|e| UploadError::Malformed(e.body_text()))?;
    let form = read_form(multipart, state.max_upload_bytes).await?;

    info!(
        filename = %form.filename,
        category = %form.category,
        size = form.data.len(),
        "Upload URL requested"
    );

    let auth = state
        .uploads
        .authorize(
            &form.filename,
            &form.category,
            &form.data,
            form.content_type.as_deref(),
        )
        .await?;
    Ok(Json(auth))
}

//! HTTP front end: `POST /generate` with a multipart PDF upload.
//!
//! Form fields:
//! - `file`: the PDF bytes
//! - `num_mcqs`: requested number of questions
//!
//! Responds with `{"mcqs": [...], "keywords": [...]}`. Missing or invalid
//! fields give 422, pipeline failures give 500, both with `{"error": "..."}`.

use crate::config::GenerationConfig;
use crate::error::McqGenError;
use crate::generate::generate_from_bytes;
use crate::mcq::McqItem;
use crate::pipeline::keywords::KeywordSet;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Default upload cap.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GenerationConfig>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            config: Arc::new(config),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Response body of `POST /generate`.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub mcqs: Vec<McqItem>,
    pub keywords: KeywordSet,
}

/// Handler errors and their status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidForm(String),

    #[error(transparent)]
    Generation(#[from] McqGenError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::InvalidForm(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Generation failed: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the router.
pub fn build_router(state: AppState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/generate", post(generate_handler))
        .layer(DefaultBodyLimit::max(limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn generate_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<GenerateResponse>, ApiError> {
    let mut file: Option<Vec<u8>> = None;
    let mut num_mcqs: Option<usize> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidForm(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidForm(format!("failed to read 'file': {e}")))?;
                file = Some(bytes.to_vec());
            }
            Some("num_mcqs") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidForm(format!("failed to read 'num_mcqs': {e}")))?;
                let n = text.trim().parse::<usize>().map_err(|_| {
                    ApiError::InvalidForm(format!("'num_mcqs' must be a non-negative integer, got '{}'", text.trim()))
                })?;
                num_mcqs = Some(n);
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ApiError::InvalidForm("missing form field 'file'".into()))?;
    let num_mcqs =
        num_mcqs.ok_or_else(|| ApiError::InvalidForm("missing form field 'num_mcqs'".into()))?;

    info!("POST /generate: {} bytes, {} MCQs", file.len(), num_mcqs);
    let output = generate_from_bytes(&file, num_mcqs, &state.config).await?;

    Ok(Json(GenerateResponse {
        mcqs: output.mcqs,
        keywords: output.keywords,
    }))
}

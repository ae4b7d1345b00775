//! Request handlers and the HTTP error contract

use crate::Error;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Instant;

use super::AppState;

/// Successful `/predict` body
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub ebird_code: String,
    pub confidence: f32,
    /// Seconds from request start to response
    pub processing_time: f64,
}

/// `/health` body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    /// Declared input shape, unknown dimensions as `null`
    pub model_input_shape: Option<Vec<Option<usize>>>,
    pub class_names: Vec<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
}

/// Error response rendered as `{"detail": "..."}`
#[derive(Debug)]
pub(crate) struct ApiError {
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

    fn payload_too_large(limit: usize) -> Self {
        const MIB: usize = 1024 * 1024;
        let maximum = if limit >= MIB && limit % MIB == 0 {
            format!("{}MB", limit / MIB)
        } else {
            format!("{} bytes", limit)
        };
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("File too large. Maximum size is {}.", maximum),
        )
    }

    fn multipart(err: MultipartError, limit: usize) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::payload_too_large(limit)
        } else {
            Self::new(StatusCode::BAD_REQUEST, err.body_text())
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::BadInput(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            Error::PayloadTooLarge { limit, .. } => Self::payload_too_large(limit),
            Error::ModelUnavailable => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Model not loaded. Please check server configuration.",
            ),
            other => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error processing audio file: {}", other),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.detail }));
        (self.status, body).into_response()
    }
}

/// Accepted extension an upload's filename ends with, compared case-insensitively
fn audio_extension(filename: &str) -> Result<&'static str, Error> {
    let lower = filename.to_lowercase();
    crate::ALLOWED_EXTENSIONS
        .iter()
        .copied()
        .find(|ext| lower.ends_with(&format!(".{}", ext)))
        .ok_or_else(|| Error::BadInput("Only audio files (.mp3, .wav, .m4a) are allowed".into()))
}

pub(crate) async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let start = Instant::now();
    let limit = state.max_upload_bytes;

    let mut multipart =
        multipart.map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;

    // First part carrying a filename is the upload
    let (filename, extension, data) = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::multipart(e, limit))?
            .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "No file uploaded"))?;

        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };

        let extension = audio_extension(&filename)?;
        if !state.pipeline.model_loaded() {
            return Err(Error::ModelUnavailable.into());
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::multipart(e, limit))?;
        break (filename, extension, data);
    };

    if data.len() > limit {
        log::warn!("Rejected {} ({} bytes)", filename, data.len());
        return Err(Error::PayloadTooLarge {
            size: data.len(),
            limit,
        }
        .into());
    }

    log::info!("Received {} ({} bytes)", filename, data.len());

    let result = state
        .pipeline
        .submit(&state.pool, data.to_vec(), extension.to_string())
        .await
        .map_err(|e| {
            log::error!("Error processing audio file {}: {}", filename, e);
            ApiError::from(e)
        })?;

    Ok(Json(PredictResponse {
        ebird_code: result.label,
        confidence: result.confidence,
        processing_time: start.elapsed().as_secs_f64(),
    }))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.pipeline.model_loaded(),
        model_input_shape: state.pipeline.model_input_shape().map(|s| s.to_vec()),
        class_names: state.pipeline.class_names().to_vec(),
        timestamp: chrono::Local::now().to_rfc3339(),
    })
}

pub(crate) async fn root() -> impl IntoResponse {
    Json(RootResponse {
        message: "Audio Classification API",
        version: crate::VERSION,
    })
}

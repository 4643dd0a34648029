use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("No file provided")]
    NoFileProvided,

    /// An extractor rejected the request body; keeps the status it chose (413, 415, 422, ...).
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Invalid image payload: {0}")]
    InvalidPayload(String),

    #[error("PDF could not be processed: {0}")]
    UnprocessablePdf(String),

    #[error("Rasterizer not available: {0}")]
    RasterizerUnavailable(String),

    #[error("Conversion timed out after {0:?}")]
    ConversionTimedOut(Duration),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::NoFileProvided => StatusCode::BAD_REQUEST,
            AppError::Rejected { status, .. } => *status,
            AppError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            AppError::UnprocessablePdf(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RasterizerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ConversionTimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ConversionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server-side details go to the log; the client gets a generic line.
        let message = match &self {
            AppError::IoError(e) => {
                tracing::error!("IO error while handling request: {}", e);
                "Failed to read or write a working file".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                "Internal error".to_string()
            }
            AppError::ConversionFailed(e) => {
                tracing::error!("Conversion failed: {}", e);
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Rejected {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl From<MultipartRejection> for AppError {
    fn from(e: MultipartRejection) -> Self {
        AppError::Rejected {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

/// Covers both a malformed body and one cut off by the body limit (413)
impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::Rejected {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

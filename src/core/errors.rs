// Error types for the background removal service
//
// Request-level failures map onto HTTP responses through `ApiError`; startup
// failures surface as `ConfigError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::utils::upload::{ALLOWED_EXTENSIONS, MAX_FILE_SIZE};

/// Upload validation failures. The display text is returned to the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No image provided")]
    MissingImage,

    #[error("No images provided")]
    MissingImages,

    #[error("No image selected")]
    EmptyFilename,

    #[error("File type not allowed. Supported types: {}", ALLOWED_EXTENSIONS.join(", "))]
    DisallowedType,

    #[error("File too large. Maximum size: {:.1}MB", MAX_FILE_SIZE as f64 / 1024.0 / 1024.0)]
    TooLarge { size: usize },

    #[error("No valid files provided")]
    NoValidFiles,
}

/// Opaque failure reported by an image processor.
///
/// The message is for logs only; clients get a generic response.
#[derive(Debug, Error)]
#[error("image processing failed: {0}")]
pub struct ProcessingFailure(pub String);

impl From<anyhow::Error> for ProcessingFailure {
    fn from(err: anyhow::Error) -> Self {
        Self(format!("{:#}", err))
    }
}

/// Scratch storage failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create upload directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write upload to {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Filename is empty after sanitization: {0:?}")]
    UnusableFilename(String),
}

/// Errors returned by HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to process image")]
    Processing(#[source] ProcessingFailure),

    #[error("Batch not found")]
    BatchNotFound(String),

    #[error("Invalid multipart data: {0}")]
    Multipart(String),

    #[error("Failed to store upload")]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::BatchNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Processing(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        ApiError::Multipart(err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let ApiError::Storage(err) = &self {
            error!("Upload storage failed: {}", err);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid server config: {0}")]
    InvalidServerConfig(String),

    #[error("Invalid model config: {0}")]
    InvalidModelConfig(String),

    #[error("Invalid upload directory: {0}")]
    InvalidUploadDir(String),

    #[error("Session pool size must be > 0, got {0}")]
    InvalidPoolSize(usize),
}

pub type ApiResult<T> = Result<T, ApiError>;
pub type ProcessingResult<T> = Result<T, ProcessingFailure>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_match_client_contract() {
        assert_eq!(
            ValidationError::DisallowedType.to_string(),
            "File type not allowed. Supported types: png, jpg, jpeg, webp"
        );
        assert_eq!(
            ValidationError::TooLarge { size: 1 }.to_string(),
            "File too large. Maximum size: 10.0MB"
        );
        assert_eq!(ValidationError::NoValidFiles.to_string(), "No valid files provided");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::from(ValidationError::MissingImage).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::BatchNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Processing(ProcessingFailure("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_processing_detail_is_not_in_display() {
        let err = ApiError::Processing(ProcessingFailure("onnx exploded".into()));
        assert_eq!(err.to_string(), "Failed to process image");
    }
}

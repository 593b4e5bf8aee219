//! Error types for DocForge services
//!
//! Provides a comprehensive error handling system with:
//! - The closed set of ingestion error codes persisted on job rows
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Stable error codes recorded on ingestion job rows.
///
/// This set is closed: every failure a job can end with maps to exactly one
/// of these, and the UI maps each to a localized sentence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ExtractionEmpty,
    ExtractionLowQuality,
    NeedsOcr,
    ParseFailed,
    ProviderRateLimited,
    Timeout,
    UnsupportedFormat,
    FileTooLarge,
    FileCorrupted,
    DocumentDeleted,
    Internal,
}

impl ErrorCode {
    /// The wire representation stored in the `error_code` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ExtractionEmpty => "extraction_empty",
            ErrorCode::ExtractionLowQuality => "extraction_low_quality",
            ErrorCode::NeedsOcr => "needs_ocr",
            ErrorCode::ParseFailed => "parse_failed",
            ErrorCode::ProviderRateLimited => "provider_rate_limited",
            ErrorCode::Timeout => "timeout",
            ErrorCode::UnsupportedFormat => "unsupported_format",
            ErrorCode::FileTooLarge => "file_too_large",
            ErrorCode::FileCorrupted => "file_corrupted",
            ErrorCode::DocumentDeleted => "document_deleted",
            ErrorCode::Internal => "internal",
        }
    }

    /// Parse a stored column value back into a code. Unknown strings map to
    /// `Internal` so old rows never fail to load.
    pub fn parse(s: &str) -> Self {
        match s {
            "extraction_empty" => ErrorCode::ExtractionEmpty,
            "extraction_low_quality" => ErrorCode::ExtractionLowQuality,
            "needs_ocr" => ErrorCode::NeedsOcr,
            "parse_failed" => ErrorCode::ParseFailed,
            "provider_rate_limited" => ErrorCode::ProviderRateLimited,
            "timeout" => ErrorCode::Timeout,
            "unsupported_format" => ErrorCode::UnsupportedFormat,
            "file_too_large" => ErrorCode::FileTooLarge,
            "file_corrupted" => ErrorCode::FileCorrupted,
            "document_deleted" => ErrorCode::DocumentDeleted,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether a job failing with this code may be retried.
    ///
    /// Rate limits and timeouts are transient; `parse_failed` and `internal`
    /// get the benefit of the doubt up to max attempts. Everything else is a
    /// property of the uploaded bytes and will not improve on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ProviderRateLimited
                | ErrorCode::Timeout
                | ErrorCode::ParseFailed
                | ErrorCode::Internal
        )
    }

    /// Terminal codes end the job on first occurrence regardless of the
    /// remaining attempt budget.
    pub fn is_terminal(&self) -> bool {
        !self.is_retryable()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    // Validation errors
    ValidationError,
    PayloadTooLarge,

    // Authentication / authorization errors
    Unauthorized,
    Forbidden,
    TenantMismatch,

    // Resource errors
    NotFound,
    DocumentNotFound,
    VersionNotFound,
    JobNotFound,

    // Conflict errors
    Conflict,

    // Database errors
    DatabaseError,
    ConnectionError,

    // External service errors
    StorageError,
    EmbeddingError,

    // Internal errors
    CryptoError,
    InternalError,
    ConfigurationError,
    SerializationError,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Tenant mismatch")]
    TenantMismatch,

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Document not found: {id}")]
    DocumentNotFound { id: String },

    #[error("Document version not found: {id}")]
    VersionNotFound { id: String },

    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    // Conflict errors
    #[error("Conflict: {message}")]
    Conflict { message: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error("Object store error: {message}")]
    Storage { message: String, retryable: bool },

    #[error("Embedding service error: {message}")]
    Embedding { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Decryption failed")]
    Crypto,

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the API error code for this error
    pub fn code(&self) -> ApiErrorCode {
        match self {
            AppError::Validation { .. } => ApiErrorCode::ValidationError,
            AppError::PayloadTooLarge { .. } => ApiErrorCode::PayloadTooLarge,
            AppError::Unauthorized { .. } => ApiErrorCode::Unauthorized,
            AppError::Forbidden { .. } => ApiErrorCode::Forbidden,
            AppError::TenantMismatch => ApiErrorCode::TenantMismatch,
            AppError::NotFound { .. } => ApiErrorCode::NotFound,
            AppError::DocumentNotFound { .. } => ApiErrorCode::DocumentNotFound,
            AppError::VersionNotFound { .. } => ApiErrorCode::VersionNotFound,
            AppError::JobNotFound { .. } => ApiErrorCode::JobNotFound,
            AppError::Conflict { .. } => ApiErrorCode::Conflict,
            AppError::Database(_) => ApiErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ApiErrorCode::ConnectionError,
            AppError::Storage { .. } => ApiErrorCode::StorageError,
            AppError::Embedding { .. } => ApiErrorCode::EmbeddingError,
            AppError::HttpClient(_) => ApiErrorCode::EmbeddingError,
            AppError::Crypto => ApiErrorCode::CryptoError,
            AppError::Internal { .. } => ApiErrorCode::InternalError,
            AppError::Configuration { .. } => ApiErrorCode::ConfigurationError,
            AppError::Serialization(_) => ApiErrorCode::SerializationError,
            AppError::Other(_) => ApiErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Forbidden { .. } | AppError::TenantMismatch => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::DocumentNotFound { .. }
            | AppError::VersionNotFound { .. }
            | AppError::JobNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict { .. } => StatusCode::CONFLICT,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 500 Internal Server Error; every other server-side failure
            // surfaces as 500 with its stable code
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Storage { .. }
            | AppError::Embedding { .. }
            | AppError::HttpClient(_)
            | AppError::Crypto
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for the API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Request correlation rides on the `x-request-id` response header; the
/// body carries only the stable code and message.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ApiErrorCode,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_round_trip() {
        let codes = [
            ErrorCode::ExtractionEmpty,
            ErrorCode::ExtractionLowQuality,
            ErrorCode::NeedsOcr,
            ErrorCode::ParseFailed,
            ErrorCode::ProviderRateLimited,
            ErrorCode::Timeout,
            ErrorCode::UnsupportedFormat,
            ErrorCode::FileTooLarge,
            ErrorCode::FileCorrupted,
            ErrorCode::DocumentDeleted,
            ErrorCode::Internal,
        ];
        for code in codes {
            assert_eq!(ErrorCode::parse(code.as_str()), code);
        }
        assert_eq!(ErrorCode::parse("something_new"), ErrorCode::Internal);
    }

    #[test]
    fn test_retryable_split() {
        assert!(ErrorCode::ProviderRateLimited.is_retryable());
        assert!(ErrorCode::Timeout.is_retryable());
        assert!(ErrorCode::Internal.is_retryable());
        assert!(ErrorCode::NeedsOcr.is_terminal());
        assert!(ErrorCode::UnsupportedFormat.is_terminal());
        assert!(ErrorCode::DocumentDeleted.is_terminal());
        assert!(ErrorCode::FileCorrupted.is_terminal());
    }

    #[test]
    fn test_http_status_mapping() {
        let err = AppError::DocumentNotFound { id: "test".into() };
        assert_eq!(err.code(), ApiErrorCode::DocumentNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = AppError::TenantMismatch;
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = AppError::Internal {
            message: "boom".into(),
        };
        assert!(err.is_server_error());

        // Upstream failures are 500s with a stable code, not gateway errors
        let err = AppError::Storage {
            message: "connection reset".into(),
            retryable: true,
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), ApiErrorCode::StorageError);

        let err = AppError::Embedding {
            message: "provider error 429".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

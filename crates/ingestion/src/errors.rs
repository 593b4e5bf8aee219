//! Ingestion service error types

use docforge_common::errors::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    /// Parser-layer failure; the raw message feeds the error classifier
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Extraction succeeded but the quality gates rejected it
    #[error("Quality gate failure ({code}): {message}")]
    QualityGate { code: ErrorCode, message: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Object store error: {0}")]
    StorageError(String),

    /// Storage reported the object missing; terminal
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Stage deadline exceeded after {0} seconds")]
    StageTimeout(u64),

    #[error("Document deleted")]
    DocumentDeleted,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IngestionError {
    /// Map this error to the stable code recorded on the job row.
    ///
    /// Parser and embedding failures go through the substring classifier;
    /// the structured variants map directly.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            IngestionError::ParseError(message) => crate::quality::classify_error(message),
            IngestionError::QualityGate { code, .. } => *code,
            IngestionError::UnsupportedFormat(_) => ErrorCode::UnsupportedFormat,
            IngestionError::FileTooLarge { .. } => ErrorCode::FileTooLarge,
            IngestionError::ObjectNotFound(_) => ErrorCode::FileCorrupted,
            IngestionError::StorageError(message) => crate::quality::classify_error(message),
            IngestionError::EmbeddingError(message) => crate::quality::classify_error(message),
            IngestionError::StageTimeout(_) => ErrorCode::Timeout,
            IngestionError::DocumentDeleted => ErrorCode::DocumentDeleted,
            IngestionError::DatabaseError(_) => ErrorCode::Internal,
            IngestionError::ConfigError(_) => ErrorCode::Internal,
            IngestionError::IoError(_) => ErrorCode::Internal,
        }
    }
}

impl From<docforge_common::errors::AppError> for IngestionError {
    fn from(e: docforge_common::errors::AppError) -> Self {
        use docforge_common::errors::AppError;
        match e {
            AppError::Embedding { message } => IngestionError::EmbeddingError(message),
            AppError::Storage { message, .. } => IngestionError::StorageError(message),
            other => IngestionError::DatabaseError(other.to_string()),
        }
    }
}

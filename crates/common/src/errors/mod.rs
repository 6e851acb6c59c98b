//! Error types for SAMAY crates
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - Error codes for machine-readable identification
//! - A split between upstream service failures and local failures
//!
//! "No relevant passages" and "query out of domain" are *outcomes*, not
//! errors; they never appear here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,

    // Resource errors (4xxx)
    NotFound,

    // Index integrity errors (7xxx)
    IndexMismatch,
    SnapshotChecksum,

    // External service errors (8xxx)
    UpstreamError,
    EmbeddingError,
    EmbeddingTimeout,
    GenerationError,
    GenerationTimeout,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,

    // Service unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1003,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,

            // Index integrity (7xxx)
            ErrorCode::IndexMismatch => 7001,
            ErrorCode::SnapshotChecksum => 7002,

            // External (8xxx)
            ErrorCode::UpstreamError => 8001,
            ErrorCode::EmbeddingError => 8002,
            ErrorCode::EmbeddingTimeout => 8003,
            ErrorCode::GenerationError => 8004,
            ErrorCode::GenerationTimeout => 8005,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,

            ErrorCode::ServiceUnavailable => 9999,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Index integrity errors
    #[error("Index mismatch: {message}")]
    IndexMismatch { message: String },

    #[error("Snapshot checksum mismatch: expected {expected}, computed {actual}")]
    SnapshotChecksum { expected: String, actual: String },

    // External service errors
    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Embedding timeout after {timeout_ms}ms")]
    EmbeddingTimeout { timeout_ms: u64 },

    #[error("Generation service error: {message}")]
    GenerationError { message: String },

    #[error("Generation timeout after {timeout_ms}ms")]
    GenerationTimeout { timeout_ms: u64 },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::IndexMismatch { .. } => ErrorCode::IndexMismatch,
            AppError::SnapshotChecksum { .. } => ErrorCode::SnapshotChecksum,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::EmbeddingTimeout { .. } => ErrorCode::EmbeddingTimeout,
            AppError::GenerationError { .. } => ErrorCode::GenerationError,
            AppError::GenerationTimeout { .. } => ErrorCode::GenerationTimeout,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// True when an embedding or generation backend failed or was unreachable.
    ///
    /// Callers use this to tell "the service is down" apart from
    /// "there is nothing relevant to say".
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingError { .. }
                | AppError::EmbeddingTimeout { .. }
                | AppError::GenerationError { .. }
                | AppError::GenerationTimeout { .. }
                | AppError::HttpClient(_)
                | AppError::ServiceUnavailable { .. }
        )
    }

    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::HttpClient(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AppError::EmbeddingTimeout { .. }
            | AppError::GenerationTimeout { .. }
            | AppError::ServiceUnavailable { .. } => true,
            _ => false,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string()
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::NotFound {
            resource_type: "corpus snapshot".into(),
            id: "data/corpus.json".into(),
        };
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.code().as_code(), 4001);

        let err = AppError::IndexMismatch { message: "3 records, 2 embeddings".into() };
        assert_eq!(err.code().as_code(), 7001);
    }

    #[test]
    fn test_service_failures() {
        let err = AppError::GenerationTimeout { timeout_ms: 20_000 };
        assert!(err.is_service_failure());
        assert!(err.is_retryable());

        let err = AppError::ServiceUnavailable { message: "embedding backend down".into() };
        assert!(err.is_service_failure());
    }

    #[test]
    fn test_local_errors_are_not_service_failures() {
        let err = AppError::Validation {
            message: "alpha must be within [0, 1]".into(),
            field: Some("alpha".into()),
        };
        assert!(!err.is_service_failure());
        assert!(!err.is_retryable());

        let err = AppError::IndexMismatch { message: "3 vectors, 2 documents".into() };
        assert_eq!(err.code(), ErrorCode::IndexMismatch);
        assert!(!err.is_service_failure());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: AppError = config::ConfigError::Message("bad alpha".into()).into();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
    }
}

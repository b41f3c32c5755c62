//! Error types for PaperHound services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling
//!
//! Provider "not found", transient provider failures and PDF validation
//! failures are not errors at this level: the resolver absorbs them and
//! reports a finalized resolution record instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
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
    InvalidCategory,
    UnknownProvider,

    // Resource errors (4xxx)
    PaperNotFound,
    TopicNotFound,
    PdfNotFound,
    SummaryNotFound,

    // State integrity errors (5xxx)
    PaperNotInTopic,
    PaperAlreadyClassified,

    // Storage errors (7xxx)
    StorageError,

    // External service errors (8xxx)
    UpstreamError,
    UpstreamUnavailable,
    AnalysisError,
    TextExtractionFailed,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidCategory => 1002,
            ErrorCode::UnknownProvider => 1003,

            ErrorCode::PaperNotFound => 4001,
            ErrorCode::TopicNotFound => 4002,
            ErrorCode::PdfNotFound => 4003,
            ErrorCode::SummaryNotFound => 4004,

            ErrorCode::PaperNotInTopic => 5001,
            ErrorCode::PaperAlreadyClassified => 5002,

            ErrorCode::StorageError => 7001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::UpstreamUnavailable => 8002,
            ErrorCode::AnalysisError => 8003,
            ErrorCode::TextExtractionFailed => 8004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
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
        field: Option<String>,
    },

    #[error("Invalid category: {category} (expected foundation, core or recent)")]
    InvalidCategory { category: String },

    #[error("Unknown PDF provider: {name}")]
    UnknownProvider { name: String },

    // Resource errors
    #[error("Paper not found: {id}")]
    PaperNotFound { id: String },

    #[error("Topic not found: {name}")]
    TopicNotFound { name: String },

    #[error("No PDF could be resolved for paper {paper_id}")]
    PdfNotFound { paper_id: String },

    #[error("Summary not found for paper {paper_id}")]
    SummaryNotFound { paper_id: String },

    // State integrity errors
    #[error("Paper {paper_id} is not part of topic {topic}")]
    PaperNotInTopic { topic: String, paper_id: String },

    #[error("Paper {paper_id} is already classified as {existing} in topic {topic}, refusing to file it as {requested}")]
    PaperAlreadyClassified {
        topic: String,
        paper_id: String,
        existing: String,
        requested: String,
    },

    // Storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    // External service errors
    #[error("Upstream service {service} unavailable: {message}")]
    UpstreamUnavailable { service: String, message: String },

    #[error("Text analysis failed: {message}")]
    Analysis { message: String },

    #[error("Text extraction failed for paper {paper_id}: {message}")]
    TextExtraction { paper_id: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
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
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidCategory { .. } => ErrorCode::InvalidCategory,
            AppError::UnknownProvider { .. } => ErrorCode::UnknownProvider,
            AppError::PaperNotFound { .. } => ErrorCode::PaperNotFound,
            AppError::TopicNotFound { .. } => ErrorCode::TopicNotFound,
            AppError::PdfNotFound { .. } => ErrorCode::PdfNotFound,
            AppError::SummaryNotFound { .. } => ErrorCode::SummaryNotFound,
            AppError::PaperNotInTopic { .. } => ErrorCode::PaperNotInTopic,
            AppError::PaperAlreadyClassified { .. } => ErrorCode::PaperAlreadyClassified,
            AppError::Storage { .. } => ErrorCode::StorageError,
            AppError::UpstreamUnavailable { .. } => ErrorCode::UpstreamUnavailable,
            AppError::Analysis { .. } => ErrorCode::AnalysisError,
            AppError::TextExtraction { .. } => ErrorCode::TextExtractionFailed,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::InvalidCategory { .. }
            | AppError::UnknownProvider { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::PaperNotFound { .. }
            | AppError::TopicNotFound { .. }
            | AppError::PdfNotFound { .. }
            | AppError::SummaryNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::PaperNotInTopic { .. } | AppError::PaperAlreadyClassified { .. } => {
                StatusCode::CONFLICT
            }

            // 500 Internal Server Error
            AppError::Storage { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 422 Unprocessable Entity
            AppError::TextExtraction { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 502 Bad Gateway
            AppError::Analysis { .. } | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Usage errors against knowledge state. These always surface to the caller.
    pub fn is_state_integrity(&self) -> bool {
        matches!(
            self,
            AppError::PaperNotInTopic { .. } | AppError::PaperAlreadyClassified { .. }
        )
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

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
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

        let details = match &self {
            AppError::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage {
            message: err.to_string(),
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

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: err.to_string(),
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::PaperNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::PaperNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_state_integrity_errors_are_conflicts() {
        let err = AppError::PaperNotInTopic {
            topic: "gnn".into(),
            paper_id: "abc".into(),
        };
        assert!(err.is_state_integrity());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.is_client_error());

        let err = AppError::TopicNotFound { name: "gnn".into() };
        assert!(!err.is_state_integrity());
    }

    #[test]
    fn test_upstream_unavailable_is_server_error() {
        let err = AppError::UpstreamUnavailable {
            service: "semantic_scholar".into(),
            message: "503".into(),
        };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_server_error());
        assert_eq!(err.code().as_code(), 8002);
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AppError = io.into();
        assert_eq!(err.code(), ErrorCode::StorageError);
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let codes = [
            ErrorCode::ValidationError,
            ErrorCode::InvalidCategory,
            ErrorCode::UnknownProvider,
            ErrorCode::PaperNotFound,
            ErrorCode::TopicNotFound,
            ErrorCode::PdfNotFound,
            ErrorCode::SummaryNotFound,
            ErrorCode::PaperNotInTopic,
            ErrorCode::PaperAlreadyClassified,
            ErrorCode::StorageError,
            ErrorCode::UpstreamError,
            ErrorCode::UpstreamUnavailable,
            ErrorCode::AnalysisError,
            ErrorCode::TextExtractionFailed,
            ErrorCode::InternalError,
            ErrorCode::ConfigurationError,
            ErrorCode::SerializationError,
        ];
        let numeric: std::collections::HashSet<u16> = codes.iter().map(ErrorCode::as_code).collect();
        assert_eq!(numeric.len(), codes.len());
        assert_eq!(ErrorCode::PaperNotFound.as_code(), 4001);
        assert_eq!(
            serde_json::to_value(ErrorCode::PaperNotFound).unwrap(),
            serde_json::json!("PAPER_NOT_FOUND")
        );
    }
}

//! Resolver error types

use paperhound_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParse { path: String, message: String },

    #[error("No text content extracted from {path}")]
    NoText { path: String },

    #[error("Download failed for {url}: {message}")]
    Download {
        url: String,
        message: String,
        transient: bool,
    },

    #[error("Download of {url} exceeded {limit} bytes")]
    TooLarge { url: String, limit: u64 },

    #[error("Blocking task failed: {0}")]
    Task(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolverError {
    /// Worth another attempt (rate limit, 5xx, dropped connection)
    pub fn is_transient(&self) -> bool {
        matches!(self, ResolverError::Download { transient: true, .. })
    }
}

impl From<ResolverError> for AppError {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::Io(io) => AppError::Storage {
                message: io.to_string(),
            },
            ResolverError::Config(message) => AppError::Configuration { message },
            ResolverError::Download { url, message, .. } => AppError::UpstreamUnavailable {
                service: url,
                message,
            },
            other => AppError::Internal {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperhound_common::errors::ErrorCode;

    #[test]
    fn test_io_is_storage() {
        let err: AppError = ResolverError::Io(std::io::Error::other("disk gone")).into();
        assert_eq!(err.code(), ErrorCode::StorageError);
    }

    #[test]
    fn test_transient_download() {
        let err = ResolverError::Download {
            url: "https://x".into(),
            message: "429".into(),
            transient: true,
        };
        assert!(err.is_transient());
        assert!(!ResolverError::NoText { path: "a".into() }.is_transient());
    }
}

//! PaperHound Common Library
//!
//! Shared code for the PaperHound crates including:
//! - Paper data model and the Semantic Scholar paper source
//! - Error types and handling
//! - Configuration management
//! - Provider pacing (rate limiting and bounded retry)
//! - Keyed async locks
//! - Text analysis collaborator and its result store
//! - Metrics and observability

pub mod analysis;
pub mod config;
pub mod errors;
pub mod locks;
pub mod metrics;
pub mod models;
pub mod pacing;
pub mod scholar;

// Re-export commonly used types
pub use analysis::{AnalysisPayload, AnalysisStore, TextAnalyzer};
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use locks::KeyedLocks;
pub use models::{CitationDirection, CitationEdge, Paper, SearchQuery};
pub use pacing::{RateLimiterRegistry, RetryPolicy};
pub use scholar::{PaperSource, SemanticScholarClient};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

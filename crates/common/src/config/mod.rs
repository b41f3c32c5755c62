//! Configuration management for PaperHound services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values
//!
//! Every section carries serde defaults, so an empty environment yields a
//! runnable configuration.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// On-disk layout for the knowledge document, PDF cache and summaries
    #[serde(default)]
    pub storage: StorageConfig,

    /// Semantic Scholar client configuration
    #[serde(default)]
    pub scholar: ScholarConfig,

    /// PDF provider pacing, timeouts and retry policy
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Downloaded PDF acceptance policy
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Citation network caps
    #[serde(default)]
    pub citation: CitationConfig,

    /// Maturity tier rules
    #[serde(default)]
    pub classification: ClassificationConfig,

    /// Knowledge state thresholds
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Text analysis collaborator
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Papers resolved in parallel by batch operations
    #[serde(default = "default_max_concurrent_resolutions")]
    pub max_concurrent_resolutions: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root data directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding validated PDFs, one file per paper id
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,

    /// JSON document holding every topic
    #[serde(default = "default_knowledge_file")]
    pub knowledge_file: PathBuf,

    /// Directory of per-paper analysis results
    #[serde(default = "default_summaries_dir")]
    pub summaries_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScholarConfig {
    /// Graph API base URL
    #[serde(default = "default_scholar_base_url")]
    pub base_url: String,

    /// API key (raises the rate limit from 100 to 5000 requests per 5 minutes)
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_scholar_timeout")]
    pub timeout_secs: u64,

    /// Pacing without an API key
    #[serde(default = "default_scholar_rps_anonymous")]
    pub requests_per_second: u32,

    /// Pacing with an API key
    #[serde(default = "default_scholar_rps_keyed")]
    pub requests_per_second_with_key: u32,

    /// Retry for 429 and 5xx responses
    #[serde(default = "default_scholar_retry")]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvidersConfig {
    /// User agent sent to every provider
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Contact address required by the Unpaywall terms of use
    #[serde(default = "default_unpaywall_email")]
    pub unpaywall_email: String,

    /// Lookup timeout in seconds for a single provider call
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Timeout in seconds for downloading the PDF body
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Upper bound on a downloaded PDF
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,

    /// Per-provider pacing, requests per minute
    #[serde(default)]
    pub rate_limits: ProviderRateLimits,

    /// Bounded retry for transient provider failures
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderRateLimits {
    #[serde(default = "default_arxiv_rpm")]
    pub arxiv_per_minute: u32,

    #[serde(default = "default_unpaywall_rpm")]
    pub unpaywall_per_minute: u32,

    #[serde(default = "default_google_scholar_rpm")]
    pub google_scholar_per_minute: u32,

    #[serde(default = "default_google_search_rpm")]
    pub google_search_per_minute: u32,

    #[serde(default = "default_download_rpm")]
    pub download_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts per provider per paper, first call included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationConfig {
    /// Files must be strictly larger than this (HTML error pages saved as .pdf)
    #[serde(default = "default_min_bytes")]
    pub min_bytes: u64,

    /// Minimum non-whitespace characters the text probe must recover
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CitationConfig {
    #[serde(default = "default_direction_cap")]
    pub max_references: usize,

    #[serde(default = "default_direction_cap")]
    pub max_citations: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassificationConfig {
    /// Papers at most this many years old are `recent`
    #[serde(default = "default_recent_window")]
    pub recent_window_years: i32,

    #[serde(default = "default_long_horizon_years")]
    pub long_horizon_years: i32,

    #[serde(default = "default_long_horizon_citations")]
    pub long_horizon_citations: u64,

    #[serde(default = "default_medium_horizon_years")]
    pub medium_horizon_years: i32,

    #[serde(default = "default_medium_horizon_citations")]
    pub medium_horizon_citations: u64,

    /// Pin the reference year (tests, reproducible batch runs). Defaults to the UTC year.
    pub current_year: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KnowledgeConfig {
    /// Read percentage promoting beginner to intermediate
    #[serde(default = "default_intermediate_threshold")]
    pub intermediate_threshold: f64,

    /// Read percentage promoting intermediate to experienced
    #[serde(default = "default_experienced_threshold")]
    pub experienced_threshold: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Analysis endpoint; analysis is disabled when unset
    pub endpoint: Option<String>,

    pub api_key: Option<String>,

    #[serde(default = "default_analysis_model")]
    pub model: String,

    /// Leading characters of extracted text forwarded to the analyzer
    #[serde(default = "default_analysis_max_chars")]
    pub max_chars: usize,

    /// Retries after the first failed call
    #[serde(default = "default_analysis_retries")]
    pub max_retries: u32,

    #[serde(default = "default_analysis_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 300 }
fn default_max_concurrent_resolutions() -> usize { 4 }
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_pdf_dir() -> PathBuf { PathBuf::from("data/papers_pdf") }
fn default_knowledge_file() -> PathBuf { PathBuf::from("data/research_knowledge.json") }
fn default_summaries_dir() -> PathBuf { PathBuf::from("data/paper_summaries") }
fn default_scholar_base_url() -> String { "https://api.semanticscholar.org/graph/v1".to_string() }
fn default_scholar_timeout() -> u64 { 30 }
fn default_scholar_rps_anonymous() -> u32 { 1 }
fn default_scholar_rps_keyed() -> u32 { 10 }
fn default_scholar_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_backoff_ms: 10_000,
        max_backoff_ms: 30_000,
    }
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
fn default_unpaywall_email() -> String { "research@example.com".to_string() }
fn default_provider_timeout() -> u64 { 15 }
fn default_download_timeout() -> u64 { 60 }
fn default_max_download_bytes() -> u64 { 100 * 1024 * 1024 }
fn default_arxiv_rpm() -> u32 { 20 }
fn default_unpaywall_rpm() -> u32 { 60 }
fn default_google_scholar_rpm() -> u32 { 6 }
fn default_google_search_rpm() -> u32 { 10 }
fn default_download_rpm() -> u32 { 60 }
fn default_max_attempts() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 2_000 }
fn default_max_backoff_ms() -> u64 { 30_000 }
fn default_min_bytes() -> u64 { 1024 }
fn default_min_text_chars() -> usize { 100 }
fn default_direction_cap() -> usize { 20 }
fn default_recent_window() -> i32 { 2 }
fn default_long_horizon_years() -> i32 { 10 }
fn default_long_horizon_citations() -> u64 { 500 }
fn default_medium_horizon_years() -> i32 { 5 }
fn default_medium_horizon_citations() -> u64 { 100 }
fn default_intermediate_threshold() -> f64 { 80.0 }
fn default_experienced_threshold() -> f64 { 95.0 }
fn default_analysis_model() -> String { "claude-sonnet-4-20250514".to_string() }
fn default_analysis_max_chars() -> usize { 20_000 }
fn default_analysis_retries() -> u32 { 1 }
fn default_analysis_timeout() -> u64 { 120 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 0 }
fn default_service_name() -> String { "paperhound".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SCHOLAR__API_KEY=...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded: AppConfig = config.try_deserialize()?;
        loaded.apply_legacy_env();
        Ok(loaded)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded: AppConfig = config.try_deserialize()?;
        loaded.apply_legacy_env();
        Ok(loaded)
    }

    /// Honour the bare `SEMANTIC_SCHOLAR_API_KEY` variable most deployments already export.
    fn apply_legacy_env(&mut self) {
        if self.scholar.api_key.is_none() {
            self.scholar.api_key = std::env::var("SEMANTIC_SCHOLAR_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl ScholarConfig {
    /// Requests per second to allow, depending on whether a key is configured
    pub fn effective_rate(&self) -> u32 {
        if self.api_key.is_some() {
            self.requests_per_second_with_key
        } else {
            self.requests_per_second
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_resolutions: default_max_concurrent_resolutions(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            pdf_dir: default_pdf_dir(),
            knowledge_file: default_knowledge_file(),
            summaries_dir: default_summaries_dir(),
        }
    }
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            base_url: default_scholar_base_url(),
            api_key: None,
            timeout_secs: default_scholar_timeout(),
            requests_per_second: default_scholar_rps_anonymous(),
            requests_per_second_with_key: default_scholar_rps_keyed(),
            retry: default_scholar_retry(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            unpaywall_email: default_unpaywall_email(),
            timeout_secs: default_provider_timeout(),
            download_timeout_secs: default_download_timeout(),
            max_download_bytes: default_max_download_bytes(),
            rate_limits: ProviderRateLimits::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for ProviderRateLimits {
    fn default() -> Self {
        Self {
            arxiv_per_minute: default_arxiv_rpm(),
            unpaywall_per_minute: default_unpaywall_rpm(),
            google_scholar_per_minute: default_google_scholar_rpm(),
            google_search_per_minute: default_google_search_rpm(),
            download_per_minute: default_download_rpm(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_bytes: default_min_bytes(),
            min_text_chars: default_min_text_chars(),
        }
    }
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            max_references: default_direction_cap(),
            max_citations: default_direction_cap(),
        }
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            recent_window_years: default_recent_window(),
            long_horizon_years: default_long_horizon_years(),
            long_horizon_citations: default_long_horizon_citations(),
            medium_horizon_years: default_medium_horizon_years(),
            medium_horizon_citations: default_medium_horizon_citations(),
            current_year: None,
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            intermediate_threshold: default_intermediate_threshold(),
            experienced_threshold: default_experienced_threshold(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: default_analysis_model(),
            max_chars: default_analysis_max_chars(),
            max_retries: default_analysis_retries(),
            timeout_secs: default_analysis_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.citation.max_references, 20);
        assert_eq!(config.citation.max_citations, 20);
        assert_eq!(config.validation.min_bytes, 1024);
        assert_eq!(config.analysis.max_chars, 20_000);
        assert_eq!(config.providers.retry.max_attempts, 3);
    }

    #[test]
    fn test_scholar_rate_depends_on_key() {
        let mut scholar = ScholarConfig::default();
        assert_eq!(scholar.effective_rate(), 1);
        scholar.api_key = Some("key".into());
        assert_eq!(scholar.effective_rate(), 10);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[citation]\nmax_references = 7\n\n[knowledge]\nexperienced_threshold = 90.0").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AppConfig::from_file(&path).unwrap();

        assert_eq!(config.citation.max_references, 7);
        assert_eq!(config.citation.max_citations, 20);
        assert_eq!(config.knowledge.experienced_threshold, 90.0);
        assert_eq!(config.knowledge.intermediate_threshold, 80.0);
        assert_eq!(config.classification.recent_window_years, 2);
    }

    #[test]
    fn test_scholar_retry_section() {
        let scholar = ScholarConfig::default();
        assert_eq!(scholar.retry.max_attempts, 3);
        assert_eq!(scholar.retry.initial_backoff_ms, 10_000);

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[scholar.retry]\nmax_attempts = 5\ninitial_backoff_ms = 250").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AppConfig::from_file(&path).unwrap();

        assert_eq!(config.scholar.retry.max_attempts, 5);
        assert_eq!(config.scholar.retry.initial_backoff_ms, 250);
        assert_eq!(config.scholar.retry.max_backoff_ms, 30_000);
        assert_eq!(config.providers.retry.max_attempts, 3);
    }
}

//! Text analysis collaborator
//!
//! The analysis itself is an opaque external call. This module bounds what
//! is sent (the leading `max_chars` characters of extracted text), retries a
//! failed call a fixed number of times, and defines the result shape.

mod store;

pub use store::{AnalysisStore, SummaryRecord};

use crate::config::AnalysisConfig;
use crate::errors::{AppError, Result};
use crate::models::Paper;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Structured result returned by the analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub summary: String,
    #[serde(default)]
    pub contributions: Vec<String>,
    #[serde(default)]
    pub limitations: Vec<String>,
    #[serde(default)]
    pub methodology: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
}

/// Trait for text analysis backends
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    /// Analyze already-bounded text for one paper
    async fn analyze(&self, paper: &Paper, text: &str) -> Result<AnalysisPayload>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// Leading `max_chars` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Bound the text and call the analyzer, retrying `max_retries` times on failure.
pub async fn analyze_bounded(
    analyzer: &dyn TextAnalyzer,
    paper: &Paper,
    text: &str,
    max_chars: usize,
    max_retries: u32,
) -> Result<AnalysisPayload> {
    let bounded = truncate_chars(text, max_chars);
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match analyzer.analyze(paper, bounded).await {
            Ok(payload) => {
                crate::metrics::record_analysis(true);
                return Ok(payload);
            }
            Err(e) => {
                crate::metrics::record_analysis(false);
                tracing::warn!(
                    paper_id = %paper.id,
                    analyzer = analyzer.name(),
                    attempt = attempt + 1,
                    error = %e,
                    "Analysis failed"
                );
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AppError::Analysis {
        message: "Unknown error after retries".to_string(),
    }))
}

/// HTTP analysis backend.
///
/// POSTs `{model, paper, text}` as JSON and expects an [`AnalysisPayload`] back.
pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct AnalysisRequest<'a> {
    model: &'a str,
    paper: &'a Paper,
    text: &'a str,
}

impl HttpAnalyzer {
    pub fn new(endpoint: String, api_key: Option<String>, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to build analysis client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl TextAnalyzer for HttpAnalyzer {
    async fn analyze(&self, paper: &Paper, text: &str) -> Result<AnalysisPayload> {
        let request = AnalysisRequest {
            model: &self.model,
            paper,
            text,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| AppError::Analysis {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Analysis {
                message: format!("API error {}: {}", status, body),
            });
        }

        response.json().await.map_err(|e| AppError::Analysis {
            message: format!("Failed to parse response: {}", e),
        })
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Mock analyzer for testing
pub struct MockAnalyzer {
    failures_before_success: std::sync::atomic::AtomicU32,
    calls: std::sync::atomic::AtomicU32,
    last_text_len: std::sync::atomic::AtomicUsize,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::failing(0)
    }

    /// Fails the first `failures` calls
    pub fn failing(failures: u32) -> Self {
        Self {
            failures_before_success: std::sync::atomic::AtomicU32::new(failures),
            calls: std::sync::atomic::AtomicU32::new(0),
            last_text_len: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Character count of the text received by the last call
    pub fn last_text_len(&self) -> usize {
        self.last_text_len.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextAnalyzer for MockAnalyzer {
    async fn analyze(&self, paper: &Paper, text: &str) -> Result<AnalysisPayload> {
        use std::sync::atomic::Ordering;

        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_text_len.store(text.chars().count(), Ordering::SeqCst);

        let remaining = self.failures_before_success.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_before_success.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::Analysis {
                message: "mock failure".to_string(),
            });
        }

        Ok(AnalysisPayload {
            summary: format!("Summary of {}", paper.title),
            contributions: vec!["mock contribution".to_string()],
            limitations: Vec::new(),
            methodology: "mock".to_string(),
            key_findings: Vec::new(),
        })
    }

    fn name(&self) -> &str {
        "mock-analyzer"
    }
}

/// Create an analyzer from configuration. `None` when no endpoint is configured.
pub fn create_analyzer(config: &AnalysisConfig) -> Result<Option<Arc<dyn TextAnalyzer>>> {
    let Some(endpoint) = config.endpoint.clone() else {
        tracing::warn!("No analysis endpoint configured, analysis is disabled");
        return Ok(None);
    };

    if endpoint == "mock" {
        return Ok(Some(Arc::new(MockAnalyzer::new())));
    }

    let analyzer = HttpAnalyzer::new(
        endpoint,
        config.api_key.clone(),
        config.model.clone(),
        Duration::from_secs(config.timeout_secs),
    )?;
    Ok(Some(Arc::new(analyzer)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[tokio::test]
    async fn test_text_is_bounded() {
        let analyzer = MockAnalyzer::new();
        let text = "x".repeat(25_000);
        let paper = Paper::new("p1", "Long paper");

        let payload = analyze_bounded(&analyzer, &paper, &text, 20_000, 1).await.unwrap();
        assert_eq!(payload.summary, "Summary of Long paper");
        assert_eq!(analyzer.last_text_len(), 20_000);
    }

    #[tokio::test]
    async fn test_retries_once() {
        let paper = Paper::new("p1", "Flaky");

        let analyzer = MockAnalyzer::failing(1);
        tokio_test::assert_ok!(analyze_bounded(&analyzer, &paper, "text", 100, 1).await);
        assert_eq!(analyzer.calls(), 2);

        let analyzer = MockAnalyzer::failing(5);
        let err = analyze_bounded(&analyzer, &paper, "text", 100, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Analysis { .. }));
        assert_eq!(analyzer.calls(), 2);
    }

    #[test]
    fn test_disabled_without_endpoint() {
        let analyzer = create_analyzer(&AnalysisConfig::default()).unwrap();
        assert!(analyzer.is_none());
    }
}

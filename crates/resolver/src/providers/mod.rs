//! PDF provider adapters
//!
//! Each adapter performs one lookup for one paper and reports a tagged
//! outcome. Adapters never fail for "not found". Pacing, timeouts and
//! retries are applied by the orchestrator around every `attempt`.

mod arxiv;
mod google_scholar;
mod google_search;
mod semantic_scholar;
mod unpaywall;

pub use arxiv::ArxivProvider;
pub use google_scholar::GoogleScholarProvider;
pub use google_search::GoogleSearchProvider;
pub use semantic_scholar::SemanticScholarPdfProvider;
pub use unpaywall::UnpaywallProvider;

use crate::errors::ResolverError;
use async_trait::async_trait;
use paperhound_common::config::ProvidersConfig;
use paperhound_common::errors::AppError;
use paperhound_common::Paper;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

/// The five providers, in waterfall priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    SemanticScholar,
    Arxiv,
    Unpaywall,
    GoogleScholar,
    GoogleSearch,
}

impl ProviderName {
    pub const ORDER: [ProviderName; 5] = [
        ProviderName::SemanticScholar,
        ProviderName::Arxiv,
        ProviderName::Unpaywall,
        ProviderName::GoogleScholar,
        ProviderName::GoogleSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::SemanticScholar => "semantic_scholar",
            ProviderName::Arxiv => "arxiv",
            ProviderName::Unpaywall => "unpaywall",
            ProviderName::GoogleScholar => "google_scholar",
            ProviderName::GoogleSearch => "google_search",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = AppError;

    /// Accepts snake_case and kebab-case names (`try/google-scholar`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "semantic_scholar" => Ok(ProviderName::SemanticScholar),
            "arxiv" => Ok(ProviderName::Arxiv),
            "unpaywall" => Ok(ProviderName::Unpaywall),
            "google_scholar" => Ok(ProviderName::GoogleScholar),
            "google_search" | "google" => Ok(ProviderName::GoogleSearch),
            _ => Err(AppError::UnknownProvider { name: s.to_string() }),
        }
    }
}

/// Result of one provider lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    /// A candidate PDF location
    Found(String),
    NotFound,
    /// Rate limit, timeout or transport failure; worth retrying
    TransientError(String),
}

impl ProviderOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderOutcome::Found(_) => "found",
            ProviderOutcome::NotFound => "not_found",
            ProviderOutcome::TransientError(_) => "transient_error",
        }
    }
}

#[async_trait]
pub trait PdfProvider: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Whether the paper carries what this provider needs (a DOI, an arXiv id).
    /// Inapplicable providers are recorded as attempted and skipped unpaced.
    fn applicable(&self, _paper: &Paper) -> bool {
        true
    }

    async fn attempt(&self, paper: &Paper) -> ProviderOutcome;
}

/// Map an HTTP status from a lookup to an outcome, for statuses that are not success.
pub(crate) fn status_outcome(provider: ProviderName, status: reqwest::StatusCode) -> ProviderOutcome {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ProviderOutcome::TransientError(format!("{} returned {}", provider, status))
    } else {
        tracing::debug!(provider = %provider, status = status.as_u16(), "Lookup rejected");
        ProviderOutcome::NotFound
    }
}

pub(crate) fn transport_outcome(provider: ProviderName, error: reqwest::Error) -> ProviderOutcome {
    ProviderOutcome::TransientError(format!("{} request failed: {}", provider, error))
}

/// Anchor found in an HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Anchor {
    pub href: String,
    pub text: String,
}

fn anchor_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").ok()).as_ref()
}

fn href_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?is)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).ok())
        .as_ref()
}

fn tag_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").ok()).as_ref()
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// Every `<a href>` in document order, with its visible text. Unparseable markup yields nothing.
pub(crate) fn anchors(html: &str) -> Vec<Anchor> {
    let (Some(anchor_re), Some(href_re), Some(tag_re)) = (anchor_regex(), href_regex(), tag_regex()) else {
        return Vec::new();
    };

    anchor_re
        .captures_iter(html)
        .filter_map(|caps| {
            let attrs = caps.get(1)?.as_str();
            let inner = caps.get(2).map_or("", |m| m.as_str());
            let href_caps = href_re.captures(attrs)?;
            let href = href_caps.get(1).or_else(|| href_caps.get(2))?.as_str();
            Some(Anchor {
                href: decode_entities(href.trim()),
                text: decode_entities(&tag_re.replace_all(inner, "")),
            })
        })
        .collect()
}

/// Shared HTTP client for the lookup providers
pub(crate) fn lookup_client(config: &ProvidersConfig) -> Result<reqwest::Client, ResolverError> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| ResolverError::Config(format!("Failed to build provider client: {}", e)))
}

/// All five providers wired to the live services, in waterfall order.
pub fn default_providers(config: &ProvidersConfig) -> Result<Vec<Arc<dyn PdfProvider>>, ResolverError> {
    let client = lookup_client(config)?;
    Ok(vec![
        Arc::new(SemanticScholarPdfProvider),
        Arc::new(ArxivProvider::new(client.clone())),
        Arc::new(UnpaywallProvider::new(client.clone(), config.unpaywall_email.clone())),
        Arc::new(GoogleScholarProvider::new(client.clone())),
        Arc::new(GoogleSearchProvider::new(client)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_and_names() {
        let names: Vec<&str> = ProviderName::ORDER.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            names,
            vec!["semantic_scholar", "arxiv", "unpaywall", "google_scholar", "google_search"]
        );
        assert_eq!(
            serde_json::to_value(ProviderName::GoogleScholar).unwrap(),
            serde_json::json!("google_scholar")
        );
    }

    #[test]
    fn test_parse_route_names() {
        assert_eq!("google-scholar".parse::<ProviderName>().unwrap(), ProviderName::GoogleScholar);
        assert_eq!("ArXiv".parse::<ProviderName>().unwrap(), ProviderName::Arxiv);
        assert!(matches!(
            "sci-hub".parse::<ProviderName>(),
            Err(AppError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn test_anchor_extraction() {
        let html = r#"<div><a class="x" href="https://a.org/p.pdf?x=1&amp;y=2"><span>[PDF]</span> a.org</a>
            <a href='/relative'>Other</a><a name="nohref">skip</a></div>"#;
        let found = anchors(html);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].href, "https://a.org/p.pdf?x=1&y=2");
        assert_eq!(found[0].text, "[PDF] a.org");
        assert_eq!(found[1].href, "/relative");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_outcome(ProviderName::Arxiv, reqwest::StatusCode::TOO_MANY_REQUESTS),
            ProviderOutcome::TransientError(_)
        ));
        assert_eq!(
            status_outcome(ProviderName::Arxiv, reqwest::StatusCode::NOT_FOUND),
            ProviderOutcome::NotFound
        );
    }
}

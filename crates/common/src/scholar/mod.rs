//! Semantic Scholar paper source
//!
//! Wraps the Graph API: keyword search, paper detail and one-hop
//! reference/citation lookups. "No results" is an empty list or `None`;
//! only an unreachable or failing service is an error.

use crate::config::ScholarConfig;
use crate::errors::{AppError, Result};
use crate::models::{CitationDirection, Paper, SearchQuery};
use crate::pacing::{per_second_limiter, ProviderLimiter, RetryPolicy};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

const SERVICE: &str = "semantic_scholar";

/// Fields requested for every paper object
const PAPER_FIELDS: &str =
    "paperId,title,authors,year,venue,citationCount,url,abstract,externalIds,openAccessPdf";

/// Graph API page size limit for search
const MAX_SEARCH_LIMIT: usize = 100;
/// The references and citations endpoints reject larger pages with a 400
pub const MAX_CITATION_LIMIT: usize = 1000;

/// Source of paper metadata and citation links
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Keyword search, sorted by citation count (highest first), at most `query.limit` papers.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Paper>>;

    /// Paper detail. `Ok(None)` when the id is unknown.
    async fn get_paper(&self, id: &str) -> Result<Option<Paper>>;

    /// Up to `max_count` papers on one side of `id`'s citation graph, in source order.
    async fn get_citations(
        &self,
        id: &str,
        direction: CitationDirection,
        max_count: usize,
    ) -> Result<Vec<Paper>>;
}

/// Semantic Scholar Graph API client
pub struct SemanticScholarClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    limiter: Arc<ProviderLimiter>,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPaper {
    paper_id: Option<String>,
    title: Option<String>,
    authors: Option<Vec<RawAuthor>>,
    year: Option<i32>,
    venue: Option<String>,
    citation_count: Option<u64>,
    url: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    external_ids: Option<HashMap<String, serde_json::Value>>,
    open_access_pdf: Option<RawOpenAccess>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOpenAccess {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<RawPaper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkedPaper {
    cited_paper: Option<RawPaper>,
    citing_paper: Option<RawPaper>,
}

#[derive(Debug, Deserialize)]
struct LinksResponse {
    #[serde(default)]
    data: Vec<LinkedPaper>,
}

impl RawPaper {
    /// Convert to the shared paper shape. Entries without an id are dropped.
    fn into_paper(self) -> Option<Paper> {
        let id = self.paper_id.filter(|id| !id.is_empty())?;

        let authors = self
            .authors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|author| author.name)
            .filter(|name| !name.is_empty())
            .collect();

        let external_id = |key: &str| -> Option<String> {
            self.external_ids
                .as_ref()
                .and_then(|ids| ids.get(key))
                .and_then(|value| match value {
                    serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                    _ => None,
                })
        };
        let doi = external_id("DOI");
        let arxiv_id = external_id("ArXiv");

        Some(Paper {
            id,
            title: self.title.unwrap_or_default(),
            authors,
            year: self.year,
            venue: self.venue.unwrap_or_default(),
            citations: self.citation_count.unwrap_or(0),
            url: self.url.unwrap_or_default(),
            abstract_text: self.abstract_text,
            doi,
            arxiv_id,
            pdf_url: self.open_access_pdf.and_then(|oa| oa.url).filter(|u| !u.is_empty()),
        })
    }
}

/// Apply the year range, order by citations (highest first) and cap at the limit.
pub fn rank_search_results(mut papers: Vec<Paper>, query: &SearchQuery) -> Vec<Paper> {
    papers.retain(|paper| query.accepts_year(paper.year));
    papers.sort_by(|a, b| b.citations.cmp(&a.citations));
    papers.truncate(query.limit);
    papers
}

fn year_param(query: &SearchQuery) -> Option<String> {
    match (query.year_from, query.year_to) {
        (None, None) => None,
        (Some(from), None) => Some(format!("{}-", from)),
        (None, Some(to)) => Some(format!("-{}", to)),
        (Some(from), Some(to)) => Some(format!("{}-{}", from, to)),
    }
}

fn citation_limit(max_count: usize) -> usize {
    max_count.min(MAX_CITATION_LIMIT)
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

impl SemanticScholarClient {
    pub fn new(config: &ScholarConfig, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to build Semantic Scholar client: {}", e),
            })?;

        if config.api_key.is_some() {
            tracing::info!(rps = config.effective_rate(), "Semantic Scholar client initialized with API key");
        } else {
            tracing::info!(rps = config.effective_rate(), "Semantic Scholar client initialized without API key");
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            limiter: per_second_limiter(config.effective_rate()),
            retry: RetryPolicy::from_config(&config.retry),
        })
    }

    /// Override the retry policy (tests use immediate retries)
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// GET a JSON document. `Ok(None)` on 404.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);

        let outcome = self
            .retry
            .run(SERVICE, |_| {
                let url = url.clone();
                async move {
                    self.limiter.until_ready().await;

                    let mut request = self
                        .client
                        .get(&url)
                        .query(params)
                        .header(reqwest::header::ACCEPT, "application/json");
                    if let Some(key) = &self.api_key {
                        request = request.header("x-api-key", key);
                    }

                    let response = request
                        .send()
                        .await
                        .map_err(|e| backoff::Error::transient(format!("request failed: {}", e)))?;

                    let status = response.status();
                    if status == StatusCode::NOT_FOUND {
                        return Ok(None);
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        return Err(backoff::Error::Transient {
                            err: "rate limited (429)".to_string(),
                            retry_after: retry_after(&response),
                        });
                    }
                    if status.is_server_error() {
                        return Err(backoff::Error::transient(format!("server error {}", status)));
                    }
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(backoff::Error::permanent(format!("API error {}: {}", status, body)));
                    }

                    response
                        .json::<T>()
                        .await
                        .map(Some)
                        .map_err(|e| backoff::Error::permanent(format!("malformed response: {}", e)))
                }
            })
            .await;

        outcome.map_err(|message| {
            crate::metrics::record_upstream_error(SERVICE);
            AppError::UpstreamUnavailable {
                service: SERVICE.to_string(),
                message,
            }
        })
    }
}

#[async_trait]
impl PaperSource for SemanticScholarClient {
    #[tracing::instrument(skip(self), fields(keyword = %query.keyword))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Paper>> {
        let start = std::time::Instant::now();

        let mut params = vec![
            ("query", query.keyword.clone()),
            ("limit", query.limit.min(MAX_SEARCH_LIMIT).to_string()),
            ("fields", PAPER_FIELDS.to_string()),
        ];
        if let Some(years) = year_param(query) {
            params.push(("year", years));
        }

        let response: Option<SearchResponse> = self.get_json("/paper/search", &params).await?;
        let papers = response
            .map(|r| r.data)
            .unwrap_or_default()
            .into_iter()
            .filter_map(RawPaper::into_paper)
            .collect();

        let papers = rank_search_results(papers, query);
        crate::metrics::record_search(start.elapsed().as_secs_f64(), papers.len());
        if papers.is_empty() {
            tracing::warn!("Search returned no papers");
        } else {
            tracing::info!(count = papers.len(), "Search completed");
        }
        Ok(papers)
    }

    async fn get_paper(&self, id: &str) -> Result<Option<Paper>> {
        let params = [("fields", PAPER_FIELDS.to_string())];
        let raw: Option<RawPaper> = self.get_json(&format!("/paper/{}", id), &params).await?;
        Ok(raw.and_then(RawPaper::into_paper))
    }

    #[tracing::instrument(skip(self), fields(direction = direction.as_str()))]
    async fn get_citations(
        &self,
        id: &str,
        direction: CitationDirection,
        max_count: usize,
    ) -> Result<Vec<Paper>> {
        if max_count == 0 {
            return Ok(Vec::new());
        }

        let endpoint = match direction {
            CitationDirection::Reference => "references",
            CitationDirection::Citation => "citations",
        };
        let params = [
            ("fields", PAPER_FIELDS.to_string()),
            ("limit", citation_limit(max_count).to_string()),
        ];

        let response: Option<LinksResponse> =
            self.get_json(&format!("/paper/{}/{}", id, endpoint), &params).await?;

        let papers: Vec<Paper> = response
            .map(|r| r.data)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|link| match direction {
                CitationDirection::Reference => link.cited_paper,
                CitationDirection::Citation => link.citing_paper,
            })
            .filter_map(RawPaper::into_paper)
            .take(max_count)
            .collect();

        tracing::debug!(paper_id = id, count = papers.len(), "Fetched linked papers");
        Ok(papers)
    }
}

/// In-memory paper source for testing
#[derive(Default)]
pub struct MockPaperSource {
    papers: RwLock<HashMap<String, Paper>>,
    references: RwLock<HashMap<String, Vec<Paper>>>,
    citations: RwLock<HashMap<String, Vec<Paper>>>,
    unavailable: std::sync::atomic::AtomicBool,
}

impl MockPaperSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_paper(&self, paper: Paper) {
        if let Ok(mut map) = self.papers.write() {
            map.insert(paper.id.clone(), paper);
        }
    }

    pub fn set_links(&self, id: &str, direction: CitationDirection, papers: Vec<Paper>) {
        let target = match direction {
            CitationDirection::Reference => &self.references,
            CitationDirection::Citation => &self.citations,
        };
        if let Ok(mut map) = target.write() {
            map.insert(id.to_string(), papers);
        }
    }

    /// Make every call fail as if the service were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable
            .store(unavailable, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::UpstreamUnavailable {
                service: "mock".to_string(),
                message: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaperSource for MockPaperSource {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Paper>> {
        self.check_available()?;
        let keyword = query.keyword.to_lowercase();
        let papers = self
            .papers
            .read()
            .map(|map| {
                map.values()
                    .filter(|p| p.title.to_lowercase().contains(&keyword))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rank_search_results(papers, query))
    }

    async fn get_paper(&self, id: &str) -> Result<Option<Paper>> {
        self.check_available()?;
        Ok(self.papers.read().ok().and_then(|map| map.get(id).cloned()))
    }

    async fn get_citations(
        &self,
        id: &str,
        direction: CitationDirection,
        max_count: usize,
    ) -> Result<Vec<Paper>> {
        self.check_available()?;
        let source = match direction {
            CitationDirection::Reference => &self.references,
            CitationDirection::Citation => &self.citations,
        };
        Ok(source
            .read()
            .ok()
            .and_then(|map| map.get(id).cloned())
            .unwrap_or_default()
            .into_iter()
            .take(max_count)
            .collect())
    }
}

//! PDF resolution orchestrator
//!
//! One internal waterfall drives both entry points:
//! - [`PdfResolver::resolve`] walks all five providers in priority order
//! - [`PdfResolver::resolve_with`] runs a single provider step
//!
//! The cache is consulted first. Every provider call is paced through the
//! provider's shared limiter, bounded by a timeout and retried on transient
//! failure. A candidate location is accepted only once its download passes
//! validation; otherwise the waterfall moves on.

use crate::cache::{PdfCache, ValidationPolicy};
use crate::download::{HttpDownloader, PdfDownloader};
use crate::errors::ResolverError;
use crate::pdf::{self, PdfInfo};
use crate::providers::{default_providers, PdfProvider, ProviderName, ProviderOutcome};
use futures::stream::{self, StreamExt};
use paperhound_common::config::AppConfig;
use paperhound_common::errors::AppError;
use paperhound_common::pacing::{per_minute_limiter, RateLimiterRegistry, RetryPolicy};
use paperhound_common::Paper;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

const DOWNLOAD_LIMITER: &str = "download";

/// Where a resolved PDF came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfSource {
    Cache,
    SemanticScholar,
    Arxiv,
    Unpaywall,
    GoogleScholar,
    GoogleSearch,
}

impl From<ProviderName> for PdfSource {
    fn from(name: ProviderName) -> Self {
        match name {
            ProviderName::SemanticScholar => PdfSource::SemanticScholar,
            ProviderName::Arxiv => PdfSource::Arxiv,
            ProviderName::Unpaywall => PdfSource::Unpaywall,
            ProviderName::GoogleScholar => PdfSource::GoogleScholar,
            ProviderName::GoogleSearch => PdfSource::GoogleSearch,
        }
    }
}

impl PdfSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfSource::Cache => "cache",
            PdfSource::SemanticScholar => "semantic_scholar",
            PdfSource::Arxiv => "arxiv",
            PdfSource::Unpaywall => "unpaywall",
            PdfSource::GoogleScholar => "google_scholar",
            PdfSource::GoogleSearch => "google_search",
        }
    }
}

/// Final outcome of resolving one paper. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfResolutionRecord {
    pub paper_id: String,
    pub found: bool,
    pub source: Option<PdfSource>,
    pub pdf_url: Option<String>,
    pub local_path: Option<PathBuf>,
    /// Providers tried, in the order they were tried
    pub attempted_sources: Vec<ProviderName>,
}

/// In-progress resolution. Consumed by exactly one finalizer.
struct ResolutionTrail {
    paper_id: String,
    attempted: Vec<ProviderName>,
    started: Instant,
}

impl ResolutionTrail {
    fn start(paper_id: &str) -> Self {
        Self {
            paper_id: paper_id.to_string(),
            attempted: Vec::new(),
            started: Instant::now(),
        }
    }

    fn attempt(&mut self, provider: ProviderName) {
        self.attempted.push(provider);
    }

    fn finish(self, source: Option<PdfSource>, pdf_url: Option<String>, local_path: Option<PathBuf>) -> PdfResolutionRecord {
        let label = source.map_or("none", |s| s.as_str());
        paperhound_common::metrics::record_resolution(label, self.started.elapsed().as_secs_f64());

        PdfResolutionRecord {
            paper_id: self.paper_id,
            found: source.is_some(),
            source,
            pdf_url,
            local_path,
            attempted_sources: self.attempted,
        }
    }

    fn cached(self, local_path: PathBuf) -> PdfResolutionRecord {
        self.finish(Some(PdfSource::Cache), None, Some(local_path))
    }

    fn found(self, provider: ProviderName, pdf_url: String, local_path: PathBuf) -> PdfResolutionRecord {
        self.finish(Some(provider.into()), Some(pdf_url), Some(local_path))
    }

    fn exhausted(self) -> PdfResolutionRecord {
        self.finish(None, None, None)
    }
}

/// Extracted full text plus document info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedText {
    pub paper_id: String,
    pub text_length: usize,
    pub num_pages: Option<usize>,
    pub text: String,
    pub pdf_info: Option<PdfInfo>,
    pub source: Option<PdfSource>,
}

pub struct PdfResolver {
    providers: HashMap<ProviderName, Arc<dyn PdfProvider>>,
    cache: Arc<PdfCache>,
    downloader: Arc<dyn PdfDownloader>,
    limiters: RateLimiterRegistry,
    retry: RetryPolicy,
    timeout: Duration,
}

impl PdfResolver {
    pub fn new(
        providers: Vec<Arc<dyn PdfProvider>>,
        cache: Arc<PdfCache>,
        downloader: Arc<dyn PdfDownloader>,
    ) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.name(), p)).collect(),
            cache,
            downloader,
            limiters: RateLimiterRegistry::new(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(15),
        }
    }

    /// Live providers, HTTP downloader and configured pacing.
    pub fn from_config(config: &AppConfig) -> Result<Self, ResolverError> {
        let providers_config = &config.providers;
        let cache = Arc::new(PdfCache::new(
            config.storage.pdf_dir.clone(),
            ValidationPolicy::from(&config.validation),
        ));
        let downloader = Arc::new(HttpDownloader::new(providers_config)?);

        let limits = &providers_config.rate_limits;
        let limiters = RateLimiterRegistry::new();
        limiters.register(ProviderName::Arxiv.as_str(), per_minute_limiter(limits.arxiv_per_minute));
        limiters.register(ProviderName::Unpaywall.as_str(), per_minute_limiter(limits.unpaywall_per_minute));
        limiters.register(ProviderName::GoogleScholar.as_str(), per_minute_limiter(limits.google_scholar_per_minute));
        limiters.register(ProviderName::GoogleSearch.as_str(), per_minute_limiter(limits.google_search_per_minute));
        limiters.register(DOWNLOAD_LIMITER, per_minute_limiter(limits.download_per_minute));

        Ok(Self::new(default_providers(providers_config)?, cache, downloader)
            .with_limiters(limiters)
            .with_retry(RetryPolicy::from_config(&providers_config.retry))
            .with_timeout(providers_config.timeout()))
    }

    pub fn with_limiters(mut self, limiters: RateLimiterRegistry) -> Self {
        self.limiters = limiters;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &PdfCache {
        &self.cache
    }

    /// Resolve a PDF through the full waterfall.
    #[instrument(skip(self, paper), fields(paper_id = %paper.id))]
    pub async fn resolve(&self, paper: &Paper) -> Result<PdfResolutionRecord, ResolverError> {
        self.run(paper, &ProviderName::ORDER).await
    }

    /// Resolve through a single provider. A miss is a normal not-found record.
    #[instrument(skip(self, paper), fields(paper_id = %paper.id, provider = %provider))]
    pub async fn resolve_with(&self, paper: &Paper, provider: ProviderName) -> Result<PdfResolutionRecord, ResolverError> {
        self.run(paper, &[provider]).await
    }

    /// Resolve many papers with at most `concurrency` in flight. Output follows input order.
    pub async fn resolve_many(
        &self,
        papers: &[Paper],
        concurrency: usize,
    ) -> Vec<Result<PdfResolutionRecord, ResolverError>> {
        stream::iter(papers)
            .map(|paper| self.resolve(paper))
            .buffered(concurrency.max(1))
            .boxed()
            .collect()
            .await
    }

    /// Resolve if needed, then extract full text and document info.
    pub async fn extract_text(&self, paper: &Paper) -> Result<ExtractedText, AppError> {
        let record = self.resolve(paper).await?;
        let Some(path) = record.local_path.clone().filter(|_| record.found) else {
            return Err(AppError::PdfNotFound {
                paper_id: paper.id.clone(),
            });
        };

        let min_chars = self.cache.policy().min_text_chars;
        let paper_id = paper.id.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            let text = pdf::extract_text_from_pdf(&path, min_chars)?;
            let info = pdf::pdf_info(&path).ok();
            Ok::<_, ResolverError>((text, info))
        })
        .await
        .map_err(|e| AppError::TextExtraction {
            paper_id: paper_id.clone(),
            message: e.to_string(),
        })?;

        let (text, info) = extracted.map_err(|e| AppError::TextExtraction {
            paper_id: paper_id.clone(),
            message: e.to_string(),
        })?;

        info!(
            paper_id = %paper_id,
            chars = text.chars().count(),
            pages = info.as_ref().map_or(0, |i| i.num_pages),
            "Text extracted"
        );

        Ok(ExtractedText {
            paper_id,
            text_length: text.chars().count(),
            num_pages: info.as_ref().map(|i| i.num_pages),
            text,
            pdf_info: info,
            source: record.source,
        })
    }

    async fn run(&self, paper: &Paper, order: &[ProviderName]) -> Result<PdfResolutionRecord, ResolverError> {
        let mut trail = ResolutionTrail::start(&paper.id);

        if let Some(path) = self.cache.cached_path(&paper.id).await? {
            paperhound_common::metrics::record_cache(true, "pdf");
            info!(path = %path.display(), "PDF served from cache");
            return Ok(trail.cached(path));
        }
        paperhound_common::metrics::record_cache(false, "pdf");

        for &name in order {
            let Some(provider) = self.providers.get(&name) else {
                continue;
            };
            trail.attempt(name);

            let Some(pdf_url) = self.lookup(provider.as_ref(), paper).await else {
                continue;
            };

            let Some(bytes) = self.download(name, &pdf_url).await else {
                continue;
            };

            match self.cache.store_validated(&paper.id, &bytes).await? {
                Some(path) => {
                    info!(provider = %name, url = %pdf_url, "PDF resolved");
                    return Ok(trail.found(name, pdf_url, path));
                }
                None => {
                    paperhound_common::metrics::record_validation_failure(name.as_str());
                    warn!(provider = %name, url = %pdf_url, "Downloaded file failed validation, continuing");
                }
            }
        }

        warn!(attempted = trail.attempted.len(), "No provider produced a valid PDF");
        Ok(trail.exhausted())
    }

    /// One paced, bounded, retried provider lookup. `None` unless a location was found.
    async fn lookup(&self, provider: &dyn PdfProvider, paper: &Paper) -> Option<String> {
        let name = provider.name();
        if !provider.applicable(paper) {
            paperhound_common::metrics::record_provider_attempt(name.as_str(), "not_applicable");
            return None;
        }

        let result = self
            .retry
            .run(name.as_str(), |_| async move {
                self.limiters.until_ready(name.as_str()).await;
                let outcome = match tokio::time::timeout(self.timeout, provider.attempt(paper)).await {
                    Ok(outcome) => outcome,
                    Err(_) => ProviderOutcome::TransientError(format!(
                        "{} timed out after {}ms",
                        name,
                        self.timeout.as_millis()
                    )),
                };
                paperhound_common::metrics::record_provider_attempt(name.as_str(), outcome.label());

                match outcome {
                    ProviderOutcome::Found(url) => Ok(Some(url)),
                    ProviderOutcome::NotFound => Ok(None),
                    ProviderOutcome::TransientError(reason) => Err(backoff::Error::transient(reason)),
                }
            })
            .await;

        match result {
            Ok(found) => found,
            Err(reason) => {
                warn!(provider = %name, reason = %reason, "Provider kept failing, treating as not found");
                None
            }
        }
    }

    async fn download(&self, provider: ProviderName, url: &str) -> Option<Vec<u8>> {
        let result = self
            .retry
            .run(DOWNLOAD_LIMITER, |_| async move {
                self.limiters.until_ready(DOWNLOAD_LIMITER).await;
                self.downloader.download(url).await.map_err(|e| {
                    if e.is_transient() {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            })
            .await;

        match result {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(provider = %provider, url, error = %e, "Download failed, continuing");
                None
            }
        }
    }
}

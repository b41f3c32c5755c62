//! PDF body download

use crate::errors::ResolverError;
use async_trait::async_trait;
use paperhound_common::config::ProvidersConfig;
use reqwest::StatusCode;
use tracing::debug;

/// Fetches the bytes behind a PDF location
#[async_trait]
pub trait PdfDownloader: Send + Sync {
    async fn download(&self, url: &str) -> Result<Vec<u8>, ResolverError>;
}

/// reqwest-backed downloader with a size cap
pub struct HttpDownloader {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpDownloader {
    pub fn new(config: &ProvidersConfig) -> Result<Self, ResolverError> {
        let client = reqwest::Client::builder()
            .timeout(config.download_timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ResolverError::Config(format!("Failed to build download client: {}", e)))?;

        Ok(Self {
            client,
            max_bytes: config.max_download_bytes,
        })
    }
}

fn failure(url: &str, message: String, transient: bool) -> ResolverError {
    ResolverError::Download {
        url: url.to_string(),
        message,
        transient,
    }
}

#[async_trait]
impl PdfDownloader for HttpDownloader {
    async fn download(&self, url: &str) -> Result<Vec<u8>, ResolverError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failure(url, format!("request failed: {}", e), true))?;

        let status = response.status();
        if !status.is_success() {
            let transient = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            return Err(failure(url, format!("HTTP {}", status), transient));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(ResolverError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_bytes,
                });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| failure(url, format!("body read failed: {}", e), true))?
        {
            if body.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return Err(ResolverError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url, bytes = body.len(), "Download complete");
        Ok(body)
    }
}

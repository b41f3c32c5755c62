//! arXiv preprint PDFs

use super::{status_outcome, transport_outcome, PdfProvider, ProviderName, ProviderOutcome};
use async_trait::async_trait;
use paperhound_common::Paper;
use reqwest::StatusCode;

const ARXIV_DOI_PREFIX: &str = "10.48550/arxiv.";

pub struct ArxivProvider {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: "https://arxiv.org/pdf".to_string(),
        }
    }
}

/// arXiv id for the paper: the explicit id, else one recovered from an arXiv DOI.
pub fn arxiv_id_for(paper: &Paper) -> Option<String> {
    if let Some(id) = paper.arxiv_id.as_deref() {
        let id = id.trim();
        let id = id
            .strip_prefix("arXiv:")
            .or_else(|| id.strip_prefix("arxiv:"))
            .unwrap_or(id)
            .trim();
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }

    let doi = paper.doi.as_deref()?.trim();
    let prefix = doi.get(..ARXIV_DOI_PREFIX.len())?;
    if prefix.eq_ignore_ascii_case(ARXIV_DOI_PREFIX) {
        let id = doi[ARXIV_DOI_PREFIX.len()..].trim();
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    None
}

#[async_trait]
impl PdfProvider for ArxivProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Arxiv
    }

    fn applicable(&self, paper: &Paper) -> bool {
        arxiv_id_for(paper).is_some()
    }

    async fn attempt(&self, paper: &Paper) -> ProviderOutcome {
        let Some(id) = arxiv_id_for(paper) else {
            return ProviderOutcome::NotFound;
        };
        let url = format!("{}/{}.pdf", self.base_url, id);

        let response = match self.client.head(&url).send().await {
            Ok(response) => response,
            Err(e) => return transport_outcome(self.name(), e),
        };

        match response.status() {
            StatusCode::OK => {
                tracing::info!(paper_id = %paper.id, url = %url, "arXiv PDF located");
                ProviderOutcome::Found(url)
            }
            status => status_outcome(self.name(), status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_id_normalized() {
        let mut paper = Paper::new("p", "T");
        paper.arxiv_id = Some(" arXiv:2301.12345 ".into());
        assert_eq!(arxiv_id_for(&paper).as_deref(), Some("2301.12345"));
    }

    #[test]
    fn test_id_recovered_from_doi() {
        let mut paper = Paper::new("p", "T");
        paper.doi = Some("10.48550/arXiv.1706.03762".into());
        assert_eq!(arxiv_id_for(&paper).as_deref(), Some("1706.03762"));

        paper.doi = Some("10.1145/3589334.3645598".into());
        assert_eq!(arxiv_id_for(&paper), None);
    }

    #[tokio::test]
    async fn test_not_applicable_without_id() {
        let provider = ArxivProvider::new(reqwest::Client::new());
        let paper = Paper::new("p", "T");
        assert!(!provider.applicable(&paper));
        assert_eq!(provider.attempt(&paper).await, ProviderOutcome::NotFound);
    }
}

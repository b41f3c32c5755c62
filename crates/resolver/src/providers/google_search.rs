//! Google web search restricted to PDF files

use super::{anchors, status_outcome, transport_outcome, PdfProvider, ProviderName, ProviderOutcome};
use async_trait::async_trait;
use paperhound_common::Paper;
use reqwest::Url;

pub struct GoogleSearchProvider {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleSearchProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: "https://www.google.com/search".to_string(),
        }
    }
}

pub fn search_query(paper: &Paper) -> String {
    format!("\"{}\" filetype:pdf", paper.title.trim())
}

/// Google wraps results as `/url?q=<target>&sa=...`; return the target.
fn unwrap_redirect(href: &str) -> Option<String> {
    if !href.contains("url?q=") {
        return Some(href.to_string());
    }
    let base = Url::parse("https://www.google.com/").ok()?;
    let url = base.join(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned())
}

fn pdf_link(html: &str) -> Option<String> {
    anchors(html)
        .into_iter()
        .filter(|a| a.href.contains("http") && a.href.to_lowercase().contains(".pdf"))
        .find_map(|a| unwrap_redirect(&a.href))
        .filter(|url| url.starts_with("http"))
}

#[async_trait]
impl PdfProvider for GoogleSearchProvider {
    fn name(&self) -> ProviderName {
        ProviderName::GoogleSearch
    }

    fn applicable(&self, paper: &Paper) -> bool {
        !paper.title.trim().is_empty()
    }

    async fn attempt(&self, paper: &Paper) -> ProviderOutcome {
        let query = search_query(paper);
        let response = match self
            .client
            .get(&self.base_url)
            .query(&[("q", query.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_outcome(self.name(), e),
        };

        if !response.status().is_success() {
            return status_outcome(self.name(), response.status());
        }

        let html = match response.text().await {
            Ok(html) => html,
            Err(e) => return transport_outcome(self.name(), e),
        };

        match pdf_link(&html) {
            Some(url) => {
                tracing::info!(paper_id = %paper.id, url = %url, "Google search PDF located");
                ProviderOutcome::Found(url)
            }
            None => ProviderOutcome::NotFound,
        }
    }
}

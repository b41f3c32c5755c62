//! Google Scholar result scraping
//!
//! Looks for result links labelled `[PDF]`. Markup changes degrade to
//! `NotFound`; they never surface as errors.

use super::{anchors, status_outcome, transport_outcome, PdfProvider, ProviderName, ProviderOutcome};
use async_trait::async_trait;
use paperhound_common::Paper;

pub struct GoogleScholarProvider {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleScholarProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: "https://scholar.google.com/scholar".to_string(),
        }
    }
}

/// Title followed by the first author, when known
pub fn scholar_query(paper: &Paper) -> String {
    match paper.first_author() {
        Some(author) => format!("{} {}", paper.title, author),
        None => paper.title.clone(),
    }
}

/// First absolute link whose text carries the `[PDF]` marker
fn pdf_link(html: &str) -> Option<String> {
    anchors(html)
        .into_iter()
        .find(|a| a.text.contains("[PDF]") && a.href.starts_with("http"))
        .map(|a| a.href)
}

#[async_trait]
impl PdfProvider for GoogleScholarProvider {
    fn name(&self) -> ProviderName {
        ProviderName::GoogleScholar
    }

    fn applicable(&self, paper: &Paper) -> bool {
        !paper.title.trim().is_empty()
    }

    async fn attempt(&self, paper: &Paper) -> ProviderOutcome {
        let query = scholar_query(paper);
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
                tracing::info!(paper_id = %paper.id, url = %url, "Google Scholar PDF located");
                ProviderOutcome::Found(url)
            }
            None => ProviderOutcome::NotFound,
        }
    }
}

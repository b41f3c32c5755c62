//! Unpaywall DOI open-access lookup

use super::{status_outcome, transport_outcome, PdfProvider, ProviderName, ProviderOutcome};
use async_trait::async_trait;
use paperhound_common::Paper;
use serde::Deserialize;

pub struct UnpaywallProvider {
    client: reqwest::Client,
    email: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct UnpaywallRecord {
    #[serde(default)]
    is_oa: bool,
    best_oa_location: Option<OaLocation>,
    #[serde(default)]
    oa_locations: Vec<OaLocation>,
}

#[derive(Debug, Deserialize)]
struct OaLocation {
    url_for_pdf: Option<String>,
}

impl UnpaywallProvider {
    pub fn new(client: reqwest::Client, email: String) -> Self {
        Self {
            client,
            email,
            base_url: "https://api.unpaywall.org/v2".to_string(),
        }
    }
}

/// PDF link from an Unpaywall record: the best location first, then any other.
fn pdf_location(record: UnpaywallRecord) -> Option<String> {
    if !record.is_oa {
        return None;
    }
    record
        .best_oa_location
        .into_iter()
        .chain(record.oa_locations)
        .filter_map(|location| location.url_for_pdf)
        .find(|url| !url.trim().is_empty())
}

#[async_trait]
impl PdfProvider for UnpaywallProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Unpaywall
    }

    /// Needs a DOI and a contact address; Unpaywall rejects anonymous requests.
    fn applicable(&self, paper: &Paper) -> bool {
        !self.email.trim().is_empty() && paper.doi.as_deref().is_some_and(|doi| !doi.trim().is_empty())
    }

    async fn attempt(&self, paper: &Paper) -> ProviderOutcome {
        let Some(doi) = paper.doi.as_deref().map(str::trim).filter(|d| !d.is_empty()) else {
            return ProviderOutcome::NotFound;
        };
        let url = format!("{}/{}", self.base_url, doi);

        let response = match self
            .client
            .get(&url)
            .query(&[("email", self.email.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_outcome(self.name(), e),
        };

        if !response.status().is_success() {
            return status_outcome(self.name(), response.status());
        }

        match response.json::<UnpaywallRecord>().await {
            Ok(record) => match pdf_location(record) {
                Some(pdf_url) => {
                    tracing::info!(paper_id = %paper.id, url = %pdf_url, "Unpaywall PDF located");
                    ProviderOutcome::Found(pdf_url)
                }
                None => ProviderOutcome::NotFound,
            },
            Err(e) => ProviderOutcome::TransientError(format!("unpaywall returned malformed JSON: {}", e)),
        }
    }
}

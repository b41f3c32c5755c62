//! Direct open-access link reported by the paper source

use super::{PdfProvider, ProviderName, ProviderOutcome};
use async_trait::async_trait;
use paperhound_common::Paper;

pub struct SemanticScholarPdfProvider;

#[async_trait]
impl PdfProvider for SemanticScholarPdfProvider {
    fn name(&self) -> ProviderName {
        ProviderName::SemanticScholar
    }

    fn applicable(&self, paper: &Paper) -> bool {
        paper.pdf_url.is_some()
    }

    async fn attempt(&self, paper: &Paper) -> ProviderOutcome {
        match paper.pdf_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => ProviderOutcome::Found(url.to_string()),
            _ => ProviderOutcome::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_uses_open_access_link() {
        let mut paper = Paper::new("p", "T");
        assert_eq!(SemanticScholarPdfProvider.attempt(&paper).await, ProviderOutcome::NotFound);

        paper.pdf_url = Some("https://arxiv.org/pdf/1706.03762.pdf".into());
        assert_eq!(
            SemanticScholarPdfProvider.attempt(&paper).await,
            ProviderOutcome::Found("https://arxiv.org/pdf/1706.03762.pdf".into())
        );
    }
}

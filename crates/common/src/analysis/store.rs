//! Per-paper analysis results, one JSON document per paper id

use super::AnalysisPayload;
use crate::errors::{AppError, Result};
use crate::locks::KeyedLocks;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub paper_id: String,
    pub summary: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisPayload>,
    pub created_at: DateTime<Utc>,
    pub summary_length: usize,
}

impl SummaryRecord {
    pub fn new(paper_id: &str, summary: String, metadata: Option<serde_json::Value>) -> Self {
        Self {
            paper_id: paper_id.to_string(),
            summary_length: summary.chars().count(),
            summary,
            metadata: metadata.unwrap_or_else(|| serde_json::json!({})),
            analysis: None,
            created_at: Utc::now(),
        }
    }

    /// Record built from a structured analysis; the summary text is taken from it.
    pub fn from_analysis(paper_id: &str, analysis: AnalysisPayload, metadata: Option<serde_json::Value>) -> Self {
        let mut record = Self::new(paper_id, analysis.summary.clone(), metadata);
        record.analysis = Some(analysis);
        record
    }
}

/// Directory of `<paper_id>.json` summary documents
pub struct AnalysisStore {
    dir: PathBuf,
    locks: KeyedLocks,
}

/// Ids become file names; anything that could escape the directory is refused.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

impl AnalysisStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: KeyedLocks::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, paper_id: &str) -> Result<PathBuf> {
        if !is_safe_id(paper_id) {
            return Err(AppError::Validation {
                message: format!("Paper id {:?} cannot be used as a file name", paper_id),
                field: Some("paper_id".to_string()),
            });
        }
        Ok(self.dir.join(format!("{}.json", paper_id)))
    }

    /// Write (or replace) the record for its paper id. Returns the file path.
    pub async fn save(&self, record: &SummaryRecord) -> Result<PathBuf> {
        let path = self.path_for(&record.paper_id)?;
        let _guard = self.locks.lock(&record.paper_id).await;

        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::info!(
            paper_id = %record.paper_id,
            summary_length = record.summary_length,
            path = %path.display(),
            "Summary saved"
        );
        Ok(path)
    }

    pub async fn get(&self, paper_id: &str) -> Result<SummaryRecord> {
        let path = self.path_for(paper_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::SummaryNotFound {
                    paper_id: paper_id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::new(dir.path().join("summaries"));

        let record = SummaryRecord::new("abc123", "A short summary".into(), None);
        let path = store.save(&record).await.unwrap();
        assert!(path.ends_with("abc123.json"));

        let loaded = store.get("abc123").await.unwrap();
        assert_eq!(loaded.summary, "A short summary");
        assert_eq!(loaded.summary_length, 15);
        assert_eq!(loaded.metadata, serde_json::json!({}));
        assert!(loaded.analysis.is_none());
    }

    #[tokio::test]
    async fn test_missing_summary() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::new(dir.path());
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, AppError::SummaryNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unsafe_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::new(dir.path());
        let record = SummaryRecord::new("../escape", "x".into(), None);
        tokio_test::assert_err!(store.save(&record).await);
    }
}

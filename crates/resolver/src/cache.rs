//! On-disk PDF cache and validator
//!
//! The cache exclusively owns the paper id -> local file mapping. Only
//! validated files are ever visible under their final name: downloads are
//! written to a temporary file, validated, and renamed into place. Writes
//! for one paper id are serialized; different ids proceed independently.

use crate::errors::ResolverError;
use crate::pdf;
use paperhound_common::config::ValidationConfig;
use paperhound_common::KeyedLocks;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Acceptance rules for a downloaded PDF
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    /// Files of this size or smaller are rejected outright (HTML error pages saved as .pdf)
    pub min_bytes: u64,
    /// Non-whitespace characters the text probe must recover
    pub min_text_chars: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::from(&ValidationConfig::default())
    }
}

impl From<&ValidationConfig> for ValidationPolicy {
    fn from(config: &ValidationConfig) -> Self {
        Self {
            min_bytes: config.min_bytes,
            min_text_chars: config.min_text_chars,
        }
    }
}

pub struct PdfCache {
    dir: PathBuf,
    policy: ValidationPolicy,
    locks: KeyedLocks,
}

fn is_safe_stem(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// File stem for a paper id. Ids that are not plain file names are hashed.
pub fn file_stem(paper_id: &str) -> String {
    if is_safe_stem(paper_id) {
        paper_id.to_string()
    } else {
        hex::encode(Sha256::digest(paper_id.as_bytes()))
    }
}

async fn remove_if_present(path: &Path) -> Result<(), ResolverError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl PdfCache {
    pub fn new(dir: impl Into<PathBuf>, policy: ValidationPolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
            locks: KeyedLocks::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Final location of a paper's PDF, whether or not it exists
    pub fn path_for(&self, paper_id: &str) -> PathBuf {
        self.dir.join(format!("{}.pdf", file_stem(paper_id)))
    }

    /// Validate a file in place. Invalid files are deleted.
    pub async fn validate(&self, local_path: &Path) -> Result<bool, ResolverError> {
        let metadata = match tokio::fs::metadata(local_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        if metadata.len() <= self.policy.min_bytes {
            warn!(
                path = %local_path.display(),
                size = metadata.len(),
                min_bytes = self.policy.min_bytes,
                "PDF too small, likely an error page"
            );
            remove_if_present(local_path).await?;
            return Ok(false);
        }

        let probe_path = local_path.to_path_buf();
        let min_chars = self.policy.min_text_chars;
        let probe = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&probe_path, min_chars)).await;

        match probe {
            Ok(Ok(text)) => {
                debug!(path = %local_path.display(), chars = pdf::visible_chars(&text), "PDF validated");
                Ok(true)
            }
            Ok(Err(e)) => {
                warn!(path = %local_path.display(), error = %e, "PDF rejected by text probe");
                remove_if_present(local_path).await?;
                Ok(false)
            }
            Err(join_error) => {
                // A parser panic on a malformed file counts as corrupt.
                warn!(path = %local_path.display(), error = %join_error, "PDF probe aborted");
                remove_if_present(local_path).await?;
                Ok(false)
            }
        }
    }

    /// Whether a valid PDF is cached for `paper_id`. A corrupt entry is deleted.
    pub async fn has_valid(&self, paper_id: &str) -> Result<bool, ResolverError> {
        Ok(self.cached_path(paper_id).await?.is_some())
    }

    /// Path of the validated cached PDF, if any
    pub async fn cached_path(&self, paper_id: &str) -> Result<Option<PathBuf>, ResolverError> {
        let _guard = self.locks.lock(paper_id).await;
        let path = self.path_for(paper_id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        if self.validate(&path).await? {
            Ok(Some(path))
        } else {
            info!(paper_id, "Dropped corrupt cache entry");
            Ok(None)
        }
    }

    /// Write `bytes` as the paper's PDF without validating.
    pub async fn store(&self, paper_id: &str, bytes: &[u8]) -> Result<PathBuf, ResolverError> {
        let _guard = self.locks.lock(paper_id).await;
        self.write_atomic(paper_id, bytes).await
    }

    /// Validate `bytes` and keep them only if they pass. `Ok(None)` means rejected;
    /// nothing is left on disk in that case.
    pub async fn store_validated(&self, paper_id: &str, bytes: &[u8]) -> Result<Option<PathBuf>, ResolverError> {
        let _guard = self.locks.lock(paper_id).await;
        tokio::fs::create_dir_all(&self.dir).await?;

        let tmp = self.temp_path(paper_id);
        tokio::fs::write(&tmp, bytes).await?;

        if !self.validate(&tmp).await? {
            return Ok(None);
        }

        let path = self.path_for(paper_id);
        tokio::fs::rename(&tmp, &path).await?;
        info!(paper_id, path = %path.display(), size = bytes.len(), "PDF cached");
        Ok(Some(path))
    }

    async fn write_atomic(&self, paper_id: &str, bytes: &[u8]) -> Result<PathBuf, ResolverError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = self.temp_path(paper_id);
        tokio::fs::write(&tmp, bytes).await?;
        let path = self.path_for(paper_id);
        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    fn temp_path(&self, paper_id: &str) -> PathBuf {
        self.dir
            .join(format!(".{}.{}.part", file_stem(paper_id), uuid::Uuid::new_v4()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    fn cache(dir: &Path) -> PdfCache {
        PdfCache::new(dir.join("papers_pdf"), ValidationPolicy::default())
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("204e3073870fae3d"), "204e3073870fae3d");
        let hashed = file_stem("../../etc/passwd");
        assert_eq!(hashed.len(), 64);
        assert!(!hashed.contains('/'));
    }

    #[tokio::test]
    async fn test_valid_pdf_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());

        assert!(!cache.has_valid("p1").await.unwrap());
        let path = cache.store_validated("p1", &test_support::text_pdf()).await.unwrap().unwrap();
        assert_eq!(path, cache.path_for("p1"));
        assert!(cache.has_valid("p1").await.unwrap());
    }

    #[tokio::test]
    async fn test_html_page_rejected_and_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());

        let stored = cache.store_validated("p1", &test_support::html_page(512)).await.unwrap();
        assert!(stored.is_none());
        assert!(!cache.path_for("p1").exists());

        let leftovers = std::fs::read_dir(cache.dir()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_textless_pdf_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        let stored = cache.store_validated("scan", &test_support::image_only_pdf()).await.unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_size_floor_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = test_support::text_pdf();
        let policy = |min_bytes: u64| ValidationPolicy {
            min_bytes,
            ..ValidationPolicy::default()
        };

        let strict = PdfCache::new(dir.path().join("strict"), policy(pdf.len() as u64));
        assert!(strict.store_validated("p1", &pdf).await.unwrap().is_none());
        assert!(!strict.path_for("p1").exists());

        let loose = PdfCache::new(dir.path().join("loose"), policy(pdf.len() as u64 - 1));
        assert!(loose.store_validated("p1", &pdf).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_entry_removed_on_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());

        let path = cache.store("p2", &[b'x'; 2048]).await.unwrap();
        assert!(path.exists());

        assert!(!cache.has_valid("p2").await.unwrap());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_validate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        assert!(!cache.validate(&dir.path().join("absent.pdf")).await.unwrap());
    }
}

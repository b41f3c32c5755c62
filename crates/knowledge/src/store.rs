//! Persistent knowledge store
//!
//! One JSON document holds every topic. Mutations on a topic are
//! serialized by a per-topic lock, applied to a copy, then committed and
//! written through to disk. A failed write rolls the in-memory topic back,
//! so memory never runs ahead of the file.

use crate::classifier::{Classification, ClassificationRules};
use crate::state::StateThresholds;
use crate::topic::{normalize_topic_name, KnowledgeState, Maturity, SearchRecord, Topic, UnreadPapers};
use chrono::{DateTime, Utc};
use paperhound_common::errors::{AppError, Result};
use paperhound_common::{KeyedLocks, Paper};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

const DOCUMENT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KnowledgeDocument {
    version: String,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    #[serde(default)]
    topics: BTreeMap<String, Topic>,
}

impl KnowledgeDocument {
    fn empty() -> Self {
        let now = Utc::now();
        Self {
            version: DOCUMENT_VERSION.to_string(),
            created_at: now,
            last_updated: now,
            topics: BTreeMap::new(),
        }
    }
}

/// Result of filing a batch of papers under one maturity
#[derive(Debug, Clone, Serialize)]
pub struct AddPapersOutcome {
    pub added: Vec<String>,
    pub skipped: Vec<String>,
    pub topic: Topic,
}

/// Result of classify-and-add
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyOutcome {
    pub paper_id: String,
    pub maturity: Maturity,
    pub reason: String,
    /// False when the paper was already filed under the same bucket
    pub added: bool,
    pub topic: Topic,
}

/// Whether a missing topic may be created by an update
enum Missing<'a> {
    Create(&'a str, KnowledgeState),
    Fail,
}

pub struct KnowledgeStore {
    path: PathBuf,
    document: RwLock<KnowledgeDocument>,
    topic_locks: KeyedLocks,
    persist_lock: Mutex<()>,
    thresholds: StateThresholds,
    rules: ClassificationRules,
}

impl KnowledgeStore {
    /// Load the store from `path`, creating an empty document if the file is absent.
    ///
    /// An unreadable or corrupt file is an error; it is never silently replaced.
    pub async fn open(
        path: impl Into<PathBuf>,
        thresholds: StateThresholds,
        rules: ClassificationRules,
    ) -> Result<Self> {
        let path = path.into();
        let document = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<KnowledgeDocument>(&bytes).map_err(|e| AppError::Storage {
                message: format!("Knowledge file {} is corrupt: {}", path.display(), e),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let document = KnowledgeDocument::empty();
                write_atomic(&path, &serde_json::to_vec_pretty(&document)?).await?;
                tracing::info!(path = %path.display(), "Created knowledge file");
                document
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %path.display(),
            topics = document.topics.len(),
            "Knowledge store loaded"
        );

        Ok(Self {
            path,
            document: RwLock::new(document),
            topic_locks: KeyedLocks::new(),
            persist_lock: Mutex::new(()),
            thresholds,
            rules,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rules(&self) -> &ClassificationRules {
        &self.rules
    }

    pub async fn list_topics(&self) -> Vec<Topic> {
        self.document.read().await.topics.values().cloned().collect()
    }

    pub async fn get_topic(&self, name: &str) -> Option<Topic> {
        let key = normalize_topic_name(name);
        self.document.read().await.topics.get(&key).cloned()
    }

    /// Create a topic, or return the existing one unchanged.
    pub async fn create_topic(&self, name: &str, initial_state: Option<KnowledgeState>) -> Result<Topic> {
        let state = initial_state.unwrap_or_default();
        let ((), topic) = self
            .update_topic(name, Missing::Create(name, state), |_| Ok(()))
            .await?;
        Ok(topic)
    }

    /// File papers under one maturity, creating the topic if needed.
    /// Ids already present anywhere in the topic are skipped.
    #[tracing::instrument(skip(self, papers), fields(count = papers.len()))]
    pub async fn add_papers(&self, name: &str, papers: Vec<Paper>, maturity: Maturity) -> Result<AddPapersOutcome> {
        let ((added, skipped), topic) = self
            .update_topic(name, Missing::Create(name, KnowledgeState::Beginner), |topic| {
                let mut added = Vec::new();
                let mut skipped = Vec::new();
                for paper in papers {
                    let id = paper.id.clone();
                    if topic.insert(paper, maturity, None) {
                        added.push(id);
                    } else {
                        skipped.push(id);
                    }
                }
                Ok((added, skipped))
            })
            .await?;

        tracing::info!(
            topic = %topic.topic_name,
            maturity = %maturity,
            added = added.len(),
            skipped = skipped.len(),
            "Papers added to topic"
        );
        Ok(AddPapersOutcome { added, skipped, topic })
    }

    /// Classify a paper and file it. Filing it again under the same bucket is a
    /// no-op; a paper already held under a different bucket is refused.
    #[tracing::instrument(skip(self, paper), fields(paper_id = %paper.id))]
    pub async fn classify_and_add(&self, name: &str, paper: Paper) -> Result<ClassifyOutcome> {
        let Classification { maturity, reason } = self.rules.classify(&paper);
        paperhound_common::metrics::record_classification(maturity.as_str());

        let paper_id = paper.id.clone();
        let topic_label = name.to_string();
        let stored_reason = reason.clone();
        let (added, topic) = self
            .update_topic(name, Missing::Create(name, KnowledgeState::Beginner), move |topic| {
                match topic.locate(&paper.id) {
                    Some(existing) if existing == maturity => Ok(false),
                    Some(existing) => Err(AppError::PaperAlreadyClassified {
                        topic: topic_label,
                        paper_id: paper.id.clone(),
                        existing: existing.to_string(),
                        requested: maturity.to_string(),
                    }),
                    None => Ok(topic.insert(paper, maturity, Some(stored_reason))),
                }
            })
            .await?;

        Ok(ClassifyOutcome {
            paper_id,
            maturity,
            reason,
            added,
            topic,
        })
    }

    /// Mark a paper read. Marking an already-read paper changes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn mark_read(&self, name: &str, paper_id: &str) -> Result<Topic> {
        let topic_label = name.to_string();
        let (changed, topic) = self
            .update_topic(name, Missing::Fail, |topic| {
                topic.mark_read(paper_id).ok_or_else(|| AppError::PaperNotInTopic {
                    topic: topic_label,
                    paper_id: paper_id.to_string(),
                })
            })
            .await?;

        if changed {
            tracing::info!(
                topic = %topic.topic_name,
                paper_id,
                progress = topic.knowledge_state.progress_percentage,
                state = %topic.knowledge_state.state,
                "Paper marked read"
            );
        }
        Ok(topic)
    }

    /// Unread papers per bucket; empty for an unknown topic.
    pub async fn unread_papers(&self, name: &str) -> UnreadPapers {
        self.get_topic(name)
            .await
            .map(|topic| topic.unread())
            .unwrap_or_default()
    }

    /// Append a search to the topic's history, creating the topic if needed.
    pub async fn add_search_history(&self, name: &str, record: SearchRecord) -> Result<Topic> {
        let ((), topic) = self
            .update_topic(name, Missing::Create(name, KnowledgeState::Beginner), |topic| {
                topic.search_history.push(record);
                Ok(())
            })
            .await?;
        Ok(topic)
    }

    /// Every paper id filed in the topic; empty for an unknown topic.
    pub async fn known_paper_ids(&self, name: &str) -> HashSet<String> {
        let key = normalize_topic_name(name);
        self.document
            .read()
            .await
            .topics
            .get(&key)
            .map(|topic| topic.paper_ids().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Apply `mutate` to a copy of the topic and commit it.
    ///
    /// On `Err` nothing changes. An unchanged existing topic is not rewritten.
    async fn update_topic<T, F>(&self, name: &str, missing: Missing<'_>, mutate: F) -> Result<(T, Topic)>
    where
        F: FnOnce(&mut Topic) -> Result<T>,
    {
        let key = normalize_topic_name(name);
        if key.is_empty() {
            return Err(AppError::Validation {
                message: "Topic name must not be empty".to_string(),
                field: Some("topic_name".to_string()),
            });
        }
        let _guard = self.topic_locks.lock(&key).await;

        let existing = self.document.read().await.topics.get(&key).cloned();
        let created = existing.is_none();
        let mut candidate = match (existing.clone(), missing) {
            (Some(topic), _) => topic,
            (None, Missing::Create(display, state)) => Topic::new(display, state),
            (None, Missing::Fail) => {
                return Err(AppError::TopicNotFound { name: name.to_string() });
            }
        };

        let value = mutate(&mut candidate)?;

        if let Some(original) = existing.as_ref().filter(|original| **original == candidate) {
            return Ok((value, original.clone()));
        }
        candidate.refresh(&self.thresholds);

        {
            let mut document = self.document.write().await;
            document.topics.insert(key.clone(), candidate.clone());
            document.last_updated = Utc::now();
        }

        if let Err(e) = self.persist().await {
            let mut document = self.document.write().await;
            match existing {
                Some(original) => {
                    document.topics.insert(key.clone(), original);
                }
                None => {
                    document.topics.remove(&key);
                }
            }
            tracing::error!(topic = %key, error = %e, "Knowledge write failed, change rolled back");
            return Err(e);
        }

        if created {
            tracing::info!(topic = %key, state = %candidate.knowledge_state.state, "Topic created");
        }
        Ok((value, candidate))
    }

    async fn persist(&self) -> Result<()> {
        let _persist = self.persist_lock.lock().await;
        // Snapshot after taking the persist lock so the last writer carries every commit.
        let body = {
            let document = self.document.read().await;
            serde_json::to_vec_pretty(&*document)?
        };
        write_atomic(&self.path, &body).await
    }
}

async fn write_atomic(path: &Path, body: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    if let Err(e) = tokio::fs::write(&tmp, body).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn rules() -> ClassificationRules {
        ClassificationRules {
            current_year: Some(2025),
            ..ClassificationRules::default()
        }
    }

    async fn open_store(dir: &tempfile::TempDir) -> KnowledgeStore {
        KnowledgeStore::open(dir.path().join("knowledge.json"), StateThresholds::default(), rules())
            .await
            .unwrap()
    }

    fn paper(id: &str, year: i32, citations: u64) -> Paper {
        let mut paper = Paper::new(id, &format!("Paper {}", id));
        paper.year = Some(year);
        paper.citations = citations;
        paper
    }

    #[tokio::test]
    async fn test_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        assert!(store.path().exists());
        assert!(store.list_topics().await.is_empty());

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], "1.0");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let result = KnowledgeStore::open(&path, StateThresholds::default(), rules()).await;
        assert!(matches!(result, Err(AppError::Storage { .. })));
        assert_eq!(std::fs::read(&path).unwrap(), b"{ not json");
    }

    #[tokio::test]
    async fn test_create_topic_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let first = store
            .create_topic("GNN Recommendation", Some(KnowledgeState::Intermediate))
            .await
            .unwrap();
        let second = store.create_topic("gnn  recommendation", None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.knowledge_state.state, KnowledgeState::Intermediate);
        assert_eq!(store.list_topics().await.len(), 1);
    }

    #[tokio::test]
    async fn test_add_papers_skips_duplicates_across_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store
            .add_papers("gnn", vec![paper("a", 2010, 900)], Maturity::Foundation)
            .await
            .unwrap();
        let outcome = store
            .add_papers("gnn", vec![paper("a", 2010, 900), paper("b", 2024, 3)], Maturity::Recent)
            .await
            .unwrap();

        assert_eq!(outcome.added, vec!["b"]);
        assert_eq!(outcome.skipped, vec!["a"]);
        assert_eq!(outcome.topic.foundation_papers.len(), 1);
        assert_eq!(outcome.topic.recent_papers.len(), 1);
        assert_eq!(outcome.topic.reading_order, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_classify_and_add() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let outcome = store.classify_and_add("gnn", paper("old", 2012, 5000)).await.unwrap();
        assert_eq!(outcome.maturity, Maturity::Foundation);
        assert!(outcome.added);
        assert!(outcome.topic.foundation_papers[0].reason.is_some());

        let again = store.classify_and_add("gnn", paper("old", 2012, 5000)).await.unwrap();
        assert!(!again.added);
        assert_eq!(again.topic.total_papers(), 1);
    }

    #[tokio::test]
    async fn test_classify_conflict_leaves_topic_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store
            .add_papers("gnn", vec![paper("p", 2024, 1)], Maturity::Core)
            .await
            .unwrap();
        let before = store.get_topic("gnn").await.unwrap();

        let err = store.classify_and_add("gnn", paper("p", 2024, 1)).await.unwrap_err();
        assert!(matches!(err, AppError::PaperAlreadyClassified { .. }));
        assert_eq!(store.get_topic("gnn").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_mark_read_drives_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let ids: Vec<String> = (0..5).map(|i| format!("p{}", i)).collect();
        let papers = ids.iter().map(|id| paper(id, 2021, 10)).collect();
        store.add_papers("gnn", papers, Maturity::Core).await.unwrap();

        for id in &ids[..3] {
            store.mark_read("gnn", id).await.unwrap();
        }
        let topic = store.mark_read("gnn", &ids[3]).await.unwrap();
        assert_eq!(topic.knowledge_state.progress_percentage, 80.0);
        assert_eq!(topic.knowledge_state.state, KnowledgeState::Intermediate);

        let topic = store.mark_read("gnn", &ids[4]).await.unwrap();
        assert_eq!(topic.knowledge_state.state, KnowledgeState::Experienced);
        assert!(topic.reading_order.is_empty());

        // adding unread papers lowers the percentage but never the state
        let topic = store
            .add_papers("gnn", vec![paper("late", 2025, 0)], Maturity::Recent)
            .await
            .unwrap()
            .topic;
        assert!(topic.knowledge_state.progress_percentage < 95.0);
        assert_eq!(topic.knowledge_state.state, KnowledgeState::Experienced);
    }

    #[tokio::test]
    async fn test_mark_read_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let err = store.mark_read("nothing", "p").await.unwrap_err();
        assert!(matches!(err, AppError::TopicNotFound { .. }));

        store.create_topic("gnn", None).await.unwrap();
        let err = store.mark_read("gnn", "p").await.unwrap_err();
        assert!(matches!(err, AppError::PaperNotInTopic { .. }));
        assert!(err.is_state_integrity());
    }

    #[tokio::test]
    async fn test_mark_read_twice_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store
            .add_papers("gnn", vec![paper("a", 2021, 0), paper("b", 2021, 0)], Maturity::Core)
            .await
            .unwrap();

        let first = store.mark_read("gnn", "a").await.unwrap();
        let second = store.mark_read("gnn", "a").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.knowledge_state.core_papers_read, 1);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_store(&dir).await;
            store
                .add_papers("gnn", vec![paper("a", 2021, 0)], Maturity::Core)
                .await
                .unwrap();
            store.mark_read("gnn", "a").await.unwrap();
            store
                .add_search_history(
                    "gnn",
                    SearchRecord {
                        searched_at: Utc::now(),
                        keyword: "graph neural".into(),
                        year_from: Some(2019),
                        year_to: None,
                        result_count: 12,
                    },
                )
                .await
                .unwrap();
        }

        let store = open_store(&dir).await;
        let topic = store.get_topic("GNN").await.unwrap();
        assert_eq!(topic.knowledge_state.state, KnowledgeState::Experienced);
        assert_eq!(topic.search_history.len(), 1);
        assert_eq!(store.known_paper_ids("gnn").await, HashSet::from(["a".to_string()]));
    }

    #[tokio::test]
    async fn test_unread_papers_for_unknown_topic_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let unread = store.unread_papers("missing").await;
        assert!(unread.foundation.is_empty() && unread.core.is_empty() && unread.recent.is_empty());
    }

    #[tokio::test]
    async fn test_empty_topic_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        tokio_test::assert_err!(store.create_topic("   ", None).await);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(open_store(&dir).await);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let topic = if i % 2 == 0 { "gnn" } else { "llm" };
                store
                    .add_papers(topic, vec![paper(&format!("p{}", i), 2021, 0)], Maturity::Core)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get_topic("gnn").await.unwrap().total_papers(), 8);
        assert_eq!(store.get_topic("llm").await.unwrap().total_papers(), 8);

        drop(store);
        let reopened = open_store(&dir).await;
        assert_eq!(reopened.get_topic("gnn").await.unwrap().total_papers(), 8);
        assert_eq!(reopened.get_topic("llm").await.unwrap().total_papers(), 8);
    }
}

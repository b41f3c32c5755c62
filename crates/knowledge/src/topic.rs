//! Topic model
//!
//! A topic holds three ordered maturity buckets. A paper id appears in at
//! most one bucket; inserting an id that is already present anywhere in the
//! topic is a no-op.

use crate::state::{self, StateThresholds};
use chrono::{DateTime, Utc};
use paperhound_common::errors::AppError;
use paperhound_common::Paper;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Progress tier of a topic. Ordered: a topic only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeState {
    #[default]
    Beginner,
    Intermediate,
    Experienced,
}

impl KnowledgeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeState::Beginner => "beginner",
            KnowledgeState::Intermediate => "intermediate",
            KnowledgeState::Experienced => "experienced",
        }
    }
}

impl fmt::Display for KnowledgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnowledgeState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(KnowledgeState::Beginner),
            "intermediate" => Ok(KnowledgeState::Intermediate),
            "experienced" => Ok(KnowledgeState::Experienced),
            other => Err(AppError::Validation {
                message: format!("Unknown knowledge state: {}", other),
                field: Some("knowledge_state".to_string()),
            }),
        }
    }
}

/// Maturity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Maturity {
    Foundation,
    Core,
    Recent,
}

impl Maturity {
    /// Reading order: foundations first
    pub const ALL: [Maturity; 3] = [Maturity::Foundation, Maturity::Core, Maturity::Recent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Maturity::Foundation => "foundation",
            Maturity::Core => "core",
            Maturity::Recent => "recent",
        }
    }
}

impl fmt::Display for Maturity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Maturity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "foundation" => Ok(Maturity::Foundation),
            "core" => Ok(Maturity::Core),
            "recent" => Ok(Maturity::Recent),
            _ => Err(AppError::InvalidCategory {
                category: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStatus {
    #[default]
    Unread,
    Read,
}

/// A paper filed in a topic bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPaper {
    #[serde(flatten)]
    pub paper: Paper,
    #[serde(default)]
    pub status: ReadStatus,
    /// Why the paper landed in its bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl StoredPaper {
    pub fn new(paper: Paper, reason: Option<String>) -> Self {
        Self {
            paper,
            status: ReadStatus::Unread,
            reason,
            added_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.paper.id
    }

    pub fn is_read(&self) -> bool {
        self.status == ReadStatus::Read
    }
}

/// Knowledge state plus the counters it is derived from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeProgress {
    pub state: KnowledgeState,
    #[serde(default)]
    pub foundation_papers_read: usize,
    #[serde(default)]
    pub core_papers_read: usize,
    #[serde(default)]
    pub recent_papers_read: usize,
    #[serde(default)]
    pub progress_percentage: f64,
}

/// One keyword search run on behalf of a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub searched_at: DateTime<Utc>,
    pub keyword: String,
    #[serde(default)]
    pub year_from: Option<i32>,
    #[serde(default)]
    pub year_to: Option<i32>,
    #[serde(default)]
    pub result_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnreadPapers {
    pub foundation: Vec<StoredPaper>,
    pub core: Vec<StoredPaper>,
    pub recent: Vec<StoredPaper>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Display name as first given
    pub topic_name: String,
    pub knowledge_state: KnowledgeProgress,
    #[serde(default)]
    pub foundation_papers: Vec<StoredPaper>,
    #[serde(default)]
    pub core_papers: Vec<StoredPaper>,
    #[serde(default)]
    pub recent_papers: Vec<StoredPaper>,
    /// Unread paper ids, foundation then core then recent
    #[serde(default)]
    pub reading_order: Vec<String>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub search_history: Vec<SearchRecord>,
}

/// Topic key: lower-cased, trimmed, inner whitespace runs collapsed to `_`.
pub fn normalize_topic_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

impl Topic {
    pub fn new(name: &str, state: KnowledgeState) -> Self {
        Self {
            topic_name: name.trim().to_string(),
            knowledge_state: KnowledgeProgress {
                state,
                ..KnowledgeProgress::default()
            },
            foundation_papers: Vec::new(),
            core_papers: Vec::new(),
            recent_papers: Vec::new(),
            reading_order: Vec::new(),
            last_updated: Utc::now(),
            search_history: Vec::new(),
        }
    }

    pub fn bucket(&self, maturity: Maturity) -> &[StoredPaper] {
        match maturity {
            Maturity::Foundation => &self.foundation_papers,
            Maturity::Core => &self.core_papers,
            Maturity::Recent => &self.recent_papers,
        }
    }

    fn bucket_mut(&mut self, maturity: Maturity) -> &mut Vec<StoredPaper> {
        match maturity {
            Maturity::Foundation => &mut self.foundation_papers,
            Maturity::Core => &mut self.core_papers,
            Maturity::Recent => &mut self.recent_papers,
        }
    }

    /// Bucket holding `paper_id`, if any
    pub fn locate(&self, paper_id: &str) -> Option<Maturity> {
        Maturity::ALL
            .into_iter()
            .find(|m| self.bucket(*m).iter().any(|p| p.id() == paper_id))
    }

    pub fn contains(&self, paper_id: &str) -> bool {
        self.locate(paper_id).is_some()
    }

    /// File a paper. Returns false, changing nothing, if the id is already present.
    pub fn insert(&mut self, paper: Paper, maturity: Maturity, reason: Option<String>) -> bool {
        if self.contains(&paper.id) {
            return false;
        }
        self.bucket_mut(maturity).push(StoredPaper::new(paper, reason));
        true
    }

    /// Mark a paper read. `None` if the topic does not hold it,
    /// `Some(false)` if it was already read.
    pub fn mark_read(&mut self, paper_id: &str) -> Option<bool> {
        let maturity = self.locate(paper_id)?;
        let paper = self.bucket_mut(maturity).iter_mut().find(|p| p.id() == paper_id)?;
        if paper.is_read() {
            return Some(false);
        }
        paper.status = ReadStatus::Read;
        Some(true)
    }

    pub fn papers(&self) -> impl Iterator<Item = &StoredPaper> {
        self.foundation_papers
            .iter()
            .chain(self.core_papers.iter())
            .chain(self.recent_papers.iter())
    }

    pub fn paper_ids(&self) -> impl Iterator<Item = &str> {
        self.papers().map(StoredPaper::id)
    }

    pub fn total_papers(&self) -> usize {
        self.foundation_papers.len() + self.core_papers.len() + self.recent_papers.len()
    }

    fn read_in(&self, maturity: Maturity) -> usize {
        self.bucket(maturity).iter().filter(|p| p.is_read()).count()
    }

    pub fn unread(&self) -> UnreadPapers {
        let unread = |m: Maturity| -> Vec<StoredPaper> {
            self.bucket(m).iter().filter(|p| !p.is_read()).cloned().collect()
        };
        UnreadPapers {
            foundation: unread(Maturity::Foundation),
            core: unread(Maturity::Core),
            recent: unread(Maturity::Recent),
        }
    }

    /// Recompute counters, progress, reading order and state after a mutation.
    pub fn refresh(&mut self, thresholds: &StateThresholds) {
        let foundation = self.read_in(Maturity::Foundation);
        let core = self.read_in(Maturity::Core);
        let recent = self.read_in(Maturity::Recent);
        let percentage = state::progress_percentage(foundation + core + recent, self.total_papers());

        let progress = &mut self.knowledge_state;
        progress.foundation_papers_read = foundation;
        progress.core_papers_read = core;
        progress.recent_papers_read = recent;
        progress.progress_percentage = percentage;

        let next = state::next_state(progress.state, percentage, thresholds);
        if next != progress.state {
            tracing::info!(
                topic = %self.topic_name,
                from = %progress.state,
                to = %next,
                progress = percentage,
                "Knowledge state advanced"
            );
            progress.state = next;
        }

        self.reading_order = self
            .papers()
            .filter(|p| !p.is_read())
            .map(|p| p.id().to_string())
            .collect();
        self.last_updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic_with(ids: &[(&str, Maturity)]) -> Topic {
        let mut topic = Topic::new("GNN Recommendation", KnowledgeState::Beginner);
        for (id, m) in ids {
            topic.insert(Paper::new(*id, *id), *m, None);
        }
        topic
    }

    #[test]
    fn test_normalize_topic_name() {
        assert_eq!(normalize_topic_name("  GNN   Recommendation\tSystems "), "gnn_recommendation_systems");
        assert_eq!(normalize_topic_name("gnn_recommendation"), "gnn_recommendation");
    }

    #[test]
    fn test_insert_is_unique_across_buckets() {
        let mut topic = topic_with(&[("a", Maturity::Core)]);
        assert!(!topic.insert(Paper::new("a", "a"), Maturity::Recent, None));
        assert!(!topic.insert(Paper::new("a", "a"), Maturity::Core, None));
        assert_eq!(topic.total_papers(), 1);
        assert_eq!(topic.locate("a"), Some(Maturity::Core));
    }

    #[test]
    fn test_mark_read_states() {
        let mut topic = topic_with(&[("a", Maturity::Core)]);
        assert_eq!(topic.mark_read("missing"), None);
        assert_eq!(topic.mark_read("a"), Some(true));
        assert_eq!(topic.mark_read("a"), Some(false));
    }

    #[test]
    fn test_refresh_progress_and_reading_order() {
        let mut topic = topic_with(&[
            ("r1", Maturity::Recent),
            ("c1", Maturity::Core),
            ("f1", Maturity::Foundation),
            ("f2", Maturity::Foundation),
        ]);
        topic.mark_read("f1");
        topic.refresh(&StateThresholds::default());

        assert_eq!(topic.knowledge_state.foundation_papers_read, 1);
        assert_eq!(topic.knowledge_state.progress_percentage, 25.0);
        assert_eq!(topic.reading_order, vec!["f2", "c1", "r1"]);
        assert_eq!(topic.unread().foundation.len(), 1);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Foundation".parse::<Maturity>().unwrap(), Maturity::Foundation);
        assert!(matches!("classic".parse::<Maturity>(), Err(AppError::InvalidCategory { .. })));
        assert_eq!("experienced".parse::<KnowledgeState>().unwrap(), KnowledgeState::Experienced);
    }

    #[test]
    fn test_stored_paper_json_shape() {
        let mut paper = Paper::new("abc", "Title");
        paper.year = Some(2020);
        let stored = StoredPaper::new(paper, None);
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["status"], "unread");
        assert!(json.get("reason").is_none());

        let back: StoredPaper = serde_json::from_value(json).unwrap();
        assert_eq!(back, stored);
    }
}

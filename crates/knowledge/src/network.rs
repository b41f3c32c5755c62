//! Citation network expansion
//!
//! Expands a seed paper one hop in each requested direction and produces a
//! deduplicated working set, excluding papers the topic already holds.

use crate::store::KnowledgeStore;
use paperhound_common::errors::{AppError, Result};
use paperhound_common::scholar::MAX_CITATION_LIMIT;
use paperhound_common::{CitationDirection, CitationEdge, Paper, PaperSource};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

fn default_max_links() -> usize {
    20
}

fn default_true() -> bool {
    true
}

/// Expansion parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub seed_id: String,
    /// Topic whose known papers are excluded from the working set
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default = "default_max_links")]
    pub max_references: usize,
    #[serde(default = "default_max_links")]
    pub max_citations: usize,
    #[serde(default = "default_true")]
    pub include_references: bool,
    #[serde(default = "default_true")]
    pub include_citations: bool,
}

impl NetworkRequest {
    pub fn new(seed_id: impl Into<String>) -> Self {
        Self {
            seed_id: seed_id.into(),
            topic: None,
            max_references: default_max_links(),
            max_citations: default_max_links(),
            include_references: true,
            include_citations: true,
        }
    }

    pub fn for_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn caps(mut self, max_references: usize, max_citations: usize) -> Self {
        self.max_references = max_references;
        self.max_citations = max_citations;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CitationNetwork {
    pub seed: Paper,
    /// Papers the seed cites
    pub references: Vec<Paper>,
    /// Papers citing the seed
    pub citations: Vec<Paper>,
    pub edges: Vec<CitationEdge>,
    /// Seed plus neighbours, unique by id, minus papers already known to the topic
    pub working_set: Vec<Paper>,
    /// Ids dropped from the working set because the topic already holds them
    pub excluded_known: Vec<String>,
}

impl CitationNetwork {
    pub fn total_references(&self) -> usize {
        self.references.len()
    }

    pub fn total_citations(&self) -> usize {
        self.citations.len()
    }
}

pub struct CitationNetworkBuilder {
    source: Arc<dyn PaperSource>,
    store: Option<Arc<KnowledgeStore>>,
}

impl CitationNetworkBuilder {
    pub fn new(source: Arc<dyn PaperSource>) -> Self {
        Self { source, store: None }
    }

    pub fn with_store(mut self, store: Arc<KnowledgeStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[tracing::instrument(skip(self, request), fields(seed = %request.seed_id))]
    pub async fn build(&self, request: &NetworkRequest) -> Result<CitationNetwork> {
        let seed = self
            .source
            .get_paper(&request.seed_id)
            .await?
            .ok_or_else(|| AppError::PaperNotFound {
                id: request.seed_id.clone(),
            })?;

        let (references, citations) = tokio::join!(
            self.neighbours(&seed.id, CitationDirection::Reference, request.include_references, request.max_references),
            self.neighbours(&seed.id, CitationDirection::Citation, request.include_citations, request.max_citations),
        );
        let references = dedup_neighbours(&seed.id, references?);
        let citations = dedup_neighbours(&seed.id, citations?);

        let edges: Vec<CitationEdge> = references
            .iter()
            .map(|p| (p, CitationDirection::Reference))
            .chain(citations.iter().map(|p| (p, CitationDirection::Citation)))
            .filter_map(|(p, direction)| CitationEdge::new(&seed.id, &p.id, direction))
            .collect();

        let known = match (&self.store, &request.topic) {
            (Some(store), Some(topic)) => store.known_paper_ids(topic).await,
            _ => HashSet::new(),
        };

        let mut seen = HashSet::new();
        let mut working_set = Vec::new();
        let mut excluded_known = Vec::new();
        for paper in std::iter::once(&seed).chain(references.iter()).chain(citations.iter()) {
            if !seen.insert(paper.id.clone()) {
                continue;
            }
            if known.contains(&paper.id) {
                excluded_known.push(paper.id.clone());
            } else {
                working_set.push(paper.clone());
            }
        }

        tracing::info!(
            references = references.len(),
            citations = citations.len(),
            working_set = working_set.len(),
            excluded = excluded_known.len(),
            "Citation network built"
        );

        Ok(CitationNetwork {
            seed,
            references,
            citations,
            edges,
            working_set,
            excluded_known,
        })
    }

    async fn neighbours(
        &self,
        seed_id: &str,
        direction: CitationDirection,
        include: bool,
        max_count: usize,
    ) -> Result<Vec<Paper>> {
        if !include || max_count == 0 {
            return Ok(Vec::new());
        }
        let max_count = max_count.min(MAX_CITATION_LIMIT);
        let mut papers = self.source.get_citations(seed_id, direction, max_count).await?;
        papers.truncate(max_count);
        Ok(papers)
    }
}

/// Drop the seed itself and repeated ids, keeping first occurrences.
fn dedup_neighbours(seed_id: &str, papers: Vec<Paper>) -> Vec<Paper> {
    let mut seen = HashSet::new();
    papers
        .into_iter()
        .filter(|p| p.id != seed_id && seen.insert(p.id.clone()))
        .collect()
}

/// Most-cited paper of a result set; the earliest one wins ties.
pub fn pick_seed(papers: &[Paper]) -> Option<&Paper> {
    papers.iter().reduce(|best, p| if p.citations > best.citations { p } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassificationRules;
    use crate::state::StateThresholds;
    use crate::topic::Maturity;
    use async_trait::async_trait;
    use paperhound_common::scholar::MockPaperSource;
    use paperhound_common::SearchQuery;
    use std::sync::Mutex;

    /// Remembers the page size of every links request
    #[derive(Default)]
    struct RecordingSource {
        limits: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl PaperSource for RecordingSource {
        async fn search(&self, _query: &SearchQuery) -> Result<Vec<Paper>> {
            Ok(Vec::new())
        }

        async fn get_paper(&self, id: &str) -> Result<Option<Paper>> {
            Ok(Some(paper(id, 1)))
        }

        async fn get_citations(
            &self,
            _id: &str,
            _direction: CitationDirection,
            max_count: usize,
        ) -> Result<Vec<Paper>> {
            self.limits.lock().unwrap().push(max_count);
            Ok(Vec::new())
        }
    }

    fn paper(id: &str, citations: u64) -> Paper {
        let mut p = Paper::new(id, format!("Paper {}", id));
        p.citations = citations;
        p.year = Some(2020);
        p
    }

    fn source() -> Arc<MockPaperSource> {
        let source = Arc::new(MockPaperSource::new());
        source.add_paper(paper("seed", 1000));
        source.set_links(
            "seed",
            CitationDirection::Reference,
            vec![paper("r1", 50), paper("r2", 40), paper("seed", 1000), paper("r1", 50)],
        );
        source.set_links(
            "seed",
            CitationDirection::Citation,
            vec![paper("c1", 5), paper("r2", 40), paper("c2", 1)],
        );
        source
    }

    #[tokio::test]
    async fn test_network_dedup_and_self_edges() {
        let builder = CitationNetworkBuilder::new(source());
        let network = builder.build(&NetworkRequest::new("seed")).await.unwrap();

        let ids = |papers: &[Paper]| papers.iter().map(|p| p.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&network.references), vec!["r1", "r2"]);
        assert_eq!(ids(&network.citations), vec!["c1", "r2", "c2"]);
        assert_eq!(network.total_references(), 2);
        assert!(network.edges.iter().all(|e| e.related_id != "seed"));
        assert_eq!(network.edges.len(), 5);
        assert_eq!(ids(&network.working_set), vec!["seed", "r1", "r2", "c1", "c2"]);
        assert!(network.excluded_known.is_empty());
    }

    #[tokio::test]
    async fn test_caps_and_direction_flags() {
        let builder = CitationNetworkBuilder::new(source());

        let request = NetworkRequest::new("seed").caps(1, 2);
        let network = builder.build(&request).await.unwrap();
        assert_eq!(network.references.len(), 1);
        assert_eq!(network.citations.len(), 2);

        let mut request = NetworkRequest::new("seed");
        request.include_citations = false;
        let network = builder.build(&request).await.unwrap();
        assert!(network.citations.is_empty());
        assert_eq!(network.references.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_seed() {
        let builder = CitationNetworkBuilder::new(source());
        let err = builder.build(&NetworkRequest::new("ghost")).await.unwrap_err();
        assert!(matches!(err, AppError::PaperNotFound { .. }));
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let source = source();
        source.set_unavailable(true);
        let builder = CitationNetworkBuilder::new(source);
        let err = builder.build(&NetworkRequest::new("seed")).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_known_papers_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            KnowledgeStore::open(
                dir.path().join("knowledge.json"),
                StateThresholds::default(),
                ClassificationRules::default(),
            )
            .await
            .unwrap(),
        );
        store
            .add_papers("gnn", vec![paper("seed", 1000), paper("c1", 5)], Maturity::Core)
            .await
            .unwrap();

        let builder = CitationNetworkBuilder::new(source()).with_store(store);
        let network = builder
            .build(&NetworkRequest::new("seed").for_topic("GNN"))
            .await
            .unwrap();

        let working: Vec<_> = network.working_set.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(working, vec!["r1", "r2", "c2"]);
        assert_eq!(network.excluded_known, vec!["seed", "c1"]);
        assert_eq!(network.seed.id, "seed");
    }

    #[test]
    fn test_pick_seed() {
        let papers = vec![paper("a", 10), paper("b", 30), paper("c", 30)];
        assert_eq!(pick_seed(&papers).map(|p| p.id.as_str()), Some("b"));
        assert!(pick_seed(&[]).is_none());
    }

    #[tokio::test]
    async fn test_oversized_caps_are_clamped() {
        let source = Arc::new(RecordingSource::default());
        let builder = CitationNetworkBuilder::new(source.clone());
        builder
            .build(&NetworkRequest::new("s").caps(50_000, 1_000_000))
            .await
            .unwrap();

        let mut limits = source.limits.lock().unwrap().clone();
        limits.sort_unstable();
        assert_eq!(limits, vec![MAX_CITATION_LIMIT, MAX_CITATION_LIMIT]);
    }
}

//! Search handlers

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use super::{lookup_paper, papers::FindPdfResponse};
use crate::AppState;
use paperhound_common::{
    errors::{AppError, Result},
    CitationEdge, Paper, SearchQuery,
};
use paperhound_knowledge::{pick_seed, topic::SearchRecord, CitationNetworkBuilder, NetworkRequest};

/// Search request
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(flatten)]
    pub query: SearchQuery,

    /// Record this search in the topic's history
    #[serde(default)]
    pub topic_name: Option<String>,
}

/// Search response
#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_range: Option<String>,
    pub total_results: usize,
    pub papers: Vec<Paper>,
    pub processing_time_ms: u64,
}

/// Citation network request. The seed is `paper_id`, or else the most-cited hit for `keyword`.
#[derive(Debug, Deserialize, Validate)]
pub struct CitationNetworkRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 256))]
    pub paper_id: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 500))]
    pub keyword: Option<String>,
    #[serde(default)]
    pub topic_name: Option<String>,
    #[serde(default)]
    #[validate(range(max = 1000))]
    pub max_references: Option<usize>,
    #[serde(default)]
    #[validate(range(max = 1000))]
    pub max_citations: Option<usize>,
    #[serde(default = "default_true")]
    pub include_references: bool,
    #[serde(default = "default_true")]
    pub include_citations: bool,
    /// Run the PDF waterfall over the working set
    #[serde(default)]
    pub resolve_pdfs: bool,
}

fn default_true() -> bool { true }

/// Citation network response
#[derive(Serialize)]
pub struct CitationNetworkResponse {
    pub seed_paper: Paper,
    pub references: Vec<Paper>,
    pub citations: Vec<Paper>,
    pub total_references: usize,
    pub total_citations: usize,
    pub edges: Vec<CitationEdge>,
    pub working_set: Vec<Paper>,
    pub excluded_known: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdfs: Option<Vec<FindPdfResponse>>,
}

fn year_range(query: &SearchQuery) -> Option<String> {
    match (query.year_from, query.year_to) {
        (None, None) => None,
        (from, to) => Some(format!(
            "{}-{}",
            from.map_or_else(String::new, |y| y.to_string()),
            to.map_or_else(String::new, |y| y.to_string())
        )),
    }
}

/// Keyword search, sorted by citation count
pub async fn search_papers(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();
    let query = request.query;
    query.validate()?;

    tracing::info!(
        keyword = %query.keyword,
        year_from = ?query.year_from,
        year_to = ?query.year_to,
        limit = query.limit,
        "Paper search"
    );

    let papers = state.scholar.search(&query).await?;
    let elapsed = start.elapsed();

    if let Some(topic) = request.topic_name.as_deref() {
        state
            .knowledge
            .add_search_history(
                topic,
                SearchRecord {
                    searched_at: Utc::now(),
                    keyword: query.keyword.clone(),
                    year_from: query.year_from,
                    year_to: query.year_to,
                    result_count: papers.len(),
                },
            )
            .await?;
    }

    Ok(Json(SearchResponse {
        year_range: year_range(&query),
        query: query.keyword,
        total_results: papers.len(),
        papers,
        processing_time_ms: elapsed.as_millis() as u64,
    }))
}

/// Paper detail
pub async fn get_paper(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<Paper>> {
    Ok(Json(lookup_paper(&state, &paper_id).await?))
}

/// Seed id for a network request: the explicit id, or the most-cited search hit.
async fn resolve_seed_id(state: &AppState, request: &CitationNetworkRequest) -> Result<String> {
    if let Some(paper_id) = &request.paper_id {
        return Ok(paper_id.clone());
    }
    let Some(keyword) = &request.keyword else {
        return Err(AppError::Validation {
            message: "Either paper_id or keyword is required".to_string(),
            field: Some("paper_id".to_string()),
        });
    };

    let papers = state.scholar.search(&SearchQuery::new(keyword.clone())).await?;
    let seed = pick_seed(&papers).ok_or_else(|| AppError::PaperNotFound { id: keyword.clone() })?;
    tracing::info!(keyword = %keyword, seed = %seed.id, "Picked citation network seed");
    Ok(seed.id.clone())
}

/// One-hop citation network around a seed paper
pub async fn citation_network(
    State(state): State<AppState>,
    Json(request): Json<CitationNetworkRequest>,
) -> Result<Json<CitationNetworkResponse>> {
    request.validate()?;
    let seed_id = resolve_seed_id(&state, &request).await?;

    let defaults = &state.config.citation;
    let mut network_request = NetworkRequest::new(seed_id).caps(
        request.max_references.unwrap_or(defaults.max_references),
        request.max_citations.unwrap_or(defaults.max_citations),
    );
    network_request.include_references = request.include_references;
    network_request.include_citations = request.include_citations;
    if let Some(topic) = request.topic_name {
        network_request = network_request.for_topic(topic);
    }

    let builder = CitationNetworkBuilder::new(state.scholar.clone()).with_store(state.knowledge.clone());
    let network = builder.build(&network_request).await?;

    let pdfs = if request.resolve_pdfs {
        let concurrency = state.config.server.max_concurrent_resolutions.min(network.working_set.len());
        let _permits = state.resolution_permits_for(concurrency).await?;
        let records = state.resolver.resolve_many(&network.working_set, concurrency).await;
        let records = records
            .into_iter()
            .map(|record| record.map(FindPdfResponse::from).map_err(AppError::from))
            .collect::<Result<Vec<_>>>()?;
        Some(records)
    } else {
        None
    };

    Ok(Json(CitationNetworkResponse {
        total_references: network.total_references(),
        total_citations: network.total_citations(),
        seed_paper: network.seed,
        references: network.references,
        citations: network.citations,
        edges: network.edges,
        working_set: network.working_set,
        excluded_known: network.excluded_known,
        pdfs,
    }))
}

//! Knowledge handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use paperhound_common::{
    errors::{AppError, Result},
    Paper,
};
use paperhound_knowledge::{
    topic::{KnowledgeProgress, UnreadPapers},
    KnowledgeState, Maturity, Topic,
};

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    pub topic_name: String,
    #[serde(default)]
    pub knowledge_state: Option<KnowledgeState>,
}

#[derive(Debug, Deserialize)]
pub struct AddPapersRequest {
    pub topic_name: String,
    pub papers: Vec<Paper>,
    /// foundation, core or recent
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String { "recent".to_string() }

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub topic_name: String,
    pub paper_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub topic_name: String,
    pub paper: Paper,
}

#[derive(Serialize)]
pub struct TopicListResponse {
    pub total: usize,
    pub topics: Vec<Topic>,
}

#[derive(Serialize)]
pub struct UnreadResponse {
    pub topic_name: String,
    pub total_unread: usize,
    pub unread: UnreadPapers,
}

#[derive(Serialize)]
pub struct AddPapersResponse {
    pub message: String,
    pub category: Maturity,
    pub added: Vec<String>,
    pub skipped: Vec<String>,
    pub topic: Topic,
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub message: String,
    pub paper_id: String,
    pub knowledge_state: KnowledgeProgress,
    pub topic: Topic,
}

#[derive(Serialize)]
pub struct ClassifyResponse {
    pub message: String,
    pub paper_id: String,
    pub category: Maturity,
    pub reason: String,
    pub added: bool,
    pub topic: Topic,
}

pub async fn list_topics(State(state): State<AppState>) -> Json<TopicListResponse> {
    let topics = state.knowledge.list_topics().await;
    Json(TopicListResponse {
        total: topics.len(),
        topics,
    })
}

/// Create a topic; an existing topic is returned unchanged
pub async fn create_topic(
    State(state): State<AppState>,
    Json(request): Json<CreateTopicRequest>,
) -> Result<Json<Topic>> {
    let topic = state
        .knowledge
        .create_topic(&request.topic_name, request.knowledge_state)
        .await?;
    Ok(Json(topic))
}

pub async fn get_topic(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Topic>> {
    let topic = state.knowledge.get_topic(&name).await;
    topic.map(Json).ok_or(AppError::TopicNotFound { name })
}

/// Unread papers per bucket; empty for an unknown topic
pub async fn unread_papers(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<UnreadResponse> {
    let unread = state.knowledge.unread_papers(&name).await;
    Json(UnreadResponse {
        total_unread: unread.foundation.len() + unread.core.len() + unread.recent.len(),
        topic_name: name,
        unread,
    })
}

/// File papers under an explicit bucket. Duplicates are skipped.
pub async fn add_papers(
    State(state): State<AppState>,
    Json(request): Json<AddPapersRequest>,
) -> Result<Json<AddPapersResponse>> {
    let maturity: Maturity = request.category.parse()?;
    let outcome = state
        .knowledge
        .add_papers(&request.topic_name, request.papers, maturity)
        .await?;

    Ok(Json(AddPapersResponse {
        message: format!(
            "{} papers added to {}, {} already present",
            outcome.added.len(),
            maturity,
            outcome.skipped.len()
        ),
        category: maturity,
        added: outcome.added,
        skipped: outcome.skipped,
        topic: outcome.topic,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Json(request): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>> {
    let topic = state
        .knowledge
        .mark_read(&request.topic_name, &request.paper_id)
        .await?;

    Ok(Json(MarkReadResponse {
        message: format!("Paper {} marked as read", request.paper_id),
        paper_id: request.paper_id,
        knowledge_state: topic.knowledge_state.clone(),
        topic,
    }))
}

/// Classify one paper by year and citations, then file it
pub async fn classify_and_add(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>> {
    let outcome = state
        .knowledge
        .classify_and_add(&request.topic_name, request.paper)
        .await?;

    let message = if outcome.added {
        format!("Paper classified as {} and added", outcome.maturity)
    } else {
        format!("Paper already filed as {}", outcome.maturity)
    };

    Ok(Json(ClassifyResponse {
        message,
        paper_id: outcome.paper_id,
        category: outcome.maturity,
        reason: outcome.reason,
        added: outcome.added,
        topic: outcome.topic,
    }))
}

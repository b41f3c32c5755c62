//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use std::path::Path;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub has_api_key: bool,
    pub analysis_enabled: bool,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub pdf_storage: CheckResult,
    pub summary_storage: CheckResult,
    pub knowledge_store: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn up() -> Self {
        Self { status: "up".to_string(), error: None }
    }

    fn down(error: String) -> Self {
        Self { status: "down".to_string(), error: Some(error) }
    }

    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: paperhound_common::VERSION.to_string(),
        has_api_key: state.scholar_api_key,
        analysis_enabled: state.analyzer.is_some(),
    })
}

/// Readiness probe - storage directories must be creatable and the knowledge file present
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let pdf_storage = check_dir(state.resolver.cache().dir()).await;
    let summary_storage = check_dir(state.summaries.dir()).await;
    let knowledge_store = match tokio::fs::metadata(state.knowledge.path()).await {
        Ok(_) => CheckResult::up(),
        Err(e) => CheckResult::down(e.to_string()),
    };

    let all_healthy = pdf_storage.is_up() && summary_storage.is_up() && knowledge_store.is_up();

    Json(ReadyResponse {
        status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks {
            pdf_storage,
            summary_storage,
            knowledge_store,
        },
    })
}

async fn check_dir(dir: &Path) -> CheckResult {
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => CheckResult::up(),
        Err(e) => CheckResult::down(e.to_string()),
    }
}

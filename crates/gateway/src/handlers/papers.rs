//! Paper handlers: PDF resolution, text extraction, analysis and summaries

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::lookup_paper;
use crate::AppState;
use paperhound_common::{
    analysis::{analyze_bounded, AnalysisPayload, SummaryRecord},
    errors::{AppError, Result},
};
use paperhound_resolver::{ExtractedText, PdfResolutionRecord, PdfSource, ProviderName};

/// PDF lookup response
#[derive(Serialize)]
pub struct FindPdfResponse {
    pub paper_id: String,
    pub pdf_found: bool,
    pub pdf_url: Option<String>,
    pub source: Option<PdfSource>,
    pub local_path: Option<String>,
    pub attempted_sources: Vec<ProviderName>,
}

impl From<PdfResolutionRecord> for FindPdfResponse {
    fn from(record: PdfResolutionRecord) -> Self {
        Self {
            paper_id: record.paper_id,
            pdf_found: record.found,
            pdf_url: record.pdf_url,
            source: record.source,
            local_path: record.local_path.map(|p| p.display().to_string()),
            attempted_sources: record.attempted_sources,
        }
    }
}

/// Externally produced summary
#[derive(Debug, Deserialize, Validate)]
pub struct SaveSummaryRequest {
    #[validate(length(min = 1, max = 256))]
    pub paper_id: String,
    pub summary: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct SaveSummaryResponse {
    pub message: String,
    pub paper_id: String,
    pub summary_path: String,
    pub summary_length: usize,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub paper_id: String,
    pub analyzer: String,
    pub text_length: usize,
    pub analyzed_chars: usize,
    pub summary_path: String,
    pub analysis: AnalysisPayload,
}

/// Full waterfall: cache, then every provider in priority order
pub async fn find_pdf(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<FindPdfResponse>> {
    let paper = lookup_paper(&state, &paper_id).await?;
    let _permit = state.resolution_permit().await?;
    let record = state.resolver.resolve(&paper).await?;
    Ok(Json(record.into()))
}

/// Single provider step. A miss is a normal `pdf_found: false` response.
pub async fn try_provider(
    State(state): State<AppState>,
    Path((paper_id, provider)): Path<(String, String)>,
) -> Result<Json<FindPdfResponse>> {
    let provider: ProviderName = provider.parse()?;
    let paper = lookup_paper(&state, &paper_id).await?;
    let _permit = state.resolution_permit().await?;
    let record = state.resolver.resolve_with(&paper, provider).await?;
    Ok(Json(record.into()))
}

/// Resolve if needed, then extract the full text
pub async fn pdf_text(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<ExtractedText>> {
    let paper = lookup_paper(&state, &paper_id).await?;
    let _permit = state.resolution_permit().await?;
    Ok(Json(state.resolver.extract_text(&paper).await?))
}

/// Extract, bound and analyze the text, then store the result
pub async fn analyze(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<AnalyzeResponse>> {
    let analyzer = state.analyzer.clone().ok_or_else(|| AppError::Configuration {
        message: "No text analyzer configured (set analysis.endpoint)".to_string(),
    })?;

    let paper = lookup_paper(&state, &paper_id).await?;
    let extracted = {
        let _permit = state.resolution_permit().await?;
        state.resolver.extract_text(&paper).await?
    };

    let limits = &state.config.analysis;
    let analysis = analyze_bounded(
        analyzer.as_ref(),
        &paper,
        &extracted.text,
        limits.max_chars,
        limits.max_retries,
    )
    .await?;

    let metadata = serde_json::json!({
        "title": paper.title,
        "source": extracted.source,
        "text_length": extracted.text_length,
        "analyzer": analyzer.name(),
    });
    let record = SummaryRecord::from_analysis(&paper.id, analysis.clone(), Some(metadata));
    let path = state.summaries.save(&record).await?;

    tracing::info!(
        paper_id = %paper.id,
        analyzer = analyzer.name(),
        text_length = extracted.text_length,
        "Paper analyzed"
    );

    Ok(Json(AnalyzeResponse {
        paper_id: paper.id,
        analyzer: analyzer.name().to_string(),
        text_length: extracted.text_length,
        analyzed_chars: extracted.text_length.min(limits.max_chars),
        summary_path: path.display().to_string(),
        analysis,
    }))
}

/// Store a summary produced outside the service
pub async fn save_summary(
    State(state): State<AppState>,
    Json(request): Json<SaveSummaryRequest>,
) -> Result<Json<SaveSummaryResponse>> {
    request.validate()?;

    let record = SummaryRecord::new(&request.paper_id, request.summary, request.metadata);
    let path = state.summaries.save(&record).await?;

    Ok(Json(SaveSummaryResponse {
        message: "Summary saved".to_string(),
        paper_id: record.paper_id,
        summary_path: path.display().to_string(),
        summary_length: record.summary_length,
    }))
}

pub async fn get_summary(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<SummaryRecord>> {
    Ok(Json(state.summaries.get(&paper_id).await?))
}

//! API handlers module

pub mod health;
pub mod knowledge;
pub mod papers;
pub mod search;

use crate::AppState;
use paperhound_common::errors::{AppError, Result};
use paperhound_common::Paper;

/// Fetch paper metadata from the paper source, 404 when unknown.
pub(crate) async fn lookup_paper(state: &AppState, paper_id: &str) -> Result<Paper> {
    state
        .scholar
        .get_paper(paper_id)
        .await?
        .ok_or_else(|| AppError::PaperNotFound {
            id: paper_id.to_string(),
        })
}

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{Candidate, Recommendation},
    services::assembler::assemble,
    state::AppState,
};

fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct TrackSearchParams {
    /// Track name to search for
    pub q: String,
    /// Optional artist to narrow the results
    pub artist: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Free-text track search against the catalog.
pub async fn tracks(
    State(state): State<AppState>,
    Query(params): Query<TrackSearchParams>,
) -> AppResult<Json<Vec<Recommendation>>> {
    if params.q.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Search query cannot be empty".to_string(),
        ));
    }
    if params.limit == 0 || params.limit > 50 {
        return Err(AppError::InvalidInput(
            "limit must be between 1 and 50".to_string(),
        ));
    }

    let hits = state
        .catalog
        .search_tracks(&params.q, params.artist.as_deref(), params.limit as u32)
        .await?;

    let reason = format!("Match for {}", params.q);
    let candidates: Vec<Candidate> = hits
        .iter()
        .filter_map(|hit| Candidate::from_track(hit, &reason))
        .collect();

    Ok(Json(assemble(candidates, params.limit)))
}

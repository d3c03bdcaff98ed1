use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Candidate, Recommendation},
    services::{assembler::assemble, discover, personal},
    state::AppState,
};

const MAX_LIMIT: usize = 50;

fn default_personal_limit() -> usize {
    20
}

fn default_discover_limit() -> usize {
    30
}

fn default_similar_limit() -> usize {
    10
}

fn validate_limit(limit: usize) -> AppResult<usize> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    Ok(limit)
}

#[derive(Debug, Deserialize)]
pub struct PersonalParams {
    pub user_id: Uuid,
    #[serde(default = "default_personal_limit")]
    pub limit: usize,
}

/// Recommendations personalized to the user's listening history.
pub async fn personal(
    State(state): State<AppState>,
    Query(params): Query<PersonalParams>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let limit = validate_limit(params.limit)?;
    let recommendations = personal::get_personal_recommendations(
        state.events.as_ref(),
        state.catalog.as_ref(),
        params.user_id,
        limit,
    )
    .await;
    Ok(Json(recommendations))
}

#[derive(Debug, Deserialize)]
pub struct DiscoverParams {
    pub user_id: Option<Uuid>,
    #[serde(default = "default_discover_limit")]
    pub limit: usize,
}

/// Discover feed; anonymous callers get chart-only results.
pub async fn discover(
    State(state): State<AppState>,
    Query(params): Query<DiscoverParams>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let limit = validate_limit(params.limit)?;
    let recommendations = discover::get_discover_recommendations(
        state.events.as_ref(),
        state.catalog.as_ref(),
        params.user_id,
        limit,
    )
    .await;
    Ok(Json(recommendations))
}

#[derive(Debug, Deserialize)]
pub struct TrackParams {
    pub track: String,
    pub artist: String,
    #[serde(default = "default_similar_limit")]
    pub limit: usize,
}

/// Similar tracks for one specific track. Unlike the personalized paths,
/// a catalog failure here surfaces to the caller.
pub async fn for_track(
    State(state): State<AppState>,
    Query(params): Query<TrackParams>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let limit = validate_limit(params.limit)?;

    let hits = state
        .catalog
        .similar_tracks(&params.track, &params.artist, limit as u32)
        .await?;

    let reason = format!("Similar to {} by {}", params.track, params.artist);
    let candidates: Vec<Candidate> = hits
        .iter()
        .filter_map(|hit| Candidate::from_track(hit, &reason))
        .collect();

    Ok(Json(assemble(candidates, limit)))
}

#[derive(Debug, Deserialize)]
pub struct ArtistParams {
    pub artist: String,
    #[serde(default = "default_similar_limit")]
    pub limit: usize,
}

/// Similar artists for one specific artist.
pub async fn for_artist(
    State(state): State<AppState>,
    Query(params): Query<ArtistParams>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let limit = validate_limit(params.limit)?;

    let hits = state
        .catalog
        .similar_artists(&params.artist, limit as u32)
        .await?;

    let reason = format!("Similar to {}", params.artist);
    let candidates: Vec<Candidate> = hits
        .iter()
        .filter_map(|hit| Candidate::artist_placeholder(hit, &reason))
        .collect();

    Ok(Json(assemble(candidates, limit)))
}

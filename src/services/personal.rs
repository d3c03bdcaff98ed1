/// Personal recommendations
///
/// Seed from the user's listening history, gather candidates from the
/// catalog service, rerank by the personal model, assemble the response.
use std::collections::HashSet;

use uuid::Uuid;

use crate::db::EventStore;
use crate::models::{Candidate, Recommendation};
use crate::services::assembler::assemble;
use crate::services::catalog::CatalogService;
use crate::services::profile::{build_profile, UserProfile};

const SEED_TRACKS: usize = 5;
const SEED_ARTISTS: usize = 5;
const CANDIDATES_PER_SEED: u32 = 10;

/// Gather candidates seeded by the profile's top tracks and top artists.
///
/// Output order is seed iteration order, deduplicated by id with the first
/// hit's reason retained. A failed seed contributes nothing; gathering
/// never aborts because one lookup failed.
async fn gather_candidates(
    catalog: &dyn CatalogService,
    profile: &UserProfile,
    limit_per_seed: u32,
) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates: Vec<Candidate> = Vec::new();

    for (track, artist, _) in profile.top_tracks.iter().take(SEED_TRACKS) {
        match catalog.similar_tracks(track, artist, limit_per_seed).await {
            Ok(hits) => {
                let reason = format!("Similar to {}", track);
                for hit in &hits {
                    if let Some(candidate) = Candidate::from_track(hit, &reason) {
                        if seen.insert(candidate.id.clone()) {
                            candidates.push(candidate);
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    track = %track,
                    artist = %artist,
                    error = %e,
                    "Similar-tracks lookup failed, skipping seed"
                );
            }
        }
    }

    for (artist, _) in profile.top_artists.iter().take(SEED_ARTISTS) {
        match catalog.similar_artists(artist, limit_per_seed).await {
            Ok(hits) => {
                let reason = format!("Similar to {}", artist);
                for hit in &hits {
                    if let Some(candidate) = Candidate::artist_placeholder(hit, &reason) {
                        if seen.insert(candidate.id.clone()) {
                            candidates.push(candidate);
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    artist = %artist,
                    error = %e,
                    "Similar-artists lookup failed, skipping seed"
                );
            }
        }
    }

    candidates
}

/// Blend of personal affinity and external relevance for one candidate.
///
/// The logged penalty discourages resurfacing tracks the user already has
/// without excluding them outright; the external term is capped at 0.3 so
/// personal signal always dominates external popularity.
fn score_candidate(candidate: &Candidate, profile: &UserProfile) -> f64 {
    let mut score = profile.artist_affinity(&candidate.artist);
    if profile.is_liked_artist(&candidate.artist) {
        score += 0.5;
    }
    if profile.is_logged(&candidate.id) {
        score -= 1.0;
    }
    let external = (candidate.match_score.unwrap_or(0.0) / 100.0).clamp(0.0, 1.0);
    score + 0.3 * external
}

/// Sort candidates by personal-model score, descending. The sort is stable,
/// so equal scores keep their gather order.
fn rerank(candidates: Vec<Candidate>, profile: &UserProfile) -> Vec<Candidate> {
    let mut scored: Vec<(f64, Candidate)> = candidates
        .into_iter()
        .map(|candidate| (score_candidate(&candidate, profile), candidate))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, candidate)| candidate).collect()
}

/// Recommendations personalized to one user: build the profile from
/// listening history, gather candidates similar to their top tracks and
/// artists, rerank by the personal model.
///
/// Degrades to an empty list when the user has no profile or every seed
/// fails; never errors.
pub async fn get_personal_recommendations(
    events: &dyn EventStore,
    catalog: &dyn CatalogService,
    user_id: Uuid,
    limit: usize,
) -> Vec<Recommendation> {
    let Some(profile) = build_profile(events, user_id).await else {
        return Vec::new();
    };

    let candidates = gather_candidates(catalog, &profile, CANDIDATES_PER_SEED).await;
    if candidates.is_empty() {
        tracing::debug!(user_id = %user_id, "No candidates gathered");
        return Vec::new();
    }

    let ranked = rerank(candidates, &profile);
    assemble(ranked, limit)
}

/// Discover recommendations
///
/// Blend of profile-seeded candidates (similar artists, tag charts, related
/// tags) with the global weekly charts as a baseline. Works with or without
/// a user: no profile means chart-only results, never an error.
use std::cmp;
use std::collections::HashSet;

use uuid::Uuid;

use crate::db::EventStore;
use crate::models::{normalize_name, Candidate, Recommendation};
use crate::services::assembler::assemble;
use crate::services::catalog::CatalogService;
use crate::services::profile::build_profile;

const SEED_ARTISTS: usize = 5;
const SEED_TAGS: usize = 5;
const SIMILAR_TAG_POOL: u32 = 5;
const RELATED_TAGS: usize = 3;
const RELATED_TAG_TRACKS: u32 = 3;

fn push_unique(seen: &mut HashSet<String>, out: &mut Vec<Candidate>, candidate: Option<Candidate>) {
    if let Some(candidate) = candidate {
        if seen.insert(candidate.id.clone()) {
            out.push(candidate);
        }
    }
}

/// Candidates seeded by the user's profile: similar artists for their top
/// artists, then per-tag top artists/tracks/albums plus a one-level
/// expansion into related tags. Every lookup fails on its own.
async fn gather_from_profile(
    events: &dyn EventStore,
    catalog: &dyn CatalogService,
    user_id: Uuid,
    limit_per_seed: u32,
) -> Vec<Candidate> {
    let Some(profile) = build_profile(events, user_id).await else {
        return Vec::new();
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<Candidate> = Vec::new();

    for (artist, _) in profile.top_artists.iter().take(SEED_ARTISTS) {
        match catalog.similar_artists(artist, limit_per_seed).await {
            Ok(hits) => {
                let reason = format!("Similar to {}", artist);
                for hit in &hits {
                    push_unique(
                        &mut seen,
                        &mut out,
                        Candidate::artist_placeholder(hit, &reason),
                    );
                }
            }
            Err(e) => {
                tracing::warn!(artist = %artist, error = %e, "Similar-artists lookup failed, skipping seed");
            }
        }
    }

    for (tag, _) in profile.top_tags.iter().take(SEED_TAGS) {
        match catalog.top_artists_by_tag(tag, limit_per_seed).await {
            Ok(hits) => {
                let reason = format!("Top artist in {}", tag);
                for hit in &hits {
                    push_unique(
                        &mut seen,
                        &mut out,
                        Candidate::artist_placeholder(hit, &reason),
                    );
                }
            }
            Err(e) => {
                tracing::warn!(tag = %tag, error = %e, "Tag top-artists lookup failed");
            }
        }

        match catalog.top_tracks_by_tag(tag, limit_per_seed).await {
            Ok(hits) => {
                let reason = format!("Top track in {}", tag);
                for hit in &hits {
                    push_unique(&mut seen, &mut out, Candidate::from_track(hit, &reason));
                }
            }
            Err(e) => {
                tracing::warn!(tag = %tag, error = %e, "Tag top-tracks lookup failed");
            }
        }

        match catalog
            .top_albums_by_tag(tag, cmp::min(5, limit_per_seed))
            .await
        {
            Ok(hits) => {
                let reason = format!("Top album in {}", tag);
                for hit in &hits {
                    push_unique(&mut seen, &mut out, Candidate::from_album(hit, &reason));
                }
            }
            Err(e) => {
                tracing::warn!(tag = %tag, error = %e, "Tag top-albums lookup failed");
            }
        }

        gather_related_tags(catalog, tag, &mut seen, &mut out).await;
    }

    out
}

/// One-level expansion: tags similar to a seed tag contribute a few of
/// their own top tracks.
async fn gather_related_tags(
    catalog: &dyn CatalogService,
    tag: &str,
    seen: &mut HashSet<String>,
    out: &mut Vec<Candidate>,
) {
    let related = match catalog.similar_tags(tag, SIMILAR_TAG_POOL).await {
        Ok(related) => related,
        Err(e) => {
            tracing::debug!(tag = %tag, error = %e, "Similar-tags lookup failed");
            return;
        }
    };

    let related_names: Vec<String> = related
        .iter()
        .map(|t| t.name.display())
        .filter(|name| !name.is_empty() && normalize_name(name) != normalize_name(tag))
        .take(RELATED_TAGS)
        .collect();

    for related_tag in related_names {
        match catalog
            .top_tracks_by_tag(&related_tag, RELATED_TAG_TRACKS)
            .await
        {
            Ok(hits) => {
                let reason = format!("Similar tag to {}: {}", tag, related_tag);
                for hit in &hits {
                    push_unique(seen, out, Candidate::from_track(hit, &reason));
                }
            }
            Err(e) => {
                tracing::debug!(tag = %related_tag, error = %e, "Related-tag tracks lookup failed");
            }
        }
    }
}

/// Global weekly charts: the baseline source that keeps discover useful for
/// brand-new users and when every personal seed fails.
async fn gather_charts(catalog: &dyn CatalogService, limit_per_seed: u32) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<Candidate> = Vec::new();

    match catalog.chart_top_artists(limit_per_seed).await {
        Ok(hits) => {
            for hit in &hits {
                push_unique(
                    &mut seen,
                    &mut out,
                    Candidate::artist_placeholder(hit, "Top artist this week"),
                );
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Chart top-artists lookup failed");
        }
    }

    match catalog.chart_top_tracks(limit_per_seed).await {
        Ok(hits) => {
            for hit in &hits {
                push_unique(
                    &mut seen,
                    &mut out,
                    Candidate::from_track(hit, "Top track this week"),
                );
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Chart top-tracks lookup failed");
        }
    }

    out
}

/// Discover feed: profile-seeded candidates (when a user is given and has
/// history) followed by the global charts, deduplicated and truncated.
/// Candidates keep gather order; there is no reranking on this path.
pub async fn get_discover_recommendations(
    events: &dyn EventStore,
    catalog: &dyn CatalogService,
    user_id: Option<Uuid>,
    limit: usize,
) -> Vec<Recommendation> {
    let limit_per_seed = cmp::max(5, limit / 4) as u32;

    let mut combined: Vec<Candidate> = Vec::new();
    if let Some(user_id) = user_id {
        combined.extend(gather_from_profile(events, catalog, user_id, limit_per_seed).await);
    }
    combined.extend(gather_charts(catalog, limit_per_seed).await);

    assemble(combined, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::models::{ListeningEvent, RawAlbum, RawArtist, RawTag, RawTrack, TagAssociation, TagRef};
    use std::collections::HashMap;

    struct EmptyEventStore;

    #[async_trait::async_trait]
    impl EventStore for EmptyEventStore {
        async fn list_recent_events(
            &self,
            _user_id: Uuid,
            _limit: i64,
        ) -> AppResult<Vec<ListeningEvent>> {
            Ok(Vec::new())
        }

        async fn list_tag_associations(
            &self,
            _event_ids: &[Uuid],
        ) -> AppResult<Vec<TagAssociation>> {
            Ok(Vec::new())
        }

        async fn resolve_tag_names(
            &self,
            _refs: &[TagRef],
        ) -> AppResult<HashMap<TagRef, String>> {
            Ok(HashMap::new())
        }
    }

    #[derive(Default)]
    struct ChartCatalog {
        artists: Vec<RawArtist>,
        tracks: Vec<RawTrack>,
        fail_everything: bool,
    }

    impl ChartCatalog {
        fn seeded() -> Self {
            Self {
                artists: serde_json::from_str(r#"[{"name": "Dua Lipa"}, {"name": "Fred again.."}]"#)
                    .unwrap(),
                tracks: serde_json::from_str(
                    r#"[{"name": "Houdini", "artist": "Dua Lipa"}]"#,
                )
                .unwrap(),
                fail_everything: false,
            }
        }

        fn check(&self) -> AppResult<()> {
            if self.fail_everything {
                return Err(AppError::ExternalApi("catalog down".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl CatalogService for ChartCatalog {
        async fn similar_tracks(
            &self,
            _track: &str,
            _artist: &str,
            _limit: u32,
        ) -> AppResult<Vec<RawTrack>> {
            self.check()?;
            Ok(Vec::new())
        }

        async fn similar_artists(&self, _artist: &str, _limit: u32) -> AppResult<Vec<RawArtist>> {
            self.check()?;
            Ok(Vec::new())
        }

        async fn top_artists_by_tag(&self, _tag: &str, _limit: u32) -> AppResult<Vec<RawArtist>> {
            self.check()?;
            Ok(Vec::new())
        }

        async fn top_tracks_by_tag(&self, _tag: &str, _limit: u32) -> AppResult<Vec<RawTrack>> {
            self.check()?;
            Ok(Vec::new())
        }

        async fn top_albums_by_tag(&self, _tag: &str, _limit: u32) -> AppResult<Vec<RawAlbum>> {
            self.check()?;
            Ok(Vec::new())
        }

        async fn similar_tags(&self, _tag: &str, _limit: u32) -> AppResult<Vec<RawTag>> {
            self.check()?;
            Ok(Vec::new())
        }

        async fn chart_top_artists(&self, _limit: u32) -> AppResult<Vec<RawArtist>> {
            self.check()?;
            Ok(self.artists.clone())
        }

        async fn chart_top_tracks(&self, _limit: u32) -> AppResult<Vec<RawTrack>> {
            self.check()?;
            Ok(self.tracks.clone())
        }

        async fn search_tracks(
            &self,
            _query: &str,
            _artist: Option<&str>,
            _limit: u32,
        ) -> AppResult<Vec<RawTrack>> {
            self.check()?;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_anonymous_discover_is_chart_only() {
        let events = EmptyEventStore;
        let catalog = ChartCatalog::seeded();

        let out = get_discover_recommendations(&events, &catalog, None, 30).await;

        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| r.reason.contains("this week")));
        assert_eq!(out[0].track, "Artist: Dua Lipa");
        assert_eq!(out[2].track, "Houdini");
    }

    #[tokio::test]
    async fn test_user_without_history_falls_back_to_charts() {
        let events = EmptyEventStore;
        let catalog = ChartCatalog::seeded();

        let out =
            get_discover_recommendations(&events, &catalog, Some(Uuid::new_v4()), 30).await;

        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| r.reason.contains("this week")));
    }

    #[tokio::test]
    async fn test_catalog_outage_yields_empty_list() {
        let events = EmptyEventStore;
        let catalog = ChartCatalog {
            fail_everything: true,
            ..ChartCatalog::seeded()
        };

        let out = get_discover_recommendations(&events, &catalog, None, 30).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_limit_respected() {
        let events = EmptyEventStore;
        let catalog = ChartCatalog::seeded();

        let out = get_discover_recommendations(&events, &catalog, None, 2).await;
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn test_related_tags_skip_self_and_blank() {
        struct TagCatalog;

        #[async_trait::async_trait]
        impl CatalogService for TagCatalog {
            async fn similar_tracks(
                &self,
                _track: &str,
                _artist: &str,
                _limit: u32,
            ) -> AppResult<Vec<RawTrack>> {
                Ok(Vec::new())
            }

            async fn similar_artists(
                &self,
                _artist: &str,
                _limit: u32,
            ) -> AppResult<Vec<RawArtist>> {
                Ok(Vec::new())
            }

            async fn top_artists_by_tag(
                &self,
                _tag: &str,
                _limit: u32,
            ) -> AppResult<Vec<RawArtist>> {
                Ok(Vec::new())
            }

            async fn top_tracks_by_tag(&self, tag: &str, _limit: u32) -> AppResult<Vec<RawTrack>> {
                let json = format!(r#"[{{"name": "From {}", "artist": "Someone"}}]"#, tag);
                Ok(serde_json::from_str(&json).unwrap())
            }

            async fn top_albums_by_tag(
                &self,
                _tag: &str,
                _limit: u32,
            ) -> AppResult<Vec<RawAlbum>> {
                Ok(Vec::new())
            }

            async fn similar_tags(&self, _tag: &str, _limit: u32) -> AppResult<Vec<RawTag>> {
                Ok(serde_json::from_str(
                    r#"[{"name": "House"}, {"name": ""}, {"name": "techno"}]"#,
                )
                .unwrap())
            }

            async fn chart_top_artists(&self, _limit: u32) -> AppResult<Vec<RawArtist>> {
                Ok(Vec::new())
            }

            async fn chart_top_tracks(&self, _limit: u32) -> AppResult<Vec<RawTrack>> {
                Ok(Vec::new())
            }

            async fn search_tracks(
                &self,
                _query: &str,
                _artist: Option<&str>,
                _limit: u32,
            ) -> AppResult<Vec<RawTrack>> {
                Ok(Vec::new())
            }
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        gather_related_tags(&TagCatalog, "house", &mut seen, &mut out).await;

        // "House" matches the seed tag case-insensitively and is skipped;
        // the blank name is dropped; only "techno" expands.
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reason, "Similar tag to house: techno");
    }
}

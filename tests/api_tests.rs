use std::collections::HashMap;
use std::sync::Arc;

use axum_test::TestServer;
use chrono::{Duration, Utc};
use uuid::Uuid;

use encore_api::db::EventStore;
use encore_api::error::{AppError, AppResult};
use encore_api::models::{
    ListeningEvent, RawAlbum, RawArtist, RawTag, RawTrack, TagAssociation, TagRef,
};
use encore_api::routes::create_router;
use encore_api::services::catalog::CatalogService;
use encore_api::state::AppState;

// ---------------------------------------------------------------------------
// In-memory collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
struct InMemoryEventStore {
    events: HashMap<Uuid, Vec<ListeningEvent>>,
}

impl InMemoryEventStore {
    /// Record `count` plays of a track, newest-first.
    fn add_plays(&mut self, user_id: Uuid, track: &str, artist: &str, count: usize) {
        let log = self.events.entry(user_id).or_default();
        for i in 0..count {
            log.push(ListeningEvent {
                id: Uuid::new_v4(),
                track: track.to_string(),
                artist: artist.to_string(),
                track_id: None,
                liked: false,
                logged_at: Utc::now() - Duration::minutes((log.len() + i) as i64),
            });
        }
    }
}

#[async_trait::async_trait]
impl EventStore for InMemoryEventStore {
    async fn list_recent_events(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<ListeningEvent>> {
        Ok(self
            .events
            .get(&user_id)
            .map(|events| events.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn list_tag_associations(&self, _event_ids: &[Uuid]) -> AppResult<Vec<TagAssociation>> {
        Ok(Vec::new())
    }

    async fn resolve_tag_names(&self, _refs: &[TagRef]) -> AppResult<HashMap<TagRef, String>> {
        Ok(HashMap::new())
    }
}

#[derive(Default)]
struct FakeCatalog {
    similar_tracks: HashMap<String, Vec<RawTrack>>,
    similar_artists: HashMap<String, Vec<RawArtist>>,
    chart_artists: Vec<RawArtist>,
    chart_tracks: Vec<RawTrack>,
    fail_similar: bool,
}

impl FakeCatalog {
    fn script_similar_tracks(&mut self, seed: &str, json: &str) {
        self.similar_tracks
            .insert(seed.to_string(), serde_json::from_str(json).unwrap());
    }

    fn script_charts(&mut self, artists_json: &str, tracks_json: &str) {
        self.chart_artists = serde_json::from_str(artists_json).unwrap();
        self.chart_tracks = serde_json::from_str(tracks_json).unwrap();
    }
}

#[async_trait::async_trait]
impl CatalogService for FakeCatalog {
    async fn similar_tracks(
        &self,
        track: &str,
        _artist: &str,
        _limit: u32,
    ) -> AppResult<Vec<RawTrack>> {
        if self.fail_similar {
            return Err(AppError::ExternalApi("catalog down".to_string()));
        }
        Ok(self.similar_tracks.get(track).cloned().unwrap_or_default())
    }

    async fn similar_artists(&self, artist: &str, _limit: u32) -> AppResult<Vec<RawArtist>> {
        if self.fail_similar {
            return Err(AppError::ExternalApi("catalog down".to_string()));
        }
        Ok(self.similar_artists.get(artist).cloned().unwrap_or_default())
    }

    async fn top_artists_by_tag(&self, _tag: &str, _limit: u32) -> AppResult<Vec<RawArtist>> {
        Ok(Vec::new())
    }

    async fn top_tracks_by_tag(&self, _tag: &str, _limit: u32) -> AppResult<Vec<RawTrack>> {
        Ok(Vec::new())
    }

    async fn top_albums_by_tag(&self, _tag: &str, _limit: u32) -> AppResult<Vec<RawAlbum>> {
        Ok(Vec::new())
    }

    async fn similar_tags(&self, _tag: &str, _limit: u32) -> AppResult<Vec<RawTag>> {
        Ok(Vec::new())
    }

    async fn chart_top_artists(&self, _limit: u32) -> AppResult<Vec<RawArtist>> {
        Ok(self.chart_artists.clone())
    }

    async fn chart_top_tracks(&self, _limit: u32) -> AppResult<Vec<RawTrack>> {
        Ok(self.chart_tracks.clone())
    }

    async fn search_tracks(
        &self,
        query: &str,
        _artist: Option<&str>,
        _limit: u32,
    ) -> AppResult<Vec<RawTrack>> {
        Ok(self.similar_tracks.get(query).cloned().unwrap_or_default())
    }
}

fn create_test_server(events: InMemoryEventStore, catalog: FakeCatalog) -> TestServer {
    let state = AppState {
        events: Arc::new(events),
        catalog: Arc::new(catalog),
    };
    TestServer::new(create_router(state)).unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(InMemoryEventStore::default(), FakeCatalog::default());
    let response = server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_personal_recommendations_rerank_order() {
    let user_id = Uuid::new_v4();

    let mut store = InMemoryEventStore::default();
    store.add_plays(user_id, "One More Time", "Daft Punk", 10);

    let mut catalog = FakeCatalog::default();
    // The already-logged track has the stronger match but eats the logged
    // penalty: 1.0 - 1.0 + 0.27 = 0.27 still beats Justice's 0.24.
    catalog.script_similar_tracks(
        "One More Time",
        r#"[
            {"name": "One More Time", "artist": {"name": "Daft Punk"}, "match": 90},
            {"name": "Genesis", "artist": {"name": "Justice"}, "match": 80}
        ]"#,
    );

    let server = create_test_server(store, catalog);
    let response = server
        .get("/api/v1/recommendations/personal")
        .add_query_param("user_id", user_id.to_string())
        .await;

    response.assert_status_ok();
    let recommendations: Vec<serde_json::Value> = response.json();
    assert_eq!(recommendations.len(), 2);
    assert_eq!(recommendations[0]["id"], "daft_punk_one_more_time");
    assert_eq!(recommendations[1]["id"], "justice_genesis");
    assert_eq!(recommendations[0]["source"], "lastfm");
    assert_eq!(recommendations[1]["reason"], "Similar to One More Time");
}

#[tokio::test]
async fn test_personal_recommendations_unknown_user_is_empty() {
    let server = create_test_server(InMemoryEventStore::default(), FakeCatalog::default());

    let response = server
        .get("/api/v1/recommendations/personal")
        .add_query_param("user_id", Uuid::new_v4().to_string())
        .await;

    response.assert_status_ok();
    let recommendations: Vec<serde_json::Value> = response.json();
    assert!(recommendations.is_empty());
}

#[tokio::test]
async fn test_personal_recommendations_survive_catalog_outage() {
    let user_id = Uuid::new_v4();
    let mut store = InMemoryEventStore::default();
    store.add_plays(user_id, "One More Time", "Daft Punk", 3);

    let catalog = FakeCatalog {
        fail_similar: true,
        ..FakeCatalog::default()
    };

    let server = create_test_server(store, catalog);
    let response = server
        .get("/api/v1/recommendations/personal")
        .add_query_param("user_id", user_id.to_string())
        .await;

    // Every seed failed; the result degrades to empty instead of erroring
    response.assert_status_ok();
    let recommendations: Vec<serde_json::Value> = response.json();
    assert!(recommendations.is_empty());
}

#[tokio::test]
async fn test_personal_recommendations_limit_validation() {
    let server = create_test_server(InMemoryEventStore::default(), FakeCatalog::default());

    let response = server
        .get("/api/v1/recommendations/personal")
        .add_query_param("user_id", Uuid::new_v4().to_string())
        .add_query_param("limit", "0")
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);

    let response = server
        .get("/api/v1/recommendations/personal")
        .add_query_param("user_id", Uuid::new_v4().to_string())
        .add_query_param("limit", "999")
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_discover_anonymous_is_chart_only() {
    let mut catalog = FakeCatalog::default();
    catalog.script_charts(
        r#"[{"name": "Dua Lipa"}, {"name": "Fred again.."}]"#,
        r#"[{"name": "Houdini", "artist": "Dua Lipa"}]"#,
    );

    let server = create_test_server(InMemoryEventStore::default(), catalog);
    let response = server.get("/api/v1/recommendations/discover").await;

    response.assert_status_ok();
    let recommendations: Vec<serde_json::Value> = response.json();
    assert_eq!(recommendations.len(), 3);
    for rec in &recommendations {
        assert!(rec["reason"].as_str().unwrap().contains("this week"));
        assert_eq!(rec["source"], "lastfm");
    }
}

#[tokio::test]
async fn test_discover_dedups_across_profile_and_charts() {
    let user_id = Uuid::new_v4();
    let mut store = InMemoryEventStore::default();
    store.add_plays(user_id, "One More Time", "Daft Punk", 2);

    let mut catalog = FakeCatalog::default();
    // Justice surfaces both as a similar artist and in the weekly chart;
    // only the first (profile-sourced) hit survives, reason intact.
    catalog.similar_artists.insert(
        "Daft Punk".to_string(),
        serde_json::from_str(r#"[{"name": "Justice"}]"#).unwrap(),
    );
    catalog.script_charts(r#"[{"name": "Justice"}]"#, r#"[]"#);

    let server = create_test_server(store, catalog);
    let response = server
        .get("/api/v1/recommendations/discover")
        .add_query_param("user_id", user_id.to_string())
        .await;

    response.assert_status_ok();
    let recommendations: Vec<serde_json::Value> = response.json();
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0]["reason"], "Similar to Daft Punk");
}

#[tokio::test]
async fn test_similar_track_endpoint_propagates_catalog_failure() {
    let catalog = FakeCatalog {
        fail_similar: true,
        ..FakeCatalog::default()
    };

    let server = create_test_server(InMemoryEventStore::default(), catalog);
    let response = server
        .get("/api/v1/recommendations/track")
        .add_query_param("track", "One More Time")
        .add_query_param("artist", "Daft Punk")
        .await;

    response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_similar_track_endpoint_normalizes_hits() {
    let mut catalog = FakeCatalog::default();
    catalog.script_similar_tracks(
        "One More Time",
        r#"[{"name": "Genesis", "artist": "Justice", "match": "0.5"}]"#,
    );

    let server = create_test_server(InMemoryEventStore::default(), catalog);
    let response = server
        .get("/api/v1/recommendations/track")
        .add_query_param("track", "One More Time")
        .add_query_param("artist", "Daft Punk")
        .await;

    response.assert_status_ok();
    let recommendations: Vec<serde_json::Value> = response.json();
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0]["id"], "justice_genesis");
    assert_eq!(
        recommendations[0]["reason"],
        "Similar to One More Time by Daft Punk"
    );
}

#[tokio::test]
async fn test_track_search_rejects_blank_query() {
    let server = create_test_server(InMemoryEventStore::default(), FakeCatalog::default());

    let response = server
        .get("/api/v1/search/track")
        .add_query_param("q", "   ")
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_track_search_returns_normalized_results() {
    let mut catalog = FakeCatalog::default();
    catalog.script_similar_tracks(
        "one more",
        r#"[{"name": "One More Time", "artist": "Daft Punk", "mbid": "mbid-1"}]"#,
    );

    let server = create_test_server(InMemoryEventStore::default(), catalog);
    let response = server
        .get("/api/v1/search/track")
        .add_query_param("q", "one more")
        .await;

    response.assert_status_ok();
    let results: Vec<serde_json::Value> = response.json();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], "mbid-1");
    assert_eq!(results[0]["track"], "One More Time");
}

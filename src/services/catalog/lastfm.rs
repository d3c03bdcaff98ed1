/// Last.fm catalog client
///
/// Thin wrapper over the Last.fm REST API. Every method is one GET against
/// the root endpoint with `method` + `api_key` + `format=json`; Last.fm
/// sometimes reports failures inside a 200 payload, so the error field is
/// checked before the typed parse. Responses are cached in Redis.
use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{OneOrMany, RawAlbum, RawArtist, RawTag, RawTrack},
    services::catalog::CatalogService,
};

const DEFAULT_TIMEOUT_SECS: u64 = 15;

const SIMILAR_CACHE_TTL: u64 = 86400; // 1 day
const TAG_CACHE_TTL: u64 = 86400; // 1 day
const CHART_CACHE_TTL: u64 = 21600; // 6 hours; charts roll weekly
const SEARCH_CACHE_TTL: u64 = 3600; // 1 hour

#[derive(Clone)]
pub struct LastFmClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Cache,
}

// ============================================================================
// Response envelopes
//
// Last.fm nests each result list under a method-specific wrapper object, and
// a few methods have shipped under two different wrapper names over time, so
// those read both. Leaf lists use OneOrMany: a single hit arrives as a bare
// object instead of a one-element array.
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct TrackList {
    #[serde(default)]
    track: OneOrMany<RawTrack>,
}

#[derive(Debug, Default, Deserialize)]
struct ArtistList {
    #[serde(default)]
    artist: OneOrMany<RawArtist>,
}

#[derive(Debug, Default, Deserialize)]
struct AlbumList {
    #[serde(default)]
    album: OneOrMany<RawAlbum>,
}

#[derive(Debug, Default, Deserialize)]
struct TagList {
    #[serde(default)]
    tag: OneOrMany<RawTag>,
}

#[derive(Debug, Default, Deserialize)]
struct SimilarTracksEnvelope {
    #[serde(default)]
    similartracks: TrackList,
}

#[derive(Debug, Default, Deserialize)]
struct SimilarArtistsEnvelope {
    #[serde(default)]
    similarartists: ArtistList,
}

#[derive(Debug, Default, Deserialize)]
struct TagTopArtistsEnvelope {
    #[serde(default)]
    topartists: ArtistList,
}

#[derive(Debug, Default, Deserialize)]
struct TagTopTracksEnvelope {
    #[serde(default)]
    toptracks: Option<TrackList>,
    #[serde(default)]
    tracks: Option<TrackList>,
}

impl TagTopTracksEnvelope {
    fn into_vec(self) -> Vec<RawTrack> {
        self.toptracks
            .or(self.tracks)
            .unwrap_or_default()
            .track
            .into_vec()
    }
}

#[derive(Debug, Default, Deserialize)]
struct TagTopAlbumsEnvelope {
    #[serde(default)]
    topalbums: Option<AlbumList>,
    #[serde(default)]
    albums: Option<AlbumList>,
}

impl TagTopAlbumsEnvelope {
    fn into_vec(self) -> Vec<RawAlbum> {
        self.topalbums
            .or(self.albums)
            .unwrap_or_default()
            .album
            .into_vec()
    }
}

#[derive(Debug, Default, Deserialize)]
struct SimilarTagsEnvelope {
    #[serde(default)]
    similartags: TagList,
}

#[derive(Debug, Default, Deserialize)]
struct ChartArtistsEnvelope {
    #[serde(default)]
    artists: ArtistList,
}

#[derive(Debug, Default, Deserialize)]
struct ChartTracksEnvelope {
    #[serde(default)]
    tracks: Option<TrackList>,
    #[serde(default)]
    toptracks: Option<TrackList>,
}

impl ChartTracksEnvelope {
    fn into_vec(self) -> Vec<RawTrack> {
        self.tracks
            .or(self.toptracks)
            .unwrap_or_default()
            .track
            .into_vec()
    }
}

#[derive(Debug, Default, Deserialize)]
struct TrackSearchEnvelope {
    #[serde(default)]
    results: Option<TrackSearchResults>,
}

#[derive(Debug, Default, Deserialize)]
struct TrackSearchResults {
    #[serde(default)]
    trackmatches: TrackList,
}

/// Translate Last.fm's error-in-payload convention into an AppError.
fn check_payload_error(payload: &serde_json::Value) -> AppResult<()> {
    if let Some(code) = payload.get("error").and_then(|e| e.as_i64()) {
        let message = payload
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(AppError::ExternalApi(format!(
            "Last.fm error {}: {}",
            code, message
        )));
    }
    Ok(())
}

impl LastFmClient {
    pub fn new(cache: Cache, api_key: String, api_url: String) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url,
            cache,
        })
    }

    /// Generic Last.fm REST call: `method` + `api_key` + `format=json` plus
    /// method-specific parameters, all on the root endpoint.
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> AppResult<T> {
        let response = self
            .http_client
            .get(&self.api_url)
            .query(&[
                ("method", method),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
            ])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Last.fm returned status {}: {}",
                status, body
            )));
        }

        let payload: serde_json::Value = response.json().await?;
        check_payload_error(&payload)?;

        serde_json::from_value(payload).map_err(|e| {
            AppError::ExternalApi(format!("Failed to parse Last.fm response: {}", e))
        })
    }
}

#[async_trait::async_trait]
impl CatalogService for LastFmClient {
    async fn similar_tracks(
        &self,
        track: &str,
        artist: &str,
        limit: u32,
    ) -> AppResult<Vec<RawTrack>> {
        let key = CacheKey::SimilarTracks {
            artist: artist.to_string(),
            track: track.to_string(),
            limit,
        };
        cached!(self.cache, key, SIMILAR_CACHE_TTL, async {
            let limit_param = limit.to_string();
            let envelope: SimilarTracksEnvelope = self
                .call(
                    "track.getSimilar",
                    &[
                        ("track", track),
                        ("artist", artist),
                        ("limit", limit_param.as_str()),
                    ],
                )
                .await?;
            Ok::<_, AppError>(envelope.similartracks.track.into_vec())
        })
    }

    async fn similar_artists(&self, artist: &str, limit: u32) -> AppResult<Vec<RawArtist>> {
        let key = CacheKey::SimilarArtists {
            artist: artist.to_string(),
            limit,
        };
        cached!(self.cache, key, SIMILAR_CACHE_TTL, async {
            let limit_param = limit.to_string();
            let envelope: SimilarArtistsEnvelope = self
                .call(
                    "artist.getSimilar",
                    &[("artist", artist), ("limit", limit_param.as_str())],
                )
                .await?;
            Ok::<_, AppError>(envelope.similarartists.artist.into_vec())
        })
    }

    async fn top_artists_by_tag(&self, tag: &str, limit: u32) -> AppResult<Vec<RawArtist>> {
        let key = CacheKey::TagTopArtists {
            tag: tag.to_string(),
            limit,
        };
        cached!(self.cache, key, TAG_CACHE_TTL, async {
            let limit_param = limit.to_string();
            let envelope: TagTopArtistsEnvelope = self
                .call(
                    "tag.getTopArtists",
                    &[("tag", tag), ("limit", limit_param.as_str())],
                )
                .await?;
            Ok::<_, AppError>(envelope.topartists.artist.into_vec())
        })
    }

    async fn top_tracks_by_tag(&self, tag: &str, limit: u32) -> AppResult<Vec<RawTrack>> {
        let key = CacheKey::TagTopTracks {
            tag: tag.to_string(),
            limit,
        };
        cached!(self.cache, key, TAG_CACHE_TTL, async {
            let limit_param = limit.to_string();
            let envelope: TagTopTracksEnvelope = self
                .call(
                    "tag.getTopTracks",
                    &[("tag", tag), ("limit", limit_param.as_str())],
                )
                .await?;
            Ok::<_, AppError>(envelope.into_vec())
        })
    }

    async fn top_albums_by_tag(&self, tag: &str, limit: u32) -> AppResult<Vec<RawAlbum>> {
        let key = CacheKey::TagTopAlbums {
            tag: tag.to_string(),
            limit,
        };
        cached!(self.cache, key, TAG_CACHE_TTL, async {
            let limit_param = limit.to_string();
            let envelope: TagTopAlbumsEnvelope = self
                .call(
                    "tag.getTopAlbums",
                    &[("tag", tag), ("limit", limit_param.as_str())],
                )
                .await?;
            Ok::<_, AppError>(envelope.into_vec())
        })
    }

    async fn similar_tags(&self, tag: &str, limit: u32) -> AppResult<Vec<RawTag>> {
        let key = CacheKey::SimilarTags {
            tag: tag.to_string(),
            limit,
        };
        cached!(self.cache, key, TAG_CACHE_TTL, async {
            let limit_param = limit.to_string();
            let envelope: SimilarTagsEnvelope = self
                .call(
                    "tag.getSimilar",
                    &[("tag", tag), ("limit", limit_param.as_str())],
                )
                .await?;
            Ok::<_, AppError>(envelope.similartags.tag.into_vec())
        })
    }

    async fn chart_top_artists(&self, limit: u32) -> AppResult<Vec<RawArtist>> {
        let key = CacheKey::ChartTopArtists { limit };
        cached!(self.cache, key, CHART_CACHE_TTL, async {
            let limit_param = limit.to_string();
            let envelope: ChartArtistsEnvelope = self
                .call("chart.getTopArtists", &[("limit", limit_param.as_str())])
                .await?;
            Ok::<_, AppError>(envelope.artists.artist.into_vec())
        })
    }

    async fn chart_top_tracks(&self, limit: u32) -> AppResult<Vec<RawTrack>> {
        let key = CacheKey::ChartTopTracks { limit };
        cached!(self.cache, key, CHART_CACHE_TTL, async {
            let limit_param = limit.to_string();
            let envelope: ChartTracksEnvelope = self
                .call("chart.getTopTracks", &[("limit", limit_param.as_str())])
                .await?;
            Ok::<_, AppError>(envelope.into_vec())
        })
    }

    async fn search_tracks(
        &self,
        query: &str,
        artist: Option<&str>,
        limit: u32,
    ) -> AppResult<Vec<RawTrack>> {
        let key = CacheKey::TrackSearch {
            query: query.to_string(),
            artist: artist.map(str::to_string),
            limit,
        };
        cached!(self.cache, key, SEARCH_CACHE_TTL, async {
            let limit_param = limit.to_string();
            let mut params = vec![("track", query), ("limit", limit_param.as_str())];
            if let Some(artist) = artist {
                params.push(("artist", artist));
            }
            let envelope: TrackSearchEnvelope = self.call("track.search", &params).await?;
            Ok::<_, AppError>(envelope
                .results
                .unwrap_or_default()
                .trackmatches
                .track
                .into_vec())
        })
    }
}

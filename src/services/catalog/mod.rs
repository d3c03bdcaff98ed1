/// Similarity/catalog service abstraction
///
/// The candidate gatherers consume this trait; the Last.fm client is the
/// production implementation. Every method is a single bounded lookup that
/// may fail on its own. Callers catch per call and treat a failure as an
/// empty contribution, so one bad seed never takes down a request.
use crate::{
    error::AppResult,
    models::{RawAlbum, RawArtist, RawTag, RawTrack},
};

pub mod lastfm;

pub use lastfm::LastFmClient;

#[async_trait::async_trait]
pub trait CatalogService: Send + Sync {
    /// Tracks similar to a given track.
    async fn similar_tracks(
        &self,
        track: &str,
        artist: &str,
        limit: u32,
    ) -> AppResult<Vec<RawTrack>>;

    /// Artists similar to a given artist.
    async fn similar_artists(&self, artist: &str, limit: u32) -> AppResult<Vec<RawArtist>>;

    /// Most popular artists for a tag.
    async fn top_artists_by_tag(&self, tag: &str, limit: u32) -> AppResult<Vec<RawArtist>>;

    /// Most popular tracks for a tag.
    async fn top_tracks_by_tag(&self, tag: &str, limit: u32) -> AppResult<Vec<RawTrack>>;

    /// Most popular albums for a tag.
    async fn top_albums_by_tag(&self, tag: &str, limit: u32) -> AppResult<Vec<RawAlbum>>;

    /// Tags related to a given tag.
    async fn similar_tags(&self, tag: &str, limit: u32) -> AppResult<Vec<RawTag>>;

    /// Global top-artists chart.
    async fn chart_top_artists(&self, limit: u32) -> AppResult<Vec<RawArtist>>;

    /// Global top-tracks chart.
    async fn chart_top_tracks(&self, limit: u32) -> AppResult<Vec<RawTrack>>;

    /// Free-text track search, optionally narrowed by artist.
    async fn search_tracks(
        &self,
        query: &str,
        artist: Option<&str>,
        limit: u32,
    ) -> AppResult<Vec<RawTrack>>;
}

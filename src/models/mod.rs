use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default provenance source attached to every recommendation.
pub const SOURCE_LASTFM: &str = "lastfm";

// ============================================================================
// Identity normalization
// ============================================================================

/// Canonical form of an artist or track name: trimmed, lower-cased, with
/// internal whitespace collapsed. Display names keep their original casing;
/// this form is only ever used for identity comparison and key construction.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stable fallback identifier for a track, derived from its artist and name.
///
/// Profile building and candidate normalization must produce byte-identical
/// keys here, otherwise the already-logged penalty in reranking cannot match.
pub fn track_key(artist: &str, track: &str) -> String {
    format!("{}_{}", normalize_name(artist), normalize_name(track))
        .replace(' ', "_")
        .replace('/', "_")
}

/// Stable fallback identifier for an artist.
pub fn artist_key(artist: &str) -> String {
    normalize_name(artist).replace(' ', "_").replace('/', "_")
}

// ============================================================================
// Event store types
// ============================================================================

/// A single row from the user's listening log, newest-first.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListeningEvent {
    pub id: Uuid,
    pub track: String,
    pub artist: String,
    pub track_id: Option<String>,
    pub liked: bool,
    pub logged_at: DateTime<Utc>,
}

impl ListeningEvent {
    /// Identity key for this event's track: the stored `track_id` when
    /// present, else the canonical fallback key.
    pub fn track_identity(&self) -> String {
        match self.track_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.trim().to_lowercase(),
            _ => track_key(&self.artist, &self.track),
        }
    }
}

/// Reference to a tag attached to a listening event. Tags live in two
/// namespaces: curated preset tags and user-created tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagRef {
    Preset(Uuid),
    User(Uuid),
}

/// Join row linking a listening event to one tag.
#[derive(Debug, Clone)]
pub struct TagAssociation {
    pub event_id: Uuid,
    pub tag: TagRef,
}

// ============================================================================
// External payload shapes (Last.fm)
// ============================================================================

/// A field in an external payload that may arrive either as a plain string
/// or as a nested object carrying `name` / `#text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalField {
    Text(String),
    Named {
        #[serde(default)]
        name: Option<String>,
        #[serde(rename = "#text", default)]
        text: Option<String>,
    },
}

impl ExternalField {
    /// Coerce to a trimmed display string. Returns an empty string when
    /// nothing usable is present.
    pub fn display(&self) -> String {
        match self {
            ExternalField::Text(s) => s.trim().to_string(),
            ExternalField::Named { name, text } => name
                .as_deref()
                .or(text.as_deref())
                .unwrap_or_default()
                .trim()
                .to_string(),
        }
    }
}

impl Default for ExternalField {
    fn default() -> Self {
        ExternalField::Text(String::new())
    }
}

/// Similarity match values arrive as JSON numbers or numeric strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchValue {
    Number(f64),
    Text(String),
}

impl MatchValue {
    /// Defensive numeric parse; anything unparsable maps to `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MatchValue::Number(n) => Some(*n),
            MatchValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Last.fm collapses one-element lists into a bare object; both shapes
/// normalize to a `Vec`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

/// Track record as returned by similarity, tag, chart, and search lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTrack {
    #[serde(default)]
    pub name: ExternalField,
    #[serde(default)]
    pub artist: ExternalField,
    #[serde(default)]
    pub mbid: ExternalField,
    #[serde(rename = "match", default)]
    pub match_value: Option<MatchValue>,
}

/// Artist record as returned by similarity, tag, and chart lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawArtist {
    #[serde(default)]
    pub name: ExternalField,
    #[serde(default)]
    pub mbid: ExternalField,
}

/// Album record as returned by tag lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAlbum {
    #[serde(default)]
    pub name: ExternalField,
    #[serde(default)]
    pub artist: ExternalField,
}

/// Tag record as returned by `tag.getSimilar`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTag {
    #[serde(default)]
    pub name: ExternalField,
}

// ============================================================================
// Candidates and recommendations
// ============================================================================

/// A track, artist, or album surfaced by the catalog service before ranking.
/// Lives only for the duration of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub label: String,
    pub artist: String,
    pub id: String,
    pub reason: String,
    pub match_score: Option<f64>,
}

impl Candidate {
    /// Normalize a track hit. Hits without a usable track or artist name
    /// yield `None`.
    pub fn from_track(raw: &RawTrack, reason: &str) -> Option<Self> {
        let name = raw.name.display();
        let artist = raw.artist.display();
        if name.is_empty() || artist.is_empty() {
            return None;
        }
        let mbid = raw.mbid.display();
        let id = if mbid.is_empty() {
            track_key(&artist, &name)
        } else {
            mbid
        };
        Some(Self {
            label: name,
            artist,
            id,
            reason: reason.to_string(),
            match_score: raw.match_value.as_ref().and_then(MatchValue::as_f64),
        })
    }

    /// Normalize an artist hit into a placeholder candidate representing the
    /// artist itself rather than any particular track.
    pub fn artist_placeholder(raw: &RawArtist, reason: &str) -> Option<Self> {
        let name = raw.name.display();
        if name.is_empty() {
            return None;
        }
        let mbid = raw.mbid.display();
        let id = if mbid.is_empty() { artist_key(&name) } else { mbid };
        Some(Self {
            label: format!("Artist: {}", name),
            artist: name,
            id,
            reason: reason.to_string(),
            match_score: None,
        })
    }

    /// Normalize an album hit. Albums share the track identifier scheme with
    /// an `album_` prefix so they never collide with the track they open.
    pub fn from_album(raw: &RawAlbum, reason: &str) -> Option<Self> {
        let name = raw.name.display();
        let artist = raw.artist.display();
        if name.is_empty() || artist.is_empty() {
            return None;
        }
        Some(Self {
            label: format!("Album: {}", name),
            artist: artist.clone(),
            id: format!("album_{}", track_key(&artist, &name)),
            reason: reason.to_string(),
            match_score: None,
        })
    }
}

/// Final recommendation item returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub track: String,
    pub artist: String,
    pub id: String,
    pub source: String,
    pub reason: String,
    pub match_score: Option<f64>,
}

impl From<Candidate> for Recommendation {
    fn from(candidate: Candidate) -> Self {
        Self {
            track: candidate.label,
            artist: candidate.artist,
            id: candidate.id,
            source: SOURCE_LASTFM.to_string(),
            reason: candidate.reason,
            match_score: candidate.match_score,
        }
    }
}

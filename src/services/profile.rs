/// Taste profile builder
///
/// Derives a per-user preference summary from the most recent window of
/// listening events. The profile is rebuilt fresh on every request and
/// immutable once constructed; nothing here is shared across requests.
use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::db::EventStore;
use crate::models::{normalize_name, ListeningEvent, TagRef};

/// How much listening history feeds a profile.
const EVENT_WINDOW: i64 = 500;

const TOP_ARTISTS: usize = 30;
const TOP_TRACKS: usize = 50;
const TOP_TAGS: usize = 20;

/// Per-user taste summary: top artists/tracks/tags for seeding, logged
/// track ids and liked artists for reranking.
#[derive(Debug, Clone)]
pub struct UserProfile {
    /// (display name, event count), frequency-descending, top 30.
    pub top_artists: Vec<(String, usize)>,
    /// (track, artist, event count), frequency-descending, top 50.
    pub top_tracks: Vec<(String, String, usize)>,
    /// (tag name, weighted count), top 20.
    pub top_tags: Vec<(String, usize)>,
    /// Normalized identifiers of every track the user has logged.
    pub logged_track_ids: HashSet<String>,
    /// Display names of artists on liked events, regardless of rank.
    pub liked_artists: HashSet<String>,
    // O(1) affinity lookup, built once at construction
    artist_weights: HashMap<String, (String, usize)>,
    liked_artist_keys: HashSet<String>,
}

impl UserProfile {
    pub fn new(
        top_artists: Vec<(String, usize)>,
        top_tracks: Vec<(String, String, usize)>,
        top_tags: Vec<(String, usize)>,
        logged_track_ids: HashSet<String>,
        liked_artists: HashSet<String>,
    ) -> Self {
        let artist_weights = top_artists
            .iter()
            .map(|(name, count)| (normalize_name(name), (name.clone(), *count)))
            .collect();
        let liked_artist_keys = liked_artists.iter().map(|a| normalize_name(a)).collect();

        Self {
            top_artists,
            top_tracks,
            top_tags,
            logged_track_ids,
            liked_artists,
            artist_weights,
            liked_artist_keys,
        }
    }

    /// Affinity weight for a candidate artist. Grows with play count but
    /// saturates at 1.0 so a single heavy-rotation artist cannot dominate
    /// every score. 0.0 for artists absent from the profile.
    pub fn artist_affinity(&self, artist: &str) -> f64 {
        match self.artist_weights.get(&normalize_name(artist)) {
            Some((_, count)) => (*count as f64 * 0.2).min(1.0),
            None => 0.0,
        }
    }

    pub fn is_liked_artist(&self, artist: &str) -> bool {
        self.liked_artist_keys.contains(&normalize_name(artist))
    }

    pub fn is_logged(&self, track_id: &str) -> bool {
        self.logged_track_ids
            .contains(&track_id.trim().to_lowercase())
    }
}

/// Build a taste profile from the user's recent listening events.
///
/// Returns `None` when the store is unavailable or the user has no history;
/// both are expected conditions for new users, not errors.
pub async fn build_profile(store: &dyn EventStore, user_id: Uuid) -> Option<UserProfile> {
    let events = match store.list_recent_events(user_id, EVENT_WINDOW).await {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                error = %e,
                "Event store unavailable, continuing without profile"
            );
            return None;
        }
    };

    if events.is_empty() {
        tracing::debug!(user_id = %user_id, "No listening history");
        return None;
    }

    let top_tags = aggregate_tags(store, &events).await;

    // Counters keyed on the canonical name. Ties in the final ranking are
    // broken by first-seen position in the newest-first event sequence.
    let mut artist_counts: HashMap<String, (String, usize, usize)> = HashMap::new();
    let mut track_counts: HashMap<(String, String), (String, String, usize, usize)> =
        HashMap::new();
    let mut logged_track_ids: HashSet<String> = HashSet::new();
    let mut liked_artists: HashSet<String> = HashSet::new();

    for (position, event) in events.iter().enumerate() {
        let artist = event.artist.trim();
        let track = event.track.trim();

        if !artist.is_empty() {
            let entry = artist_counts
                .entry(normalize_name(artist))
                .or_insert_with(|| (artist.to_string(), 0, position));
            entry.1 += 1;
        }

        if !artist.is_empty() && !track.is_empty() {
            let entry = track_counts
                .entry((normalize_name(track), normalize_name(artist)))
                .or_insert_with(|| (track.to_string(), artist.to_string(), 0, position));
            entry.2 += 1;
        }

        if event.track_id.is_some() || (!artist.is_empty() && !track.is_empty()) {
            logged_track_ids.insert(event.track_identity());
        }

        if event.liked && !artist.is_empty() {
            liked_artists.insert(artist.to_string());
        }
    }

    let mut artists: Vec<(String, usize, usize)> = artist_counts.into_values().collect();
    artists.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    let top_artists = artists
        .into_iter()
        .take(TOP_ARTISTS)
        .map(|(name, count, _)| (name, count))
        .collect();

    let mut tracks: Vec<(String, String, usize, usize)> = track_counts.into_values().collect();
    tracks.sort_by(|a, b| b.2.cmp(&a.2).then(a.3.cmp(&b.3)));
    let top_tracks = tracks
        .into_iter()
        .take(TOP_TRACKS)
        .map(|(track, artist, count, _)| (track, artist, count))
        .collect();

    tracing::debug!(
        user_id = %user_id,
        events = events.len(),
        logged_tracks = logged_track_ids.len(),
        "Profile built"
    );

    Some(UserProfile::new(
        top_artists,
        top_tracks,
        top_tags,
        logged_track_ids,
        liked_artists,
    ))
}

/// Two-level tag join: events -> tag associations -> tag display names,
/// summed per tag. A failure in either step degrades to "no tag signal";
/// the profile as a whole never fails because tag data is unavailable.
async fn aggregate_tags(store: &dyn EventStore, events: &[ListeningEvent]) -> Vec<(String, usize)> {
    let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();

    let associations = match store.list_tag_associations(&event_ids).await {
        Ok(associations) => associations,
        Err(e) => {
            tracing::debug!(error = %e, "Tag associations unavailable, skipping tag signal");
            return Vec::new();
        }
    };

    if associations.is_empty() {
        return Vec::new();
    }

    let mut ref_counts: HashMap<TagRef, usize> = HashMap::new();
    for association in &associations {
        *ref_counts.entry(association.tag.clone()).or_insert(0) += 1;
    }

    let refs: Vec<TagRef> = ref_counts.keys().cloned().collect();
    let names = match store.resolve_tag_names(&refs).await {
        Ok(names) => names,
        Err(e) => {
            tracing::debug!(error = %e, "Tag names unresolvable, skipping tag signal");
            return Vec::new();
        }
    };

    let mut tag_counts: HashMap<String, usize> = HashMap::new();
    for (tag_ref, count) in &ref_counts {
        if let Some(name) = names.get(tag_ref) {
            if !name.trim().is_empty() {
                *tag_counts.entry(name.trim().to_string()).or_insert(0) += count;
            }
        }
    }

    let mut tags: Vec<(String, usize)> = tag_counts.into_iter().collect();
    tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    tags.truncate(TOP_TAGS);
    tags
}

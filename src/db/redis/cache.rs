use std::fmt::Display;

use redis::{AsyncCommands, Client};

use crate::error::{AppError, AppResult};

/// Cache keys for external catalog lookups.
///
/// Keys embed the request limit so differently-sized lookups never alias,
/// and lower-case their text components so "House" and "house" share an
/// entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    SimilarTracks {
        artist: String,
        track: String,
        limit: u32,
    },
    SimilarArtists {
        artist: String,
        limit: u32,
    },
    TagTopArtists {
        tag: String,
        limit: u32,
    },
    TagTopTracks {
        tag: String,
        limit: u32,
    },
    TagTopAlbums {
        tag: String,
        limit: u32,
    },
    SimilarTags {
        tag: String,
        limit: u32,
    },
    ChartTopArtists {
        limit: u32,
    },
    ChartTopTracks {
        limit: u32,
    },
    TrackSearch {
        query: String,
        artist: Option<String>,
        limit: u32,
    },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::SimilarTracks {
                artist,
                track,
                limit,
            } => write!(
                f,
                "sim:track:{}:{}:{}",
                artist.to_lowercase(),
                track.to_lowercase(),
                limit
            ),
            CacheKey::SimilarArtists { artist, limit } => {
                write!(f, "sim:artist:{}:{}", artist.to_lowercase(), limit)
            }
            CacheKey::TagTopArtists { tag, limit } => {
                write!(f, "tag:artists:{}:{}", tag.to_lowercase(), limit)
            }
            CacheKey::TagTopTracks { tag, limit } => {
                write!(f, "tag:tracks:{}:{}", tag.to_lowercase(), limit)
            }
            CacheKey::TagTopAlbums { tag, limit } => {
                write!(f, "tag:albums:{}:{}", tag.to_lowercase(), limit)
            }
            CacheKey::SimilarTags { tag, limit } => {
                write!(f, "sim:tag:{}:{}", tag.to_lowercase(), limit)
            }
            CacheKey::ChartTopArtists { limit } => write!(f, "chart:artists:{}", limit),
            CacheKey::ChartTopTracks { limit } => write!(f, "chart:tracks:{}", limit),
            CacheKey::TrackSearch {
                query,
                artist,
                limit,
            } => write!(
                f,
                "search:track:{}:{}:{}",
                query.to_lowercase(),
                artist.as_deref().unwrap_or("").to_lowercase(),
                limit
            ),
        }
    }
}

/// Creates a Redis client for caching catalog responses
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Redis-backed cache for external catalog responses.
///
/// Reads are synchronous with the request; writes run on a detached task so
/// a slow Redis never delays a response. Computed recommendations are never
/// cached, only raw catalog lookups.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
}

impl Cache {
    pub fn new(redis_client: Client) -> Self {
        Self { redis_client }
    }

    /// Retrieves a cached value by key; `None` on miss.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(format!("{}", key)).await?;

        match cached {
            Some(json) => {
                let value = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Stores a value without blocking the caller.
    ///
    /// Serialization failures and write failures are logged and dropped;
    /// the cache is an optimization, never a source of truth.
    pub fn put_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let client = self.redis_client.clone();
        let key = format!("{}", key);

        tokio::spawn(async move {
            match client.get_multiplexed_async_connection().await {
                Ok(mut conn) => {
                    if let Err(e) = conn.set_ex::<_, _, ()>(&key, json, ttl).await {
                        tracing::warn!(error = %e, key = %key, "Cache write failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "Redis unavailable for cache write");
                }
            }
        });
    }
}

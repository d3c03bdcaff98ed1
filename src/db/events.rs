use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{ListeningEvent, TagAssociation, TagRef};

/// Read-side contract over the listening-log store.
///
/// The profile builder is the only consumer. Implementations return errors;
/// the caller decides how soft to fail (an unreachable store means "no
/// profile", not a request failure).
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    /// Most recent listening events for a user, newest first.
    async fn list_recent_events(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<ListeningEvent>>;

    /// Tag join rows for a set of events.
    async fn list_tag_associations(&self, event_ids: &[Uuid]) -> AppResult<Vec<TagAssociation>>;

    /// Resolve tag references to display names. Unknown refs are simply
    /// absent from the result.
    async fn resolve_tag_names(&self, refs: &[TagRef]) -> AppResult<HashMap<TagRef, String>>;
}

/// Postgres-backed event store over the listening-logs schema.
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TagJoinRow {
    log_id: Uuid,
    tag_id: Option<Uuid>,
    user_tag_id: Option<Uuid>,
}

#[derive(sqlx::FromRow)]
struct TagNameRow {
    id: Uuid,
    name: String,
}

#[async_trait::async_trait]
impl EventStore for PgEventStore {
    async fn list_recent_events(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<ListeningEvent>> {
        let events = sqlx::query_as::<_, ListeningEvent>(
            r#"
            SELECT id, track, artist, track_id, liked, logged_at
            FROM listening_logs
            WHERE user_id = $1
            ORDER BY logged_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn list_tag_associations(&self, event_ids: &[Uuid]) -> AppResult<Vec<TagAssociation>> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, TagJoinRow>(
            r#"
            SELECT log_id, tag_id, user_tag_id
            FROM log_tags
            WHERE log_id = ANY($1)
            "#,
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?;

        // A join row may reference a preset tag, a user tag, or both.
        let mut associations = Vec::new();
        for row in rows {
            if let Some(id) = row.tag_id {
                associations.push(TagAssociation {
                    event_id: row.log_id,
                    tag: TagRef::Preset(id),
                });
            }
            if let Some(id) = row.user_tag_id {
                associations.push(TagAssociation {
                    event_id: row.log_id,
                    tag: TagRef::User(id),
                });
            }
        }

        Ok(associations)
    }

    async fn resolve_tag_names(&self, refs: &[TagRef]) -> AppResult<HashMap<TagRef, String>> {
        let preset_ids: Vec<Uuid> = refs
            .iter()
            .filter_map(|r| match r {
                TagRef::Preset(id) => Some(*id),
                TagRef::User(_) => None,
            })
            .collect();
        let user_ids: Vec<Uuid> = refs
            .iter()
            .filter_map(|r| match r {
                TagRef::User(id) => Some(*id),
                TagRef::Preset(_) => None,
            })
            .collect();

        let mut names = HashMap::new();

        if !preset_ids.is_empty() {
            let rows = sqlx::query_as::<_, TagNameRow>(
                "SELECT id, name FROM preset_tags WHERE id = ANY($1)",
            )
            .bind(&preset_ids)
            .fetch_all(&self.pool)
            .await?;

            for row in rows {
                let name = row.name.trim();
                if !name.is_empty() {
                    names.insert(TagRef::Preset(row.id), name.to_string());
                }
            }
        }

        if !user_ids.is_empty() {
            let rows =
                sqlx::query_as::<_, TagNameRow>("SELECT id, name FROM tags WHERE id = ANY($1)")
                    .bind(&user_ids)
                    .fetch_all(&self.pool)
                    .await?;

            for row in rows {
                let name = row.name.trim();
                if !name.is_empty() {
                    names.insert(TagRef::User(row.id), name.to_string());
                }
            }
        }

        Ok(names)
    }
}

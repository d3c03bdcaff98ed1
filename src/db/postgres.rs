use sqlx::{postgres::PgPoolOptions, PgPool};

/// Creates a PostgreSQL connection pool
///
/// Connections are established lazily: a missing or unreachable database
/// does not fail startup. Queries against a dead pool error at call time,
/// which the profile builder treats as an empty listening history.
pub fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy(database_url)?;

    Ok(pool)
}

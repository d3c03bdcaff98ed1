use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use encore_api::{
    config::Config,
    db::{self, PgEventStore},
    routes,
    services::catalog::LastFmClient,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let pool = db::postgres::create_pool(&config.database_url)?;
    let redis_client = db::create_redis_client(&config.redis_url)?;
    let cache = db::Cache::new(redis_client);

    let catalog = LastFmClient::new(
        cache,
        config.lastfm_api_key.clone(),
        config.lastfm_api_url.clone(),
    )?;

    let state = AppState {
        events: Arc::new(PgEventStore::new(pool)),
        catalog: Arc::new(catalog),
    };

    let app = routes::create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "encore-api listening");
    axum::serve(listener, app).await?;

    Ok(())
}

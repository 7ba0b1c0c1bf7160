use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use modhub_api::config::{AppConfig, StorageBackend};
use modhub_api::mailer::LogMailer;
use modhub_api::store::{MemoryStore, PgStore, Store};
use modhub_api::throttle::{LocalRateLimiter, RateLimiter, RedisRateLimiter};
use modhub_api::{build_router, AppState};
use modhub_shared::clients::db::create_pool;
use modhub_shared::clients::redis::RedisClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    modhub_shared::middleware::init_tracing("modhub-api");

    let config = AppConfig::load()?;
    let port = config.port;
    std::env::set_var("JWT_SECRET", &config.jwt_secret);

    let store: Arc<dyn Store> = match config.storage {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.db_pool_size)?;
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let redis = if config.redis_url.is_empty() {
        None
    } else {
        Some(RedisClient::connect(&config.redis_url).await?)
    };
    let limiter: Arc<dyn RateLimiter> = match &redis {
        Some(client) => Arc::new(RedisRateLimiter::new(client.clone())),
        None => {
            let local = Arc::new(LocalRateLimiter::new());
            let sweeper = Arc::clone(&local);
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(Duration::from_secs(60));
                loop {
                    tick.tick().await;
                    sweeper.cleanup();
                }
            });
            local
        }
    };

    let metrics = match modhub_shared::middleware::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed");
            None
        }
    };

    let state = Arc::new(AppState {
        store,
        config,
        limiter,
        mailer: Arc::new(LogMailer),
        redis,
        metrics,
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "modhub-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

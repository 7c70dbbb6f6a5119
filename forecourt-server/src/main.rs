use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{header::CONTENT_TYPE, Method};
use forecourt::clock::{Clock, SystemClock};
use forecourt::rate_limit::{Buckets, InMemoryWindowStore, RateLimiter, SlidingWindowLimiter};
use forecourt::{AppState, InMemoryInventoryStore, InventoryQueryService, ServerConfig};
use forecourt_redis::RedisWindowStore;
use tokio::net::TcpListener;
use tokio::signal::{self, ctrl_c};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = ServerConfig::from_env().context("invalid environment configuration")?;
    info!(target: "forecourt::server", ?config, "configuration loaded");

    let inventory = load_inventory(&config).await?;
    let service = InventoryQueryService::new(Arc::new(inventory))
        .with_store_timeout(config.store_timeout);

    let limiter = build_limiter(&config).await?;
    let buckets = Buckets::default()
        .with_failure_policy(config.rate_limit_failure)
        .with_general_forms(config.general_forms.iter().cloned());
    let state = AppState::new(service, limiter).with_buckets(buckets);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    // The admin router is left unmounted; it needs an authentication layer in front of it.
    let app = forecourt::router(state).layer(cors);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(target: "forecourt::server", address = %config.bind, "server running");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!(target: "forecourt::server", "server stopped");
    Ok(())
}

async fn load_inventory(config: &ServerConfig) -> anyhow::Result<InMemoryInventoryStore> {
    let Some(path) = &config.seed_path else {
        warn!(target: "forecourt::server", "no seed file configured, inventory is empty");
        return Ok(InMemoryInventoryStore::new());
    };
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let store = InMemoryInventoryStore::from_json(&bytes)
        .with_context(|| format!("invalid seed file {}", path.display()))?;
    info!(target: "forecourt::server", listings = store.len(), "inventory seeded");
    Ok(store)
}

async fn build_limiter(config: &ServerConfig) -> anyhow::Result<Arc<dyn RateLimiter>> {
    if let Some(url) = &config.redis_url {
        let store = RedisWindowStore::connect(url).await.context("failed to connect to redis")?;
        let limiter = SlidingWindowLimiter::new(store).with_store_timeout(config.store_timeout);
        return Ok(Arc::new(limiter));
    }

    let store = Arc::new(InMemoryWindowStore::new());
    let sweeper = store.clone();
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticks.tick().await;
            let removed = sweeper.sweep(SystemClock.now_millis());
            if removed > 0 {
                tracing::debug!(target: "forecourt::server", removed, "swept idle rate limit keys");
            }
        }
    });
    let limiter = SlidingWindowLimiter::from_shared(store).with_store_timeout(config.store_timeout);
    Ok(Arc::new(limiter))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!(target: "forecourt::server", error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!(target: "forecourt::server", "received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!(target: "forecourt::server", "received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(target: "forecourt::server", error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Router, middleware,
    routing::{any, get},
};

use faultline_core::backend::{ApiKeyStore, RateLimiter, ReportStore, StatsCache};
use faultline_core::config::{JwtConfig, RateLimitConfig};
use faultline_core::effects::{EffectDispatcher, EffectTargets, LogEscalator};
use faultline_core::models::Environment;
use faultline_core::{MemoryStatsCache, ServiceConfig, SqliteStateStore};

mod auth;
mod dto;
mod effects;
mod error;
mod gateway;
mod handlers;
mod security;

#[cfg(test)]
mod tests;

pub use effects::BackgroundDispatcher;

const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct WebState {
    pub(crate) store: Arc<dyn ReportStore>,
    pub(crate) cache: Arc<dyn StatsCache>,
    pub(crate) rate_limiter: Arc<dyn RateLimiter>,
    pub(crate) api_keys: Arc<dyn ApiKeyStore>,
    pub(crate) effects: Arc<dyn EffectDispatcher>,
    pub(crate) rate_limit: RateLimitConfig,
    pub(crate) stats_cache_ttl: Duration,
    pub(crate) jwt: Option<Arc<JwtConfig>>,
    pub(crate) environment: Environment,
}

impl WebState {
    /// Wire the SQLite store into every storage-backed collaborator slot.
    pub fn new(
        store: SqliteStateStore,
        effects: Arc<dyn EffectDispatcher>,
        config: &ServiceConfig,
    ) -> Self {
        let store = Arc::new(store);
        Self {
            store: store.clone(),
            cache: Arc::new(MemoryStatsCache::new()),
            rate_limiter: store.clone(),
            api_keys: store,
            effects,
            rate_limit: config.rate_limit,
            stats_cache_ttl: config.stats_cache_ttl,
            jwt: config.jwt.clone().map(Arc::new),
            environment: config.environment,
        }
    }
}

/// Audit rows go to the store; critical alerts go to the log.
#[must_use]
pub fn default_effect_targets(store: &SqliteStateStore) -> EffectTargets {
    EffectTargets::new(Arc::new(store.clone()), Arc::new(LogEscalator))
}

/// Start the HTTP gateway and block until shutdown.
///
/// # Errors
/// Returns an error when the database cannot be opened, the runtime cannot be
/// created, the socket cannot be bound, or the server exits with a failure.
pub fn serve_web(config: &ServiceConfig) -> Result<()> {
    let store = SqliteStateStore::open(&config.db_path).with_context(|| {
        format!(
            "failed to open state database at {}",
            config.db_path.display()
        )
    })?;
    let bind_addr = config.bind_addr();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build web runtime")?;

    runtime.block_on(async move {
        let (dispatcher, worker) = BackgroundDispatcher::spawn(
            default_effect_targets(&store),
            config.effect_queue_capacity,
        );
        let state = WebState::new(store, Arc::new(dispatcher), config);

        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind web server at {bind_addr}"))?;
        tracing::info!(
            addr = %listener.local_addr()?,
            environment = config.environment.as_str(),
            "faultline gateway listening"
        );

        axum::serve(listener, app_router(state))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .context("web server failed")?;

        match tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await {
            Ok(joined) => joined.context("side effect worker failed")?,
            Err(_) => tracing::warn!("side effect worker did not drain before shutdown"),
        }
        Ok(())
    })
}

pub fn app_router(state: WebState) -> Router {
    Router::new()
        .route("/error-reports", any(handlers::error_reports))
        .route("/health", get(handlers::health))
        .layer(middleware::from_fn(security::security_headers_middleware))
        .with_state(state)
}

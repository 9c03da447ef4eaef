use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use chrono::Utc;
use tokio::signal;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tracing::{debug, error, info, warn};

use crate::cache::ResultCache;
use crate::error::{ApiError, ApiResult};
use crate::metrics;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ResultCache>,
    pub refresh_interval: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health))
        .layer(Extension(state))
}

async fn health() -> &'static str {
    "OK"
}

/// Serves the cached result only; never triggers a collection.
async fn metrics_handler(Extension(state): Extension<AppState>) -> ApiResult<Response> {
    let Some(entry) = state.cache.snapshot().await else {
        debug!("no cached usage data available");
        return Err(ApiError::Unavailable);
    };

    if entry.is_stale_at(state.refresh_interval, Utc::now()) {
        warn!(refreshed_at = %entry.refreshed_at, "serving stale usage data");
    }

    let body = metrics::render(&entry.result).map_err(|err| {
        error!(?err, "failed to render usage metrics");
        ApiError::Message("failed to render metrics".to_string())
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, metrics::CONTENT_TYPE)],
        body,
    )
        .into_response())
}

/// Binds `addr` and serves until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(%addr, "listening for metrics scrapes");
    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
pub async fn wait_for_shutdown() {
    match unix_signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("received SIGINT, shutting down");
                },
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                },
            }
        }
        Err(err) => {
            warn!(%err, "could not register SIGTERM handler, using SIGINT only");
            if let Err(err) = signal::ctrl_c().await {
                error!(%err, "failed waiting for SIGINT");
            } else {
                info!("received SIGINT, shutting down");
            }
        }
    }
}

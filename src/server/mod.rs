mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::position::quota::run_daily_reset;
use crate::position::PositionResolver;

pub fn build_router(resolver: PositionResolver) -> Router {
    let state = Arc::new(AppState { resolver });

    Router::new()
        .route("/api/position", post(handlers::position))
        .route("/api/quota", get(handlers::quota))
        .route("/api/quota/reset", post(handlers::quota_reset))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl+C, resetting the quota at every local midnight.
pub async fn start(resolver: PositionResolver, host: &str, port: u16) -> std::io::Result<()> {
    let reset_task = tokio::spawn(run_daily_reset(resolver.quota_handle()));

    let app = build_router(resolver);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("position resolver listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    reset_task.abort();
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

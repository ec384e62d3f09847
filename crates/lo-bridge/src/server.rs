use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::router::handle_interaction;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the service router: the signed interaction endpoint plus a
/// liveness route for the deployment's own probes.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/interactions", post(handle_interaction))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({"status": "ok", "service": "lodge-ops"}))
}

/// Bind `addr` and serve until a shutdown signal arrives.
pub async fn serve(state: Arc<AppState>, addr: &str) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "lodge-ops listening");
    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received");
}

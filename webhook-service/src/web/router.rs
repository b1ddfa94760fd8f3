//! Route table and HTTP middleware.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers::{health, root, stats, webhook, AppState};

/// Build the service router.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_request_size;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/webhook", post(webhook))
        .route("/webhook/telegram", post(webhook))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

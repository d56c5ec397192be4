//! HTTP routes for the background removal service

pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::core::types::AppState;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_request_body_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/remove-bg", post(handlers::remove_background))
        .route("/remove-bg/batch", post(handlers::submit_batch))
        .route("/queue-status/:batch_id", get(handlers::queue_status))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
}

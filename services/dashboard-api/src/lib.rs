//! Dashboard API Service Library
//!
//! HTTP surface for the urban layers dashboard. The UI posts a snapshot of
//! its widget values and receives the rendered layers and statistics.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod handlers;
pub mod state;

use state::AppState;

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Dashboard
        .route("/api/pass", post(handlers::pass::pass_handler))
        .route("/api/layers", get(handlers::layers::layers_handler))
        .route("/api/config", get(handlers::layers::config_handler))
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/ready", get(handlers::health::ready_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}

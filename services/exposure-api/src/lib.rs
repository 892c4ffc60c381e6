//! Exposure API service.
//!
//! HTTP front end for the tiled-grid simulation scheduler: one `POST` route
//! per metric, session cancellation, and monitoring endpoints.

pub mod cleanup;
pub mod handlers;
pub mod kernels;
pub mod metrics;
pub mod obstructions;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub use state::AppState;

/// Build the service router.
pub fn app(state: Arc<AppState>, prometheus: PrometheusHandle) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_handler))
        // Metrics
        .route("/metrics", get(handlers::metrics_handler))
        // API endpoints
        .route("/api/stats", get(handlers::stats_handler))
        .route("/api/sessions", get(handlers::list_sessions_handler))
        .route(
            "/sessions/:id/cancel",
            post(handlers::cancel_session_handler),
        )
        // Simulation endpoints: /solar, /sky, /uhi, /wind
        .route("/:metric", post(handlers::simulation_handler))
        // Layer extensions
        .layer(Extension(state))
        .layer(Extension(prometheus))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}

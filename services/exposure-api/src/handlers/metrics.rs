//! Health checks, metrics, and monitoring endpoints.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use grid_scheduler::SchedulerStats;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::metrics::RequestMetricsSnapshot;
use crate::state::AppState;

// ============================================================================
// Health Checks
// ============================================================================

/// GET /health - Basic health check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// ============================================================================
// Prometheus Metrics
// ============================================================================

/// GET /metrics - Prometheus metrics endpoint
pub async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}

// ============================================================================
// Stats API
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub scheduler: SchedulerStats,
    pub requests: RequestMetricsSnapshot,
}

/// GET /api/stats - Worker pool, tile cache and request statistics
pub async fn stats_handler(Extension(state): Extension<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        scheduler: state.scheduler.stats(),
        requests: state.metrics.snapshot().await,
    })
}

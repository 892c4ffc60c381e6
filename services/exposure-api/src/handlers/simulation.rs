//! Simulation endpoints: `POST /{metric}`.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use exposure_common::{Boundary, Metric};
use grid_scheduler::{SchedulerError, SimulationRequest};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::common::{error_response, format_runtime};
use crate::metrics::RequestOutcome;
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationBody {
    /// Boundary ring as `[lon, lat]` pairs.
    pub bounds: Vec<[f64; 2]>,
    /// Cell size in meters.
    pub grid_size: f64,
    /// Client-chosen session id, usable for cancellation.
    #[serde(default)]
    pub session: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResponse {
    pub result: Vec<f64>,
    pub result_index: Vec<usize>,
    /// `[cols, rows]`
    pub dimension: [usize; 2],
    pub session: String,
    pub runtime: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /{metric}
///
/// If the client disconnects the request future is dropped, which aborts
/// the session through its guard.
#[instrument(skip(state, body))]
pub async fn simulation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(metric): Path<String>,
    body: Result<Json<SimulationBody>, JsonRejection>,
) -> Response {
    let metric = match Metric::from_str(&metric) {
        Ok(m) => m,
        Err(e) => return error_response(StatusCode::NOT_FOUND, e.to_string(), None),
    };
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text(), None)
        }
    };
    let boundary = match Boundary::new(body.bounds) {
        Ok(b) => b,
        Err(e) => {
            return error_response(
                StatusCode::from_u16(e.http_status_code()).unwrap_or(StatusCode::BAD_REQUEST),
                e.to_string(),
                body.session,
            )
        }
    };

    let started = Instant::now();
    let requested_session = body.session.clone();
    let result = state
        .scheduler
        .run(SimulationRequest {
            boundary,
            cell_size: body.grid_size,
            metric,
            session: body.session,
        })
        .await;
    let elapsed = started.elapsed();
    let elapsed_us = elapsed.as_micros() as u64;

    match result {
        Ok(outcome) => {
            state
                .metrics
                .record_request(metric, elapsed_us, RequestOutcome::Completed)
                .await;
            info!(
                metric = %metric,
                session = %outcome.session_id,
                cells = outcome.values.len(),
                computed = outcome.computed,
                duration_ms = elapsed.as_millis() as u64,
                "Simulation request complete"
            );
            Json(SimulationResponse {
                result: outcome.values,
                result_index: outcome.indices,
                dimension: [outcome.cols, outcome.rows],
                session: outcome.session_id,
                runtime: format_runtime(elapsed),
            })
            .into_response()
        }
        Err(SchedulerError::Cancelled(session)) => {
            state
                .metrics
                .record_request(metric, elapsed_us, RequestOutcome::Cancelled)
                .await;
            info!(metric = %metric, session = %session, "Simulation request cancelled");
            error_response(
                StatusCode::OK,
                format!("session {} was cancelled", session),
                Some(session),
            )
        }
        Err(e) => {
            state
                .metrics
                .record_request(metric, elapsed_us, RequestOutcome::Failed)
                .await;
            let status =
                StatusCode::from_u16(e.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if e.is_client_error() {
                info!(metric = %metric, error = %e, "Simulation request rejected");
            } else {
                warn!(metric = %metric, error = %e, "Simulation request failed");
            }
            error_response(status, e.to_string(), requested_session)
        }
    }
}

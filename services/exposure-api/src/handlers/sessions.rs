//! Session listing and cancellation.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use grid_scheduler::ActiveSession;
use serde::Serialize;
use tracing::{info, instrument};

use super::common::error_response;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub session: String,
    pub cancelled: bool,
}

/// GET /api/sessions
pub async fn list_sessions_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<Vec<ActiveSession>> {
    Json(state.scheduler.sessions().list())
}

/// POST /sessions/:id/cancel
#[instrument(skip(state))]
pub async fn cancel_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    if state.scheduler.cancel(&id) {
        info!(session = %id, "Session cancelled by client");
        Json(CancelResponse {
            session: id,
            cancelled: true,
        })
        .into_response()
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            format!("session {} is not active", id),
            Some(id),
        )
    }
}

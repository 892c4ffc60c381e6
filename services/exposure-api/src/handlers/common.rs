//! Shared response helpers.

use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;

/// Error body: `result` is always `null` so clients can test one field.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub result: Option<Vec<f64>>,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

pub fn error_response(status: StatusCode, error: impl Into<String>, session: Option<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            result: None,
            error: error.into(),
            session,
        }),
    )
        .into_response()
}

/// Human-readable duration: `"42s"` under a minute, `"3m7s"` above.
pub fn format_runtime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64().round() as u64;
    if secs > 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

//! HTTP-level tests for the exposure API router.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use exposure_api::{app, AppState};
use grid_scheduler::NoObstructions;
use metrics_exporter_prometheus::PrometheusBuilder;
use projection::Planar;
use serde_json::{json, Value};
use tempfile::TempDir;
use test_utils::{kernels_for_all, test_config, CountingKernel};
use tower::ServiceExt;

fn test_app() -> (TempDir, Arc<CountingKernel>, Router) {
    let dir = tempfile::tempdir().unwrap();
    let kernel = Arc::new(CountingKernel::new());
    let state = AppState::new(
        test_config(dir.path()),
        Arc::new(Planar),
        Arc::new(NoObstructions),
        kernels_for_all(kernel.clone()),
    )
    .unwrap();
    let prometheus = PrometheusBuilder::new().build_recorder().handle();
    (dir, kernel, app(Arc::new(state), prometheus))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Simulation endpoint
// ============================================================================

#[tokio::test]
async fn test_simulation_returns_grid_result() {
    let (_dir, kernel, app) = test_app();

    let response = app
        .oneshot(post_json(
            "/sky",
            json!({
                "bounds": [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
                "gridSize": 5.0,
                "session": "http-session"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["dimension"], json!([2, 2]));
    assert_eq!(body["resultIndex"], json!([0, 1, 2, 3]));
    assert_eq!(body["result"].as_array().unwrap().len(), 4);
    assert_eq!(body["result"][0], json!(2502.5));
    assert_eq!(body["session"], "http-session");
    assert!(body["runtime"].as_str().unwrap().ends_with('s'));
    assert_eq!(kernel.points(), 4);
}

#[tokio::test]
async fn test_metric_route_is_case_insensitive() {
    let (_dir, _kernel, app) = test_app();

    let response = app
        .oneshot(post_json(
            "/WIND",
            json!({
                "bounds": [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]],
                "gridSize": 2.0
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["dimension"], json!([2, 2]));
}

#[tokio::test]
async fn test_degenerate_bounds_rejected() {
    let (_dir, kernel, app) = test_app();

    let response = app
        .oneshot(post_json(
            "/sky",
            json!({"bounds": [[0.0, 0.0], [10.0, 0.0]], "gridSize": 5.0}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["result"].is_null());
    assert!(body["error"].is_string());
    assert_eq!(kernel.calls(), 0);
}

#[tokio::test]
async fn test_invalid_cell_size_rejected() {
    let (_dir, _kernel, app) = test_app();

    let response = app
        .oneshot(post_json(
            "/sky",
            json!({
                "bounds": [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
                "gridSize": 0.0
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["result"].is_null());
}

#[tokio::test]
async fn test_oversized_grid_rejected() {
    for grid_size in [1e-6, 0.1] {
        let (_dir, kernel, app) = test_app();

        let response = app
            .oneshot(post_json(
                "/uhi",
                json!({
                    "bounds": [[0.0, 0.0], [1000.0, 0.0], [1000.0, 1000.0], [0.0, 1000.0]],
                    "gridSize": grid_size
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["result"].is_null());
        assert_eq!(kernel.calls(), 0);
    }
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let (_dir, _kernel, app) = test_app();

    let response = app
        .oneshot(post_json("/sky", json!({"gridSize": 5.0})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["result"].is_null());
}

#[tokio::test]
async fn test_unknown_metric_not_found() {
    let (_dir, _kernel, app) = test_app();

    let response = app
        .oneshot(post_json(
            "/noise",
            json!({
                "bounds": [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
                "gridSize": 5.0
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_json(response).await["result"].is_null());
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_cancel_unknown_session_not_found() {
    let (_dir, _kernel, app) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions/nobody/cancel")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["session"], "nobody");
}

#[tokio::test]
async fn test_list_sessions_empty_when_idle() {
    let (_dir, _kernel, app) = test_app();

    let response = app.oneshot(get("/api/sessions")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

// ============================================================================
// Monitoring
// ============================================================================

#[tokio::test]
async fn test_health() {
    let (_dir, _kernel, app) = test_app();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_stats_reports_requests() {
    let (_dir, _kernel, app) = test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/solar",
            json!({
                "bounds": [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
                "gridSize": 5.0
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["requests"]["requests"], 1);
    assert_eq!(body["requests"]["completed"], 1);
    assert_eq!(body["requests"]["by_metric"]["solar"]["count"], 1);
    assert_eq!(body["scheduler"]["active_sessions"], 0);
}

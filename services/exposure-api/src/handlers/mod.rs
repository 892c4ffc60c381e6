//! HTTP request handlers.
//!
//! This module is organized into submodules:
//! - `simulation`: the per-metric simulation endpoints
//! - `sessions`: session listing and cancellation
//! - `metrics`: health checks, Prometheus metrics, and stats
//! - `common`: shared response helpers

pub mod common;
pub mod metrics;
pub mod sessions;
pub mod simulation;

pub use common::{error_response, format_runtime, ErrorResponse};
pub use metrics::{health_handler, metrics_handler, stats_handler};
pub use sessions::{cancel_session_handler, list_sessions_handler};
pub use simulation::{simulation_handler, SimulationBody, SimulationResponse};

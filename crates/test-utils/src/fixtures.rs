//! Common test fixtures for scheduler tests.
//!
//! Boundaries here are in planar meters and are meant to be used with the
//! identity projection.

use std::path::Path;
use std::sync::Arc;

use exposure_common::{Boundary, Metric};
use grid_scheduler::{
    KernelRegistry, NoObstructions, ObstructionProvider, Scheduler, SchedulerConfig,
    SimulationKernel, SimulationRequest,
};
use projection::Planar;

/// Axis-aligned square from `(min, min)` to `(max, max)`.
pub fn square(min: f64, max: f64) -> Boundary {
    rectangle(min, min, max, max)
}

pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Boundary {
    Boundary::new(vec![
        [min_x, min_y],
        [max_x, min_y],
        [max_x, max_y],
        [min_x, max_y],
    ])
    .expect("valid rectangle")
}

/// L-shaped boundary covering `[0, 20] x [0, 20]` minus the upper-right
/// `[10, 20] x [10, 20]` quadrant.
pub fn l_shape() -> Boundary {
    Boundary::new(vec![
        [0.0, 0.0],
        [20.0, 0.0],
        [20.0, 10.0],
        [10.0, 10.0],
        [10.0, 20.0],
        [0.0, 20.0],
    ])
    .expect("valid L shape")
}

/// Configuration rooted in `dir` with small, deterministic limits.
pub fn test_config(dir: &Path) -> SchedulerConfig {
    SchedulerConfig {
        max_workers: 4,
        idle_timeout_ms: 1_000,
        cache_dir: dir.join("result"),
        workspace_dir: dir.join("temp"),
        ..SchedulerConfig::default()
    }
}

/// Scheduler over the identity projection with one kernel for every metric.
pub fn planar_scheduler(
    config: SchedulerConfig,
    kernel: Arc<dyn SimulationKernel>,
) -> Scheduler {
    planar_scheduler_with(config, kernel, Arc::new(NoObstructions))
}

pub fn planar_scheduler_with(
    config: SchedulerConfig,
    kernel: Arc<dyn SimulationKernel>,
    obstructions: Arc<dyn ObstructionProvider>,
) -> Scheduler {
    Scheduler::new(config, Arc::new(Planar), obstructions, kernels_for_all(kernel))
        .expect("scheduler")
}

/// Registry with `kernel` behind every metric.
pub fn kernels_for_all(kernel: Arc<dyn SimulationKernel>) -> KernelRegistry {
    let mut kernels = KernelRegistry::new();
    for metric in Metric::ALL {
        kernels.register(metric, kernel.clone());
    }
    kernels
}

pub fn request(boundary: Boundary, cell_size: f64, metric: Metric) -> SimulationRequest {
    SimulationRequest {
        boundary,
        cell_size,
        metric,
        session: None,
    }
}

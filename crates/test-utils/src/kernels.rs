//! Instrumented kernels and obstruction providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use exposure_common::{BoundingBox, Coordinate};
use geo::polygon;
use grid_scheduler::{
    KernelError, Obstruction, ObstructionModel, ObstructionProvider, SimulationKernel,
};

/// Deterministic per-point value: `x * 1000 + y`.
pub fn coordinate_value(c: &Coordinate) -> f64 {
    c.x * 1000.0 + c.y
}

/// Returns [`coordinate_value`] for every point and counts its calls.
#[derive(Debug, Default)]
pub struct CountingKernel {
    calls: AtomicUsize,
    points: AtomicUsize,
}

impl CountingKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `execute` invocations.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Total points received over all calls.
    pub fn points(&self) -> usize {
        self.points.load(Ordering::SeqCst)
    }
}

impl SimulationKernel for CountingKernel {
    fn execute(
        &self,
        points: &[Coordinate],
        _model: &ObstructionModel,
        _cell_size: f64,
    ) -> Result<Option<Vec<f64>>, KernelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.points.fetch_add(points.len(), Ordering::SeqCst);
        Ok(Some(points.iter().map(coordinate_value).collect()))
    }
}

/// Fails any batch containing a point with `x` below `fail_below_x`.
#[derive(Debug)]
pub struct FailingKernel {
    pub fail_below_x: f64,
}

impl SimulationKernel for FailingKernel {
    fn execute(
        &self,
        points: &[Coordinate],
        _model: &ObstructionModel,
        _cell_size: f64,
    ) -> Result<Option<Vec<f64>>, KernelError> {
        if points.iter().any(|p| p.x < self.fail_below_x) {
            return Err(KernelError::Failed(format!(
                "point left of x={}",
                self.fail_below_x
            )));
        }
        Ok(Some(points.iter().map(coordinate_value).collect()))
    }
}

/// Sleeps for `delay` on every call.
#[derive(Debug)]
pub struct SlowKernel {
    pub delay: Duration,
    calls: AtomicUsize,
}

impl SlowKernel {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SimulationKernel for SlowKernel {
    fn execute(
        &self,
        points: &[Coordinate],
        _model: &ObstructionModel,
        _cell_size: f64,
    ) -> Result<Option<Vec<f64>>, KernelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok(Some(vec![1.0; points.len()]))
    }
}

/// Misbehaving kernel outputs.
#[derive(Debug, Clone, Copy)]
pub enum BrokenKernel {
    /// Reports the simulation as unavailable.
    Unavailable,
    /// Returns one value too few.
    ShortOutput,
}

impl SimulationKernel for BrokenKernel {
    fn execute(
        &self,
        points: &[Coordinate],
        _model: &ObstructionModel,
        _cell_size: f64,
    ) -> Result<Option<Vec<f64>>, KernelError> {
        match self {
            BrokenKernel::Unavailable => Ok(None),
            BrokenKernel::ShortOutput => {
                Ok(Some(vec![0.0; points.len().saturating_sub(1)]))
            }
        }
    }
}

/// Serves one fixed building and records every requested extent.
#[derive(Debug, Default)]
pub struct StaticObstructionProvider {
    requested: Mutex<Vec<BoundingBox>>,
}

impl StaticObstructionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requested(&self) -> Vec<BoundingBox> {
        self.requested.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ObstructionProvider for StaticObstructionProvider {
    async fn load(&self, extent: &BoundingBox) -> grid_scheduler::Result<ObstructionModel> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(*extent);
        }
        let footprint = polygon![
            (x: 2.0, y: 2.0),
            (x: 4.0, y: 2.0),
            (x: 4.0, y: 4.0),
            (x: 2.0, y: 4.0),
        ];
        Ok(ObstructionModel::new(*extent, vec![Obstruction::new(footprint, 15.0)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_kernel_counts() {
        let kernel = CountingKernel::new();
        let model = ObstructionModel::default();
        let out = kernel
            .execute(&[Coordinate::new(1.0, 2.0), Coordinate::new(3.0, 4.0)], &model, 1.0)
            .unwrap()
            .unwrap();
        assert_eq!(out, vec![1002.0, 3004.0]);
        assert_eq!(kernel.calls(), 1);
        assert_eq!(kernel.points(), 2);
    }

    #[test]
    fn test_failing_kernel() {
        let kernel = FailingKernel { fail_below_x: 5.0 };
        let model = ObstructionModel::default();
        assert!(kernel.execute(&[Coordinate::new(1.0, 0.0)], &model, 1.0).is_err());
        assert!(kernel.execute(&[Coordinate::new(6.0, 0.0)], &model, 1.0).is_ok());
    }

    #[test]
    fn test_static_provider_records_extent() {
        let provider = StaticObstructionProvider::new();
        let extent = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let model = tokio_test::block_on(provider.load(&extent)).unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(provider.requested(), vec![extent]);
    }
}

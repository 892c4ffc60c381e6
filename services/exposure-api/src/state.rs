//! Application state and shared resources.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use grid_scheduler::{
    KernelRegistry, NoObstructions, ObstructionProvider, Scheduler, SchedulerConfig,
};
use projection::{Projection, TransverseMercator};
use tracing::info;

use crate::kernels::reference_kernels;
use crate::metrics::MetricsCollector;
use crate::obstructions::GeoJsonObstructionProvider;

/// Shared application state.
pub struct AppState {
    pub scheduler: Scheduler,
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    pub fn new(
        config: SchedulerConfig,
        projection: Arc<dyn Projection>,
        obstructions: Arc<dyn ObstructionProvider>,
        kernels: KernelRegistry,
    ) -> Result<Self> {
        let scheduler = Scheduler::new(config, projection, obstructions, kernels)?;
        Ok(Self {
            scheduler,
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    /// Production wiring: site projection, reference kernels, and buildings
    /// from `buildings` when given.
    pub fn with_reference_kernels(config: SchedulerConfig, buildings: Option<&Path>) -> Result<Self> {
        let projection: Arc<dyn Projection> = Arc::new(TransverseMercator::site());
        let obstructions: Arc<dyn ObstructionProvider> = match buildings {
            Some(path) => Arc::new(GeoJsonObstructionProvider::from_path(
                path,
                projection.as_ref(),
            )?),
            None => {
                info!("No buildings file configured, simulating open terrain");
                Arc::new(NoObstructions)
            }
        };
        Self::new(config, projection, obstructions, reference_kernels())
    }
}

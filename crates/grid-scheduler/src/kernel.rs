//! Seams to the simulation kernels and the obstruction data source.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use exposure_common::{BoundingBox, Coordinate, Metric};
use geo::{BoundingRect, Polygon};
use serde::Serialize;

use crate::error::{KernelError, Result};

/// One extruded building footprint in planar meters.
#[derive(Debug, Clone)]
pub struct Obstruction {
    pub footprint: Polygon<f64>,
    /// Height above ground (meters).
    pub height: f64,
}

impl Obstruction {
    pub fn new(footprint: Polygon<f64>, height: f64) -> Self {
        Self { footprint, height }
    }

    /// Planar bounding box of the footprint.
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.footprint
            .bounding_rect()
            .map(|r| BoundingBox::new(r.min().x, r.min().y, r.max().x, r.max().y))
    }
}

/// Obstructions loaded once per session and shared by all its tasks.
#[derive(Debug, Clone, Default)]
pub struct ObstructionModel {
    pub extent: Option<BoundingBox>,
    pub buildings: Vec<Obstruction>,
}

impl ObstructionModel {
    pub fn new(extent: BoundingBox, buildings: Vec<Obstruction>) -> Self {
        Self {
            extent: Some(extent),
            buildings,
        }
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    /// Serializable copy written into the session workspace.
    pub fn snapshot(&self) -> ObstructionSnapshot {
        ObstructionSnapshot {
            extent: self.extent,
            buildings: self
                .buildings
                .iter()
                .map(|b| BuildingSnapshot {
                    height: b.height,
                    footprint: b.footprint.exterior().coords().map(|c| [c.x, c.y]).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ObstructionSnapshot {
    pub extent: Option<BoundingBox>,
    pub buildings: Vec<BuildingSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildingSnapshot {
    pub height: f64,
    pub footprint: Vec<[f64; 2]>,
}

/// Per-point metric computation.
///
/// Runs on a worker thread. Must return exactly one value per input point,
/// in input order, or `Ok(None)` when the simulation is unavailable for
/// this batch.
pub trait SimulationKernel: Send + Sync {
    fn execute(
        &self,
        points: &[Coordinate],
        model: &ObstructionModel,
        cell_size: f64,
    ) -> std::result::Result<Option<Vec<f64>>, KernelError>;
}

/// Supplies the obstructions inside an extent.
#[async_trait]
pub trait ObstructionProvider: Send + Sync {
    async fn load(&self, extent: &BoundingBox) -> Result<ObstructionModel>;
}

/// Provider for open terrain: never any obstructions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObstructions;

#[async_trait]
impl ObstructionProvider for NoObstructions {
    async fn load(&self, extent: &BoundingBox) -> Result<ObstructionModel> {
        Ok(ObstructionModel::new(*extent, Vec::new()))
    }
}

/// Kernels by metric.
#[derive(Clone, Default)]
pub struct KernelRegistry {
    kernels: HashMap<Metric, Arc<dyn SimulationKernel>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, metric: Metric, kernel: Arc<dyn SimulationKernel>) -> Self {
        self.register(metric, kernel);
        self
    }

    pub fn register(&mut self, metric: Metric, kernel: Arc<dyn SimulationKernel>) {
        self.kernels.insert(metric, kernel);
    }

    pub fn get(&self, metric: Metric) -> Option<Arc<dyn SimulationKernel>> {
        self.kernels.get(&metric).cloned()
    }

    pub fn metrics(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| self.kernels.contains_key(m))
            .collect()
    }
}

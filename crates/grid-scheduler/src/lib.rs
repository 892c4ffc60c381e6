//! Tiled-grid simulation scheduler.
//!
//! Turns a boundary polygon and a cell size into a planar grid, removes the
//! cells outside the boundary, runs a per-point simulation kernel over the
//! remaining cells on a bounded worker pool, and merges the results with the
//! tile cache so repeated requests are served from disk.
//!
//! ## Components
//!
//! - [`GridMapper`]: projects the boundary and aligns a grid to the cell size
//! - [`BoundaryFilter`]: keeps the cells whose center lies inside the boundary
//! - [`WorkerPool`]: first-come first-served execution with a global ceiling
//! - [`SessionManager`]: workspaces, cancellation and the orphan sweep
//! - [`ResultAssembler`]: ordered merge of computed and cached values
//! - [`Scheduler`]: drives one request through all of the above

pub mod assembler;
pub mod config;
pub mod error;
pub mod filter;
pub mod kernel;
pub mod mapper;
pub mod pool;
pub mod scheduler;
pub mod session;
pub mod sizing;
pub mod task;

pub use assembler::{AssembledResult, ResultAssembler};
pub use config::SchedulerConfig;
pub use error::{KernelError, Result, SchedulerError};
pub use filter::{BoundaryFilter, OffsetContains, PointInPolygon};
pub use kernel::{
    KernelRegistry, NoObstructions, Obstruction, ObstructionModel, ObstructionProvider,
    SimulationKernel,
};
pub use mapper::{GridMapper, MappedBoundary};
pub use pool::{Phase, PoolStatsSnapshot, WorkerPool};
pub use scheduler::{Scheduler, SchedulerStats, SimulationOutcome, SimulationRequest};
pub use session::{ActiveSession, SessionCounts, SessionGuard, SessionManager, SweepStats};

//! The simulation scheduler.
//!
//! ```text
//! SimulationRequest
//!      │
//!      ▼
//! GridMapper::compute_grid ──► invalid input: reject, nothing scheduled
//!      │
//!      ▼
//! SessionManager::start (workspace + cancellation token)
//!      │
//!      ▼
//! TileCacheStore::warm ──► split cells into cache misses / hits by index
//!      │
//!      ├─► filter pass over misses  (WorkerPool)
//!      ├─► filter pass over hits    (WorkerPool)
//!      │
//!      ▼
//! ObstructionProvider::load ──► obstructions.json in workspace
//!      │
//!      ▼
//! kernel pass over filtered misses  (WorkerPool)
//!      │
//!      ├─► cancelled? discard everything, no cache write
//!      ▼
//! ResultAssembler::merge ──► TileCacheStore::flush_while (stops on cancel)
//!      │
//!      ├─► cancelled? report Cancelled
//!      ▼
//! SessionGuard::complete
//! ```

use std::sync::Arc;
use std::time::Instant;

use exposure_common::{Boundary, Coordinate, ExposureError, GridSpec, Metric};
use projection::Projection;
use serde::Serialize;
use tile_cache::{TileCacheStatsSnapshot, TileCacheStore, TileSet};
use tracing::{info, instrument};

use crate::assembler::ResultAssembler;
use crate::config::SchedulerConfig;
use crate::error::{KernelError, Result, SchedulerError};
use crate::filter::{BoundaryFilter, OffsetContains, PointInPolygon};
use crate::kernel::{KernelRegistry, ObstructionProvider, SimulationKernel};
use crate::mapper::{GridMapper, MappedBoundary};
use crate::pool::{Phase, PoolStatsSnapshot, WorkerPool};
use crate::session::{SessionCounts, SessionGuard, SessionManager};
use crate::sizing::{batch_ranges, execution_batch_count, initial_batch_count};
use crate::task::{
    concat_exec, concat_filter, Candidate, ExecOutput, ExecTask, FilterOutput, FilterTask,
};

/// Name of the obstruction snapshot written into each workspace.
pub const OBSTRUCTIONS_FILE: &str = "obstructions.json";

/// One simulation request.
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    pub boundary: Boundary,
    /// Cell size in meters.
    pub cell_size: f64,
    pub metric: Metric,
    /// Client-chosen session id.
    pub session: Option<String>,
}

/// Result of a completed request.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutcome {
    pub session_id: String,
    /// Computed values followed by cached values.
    pub values: Vec<f64>,
    /// Grid index of each value.
    pub indices: Vec<usize>,
    pub cols: usize,
    pub rows: usize,
    /// Cells the kernel produced this run.
    pub computed: usize,
    /// Cells served from the cache.
    pub cache_hits: usize,
}

/// Combined pool and cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub pool: PoolStatsSnapshot,
    pub cache: TileCacheStatsSnapshot,
    pub active_sessions: usize,
    pub sessions: SessionCounts,
}

/// Owns the worker pool, the session table and the tile cache.
pub struct Scheduler {
    config: SchedulerConfig,
    mapper: GridMapper,
    membership: Arc<dyn PointInPolygon>,
    pool: WorkerPool,
    sessions: Arc<SessionManager>,
    cache: TileCacheStore,
    obstructions: Arc<dyn ObstructionProvider>,
    kernels: KernelRegistry,
}

impl Scheduler {
    /// Build a scheduler, opening the cache and workspace roots.
    pub fn new(
        config: SchedulerConfig,
        projection: Arc<dyn Projection>,
        obstructions: Arc<dyn ObstructionProvider>,
        kernels: KernelRegistry,
    ) -> Result<Self> {
        config.validate().map_err(SchedulerError::Config)?;

        let cache = TileCacheStore::open(
            &config.cache_dir,
            config.tile_span,
            config.tile_memory_capacity,
        )?;
        let sessions = Arc::new(SessionManager::new(&config.workspace_dir)?);

        info!(
            max_workers = config.max_workers,
            tile_span = config.tile_span,
            metrics = ?kernels.metrics(),
            "Scheduler initialized"
        );

        Ok(Self {
            mapper: GridMapper::new(projection).with_max_cells(config.max_grid_cells),
            membership: Arc::new(OffsetContains),
            pool: WorkerPool::new(config.max_workers),
            sessions,
            cache,
            obstructions,
            kernels,
            config,
        })
    }

    /// Replace the point-in-polygon test used by the boundary filter.
    pub fn with_membership(mut self, membership: Arc<dyn PointInPolygon>) -> Self {
        self.membership = membership;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn cache(&self) -> &TileCacheStore {
        &self.cache
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            pool: self.pool.snapshot(),
            cache: self.cache.stats().snapshot(),
            active_sessions: self.sessions.list().len(),
            sessions: self.sessions.counts(),
        }
    }

    /// Cancel a running session. Returns `false` if it is not active.
    pub fn cancel(&self, session_id: &str) -> bool {
        self.sessions.cancel(session_id)
    }

    /// Run one simulation request to completion.
    ///
    /// Invalid input is rejected before a session exists. Any failure after
    /// that aborts the session; if the session was cancelled the error is
    /// reported as [`SchedulerError::Cancelled`].
    #[instrument(skip(self, request), fields(metric = %request.metric, cell_size = request.cell_size))]
    pub async fn run(&self, request: SimulationRequest) -> Result<SimulationOutcome> {
        let started = Instant::now();

        let kernel = self
            .kernels
            .get(request.metric)
            .ok_or_else(|| ExposureError::UnknownMetric(request.metric.to_string()))?;
        let mapped = self.mapper.compute_grid(&request.boundary, request.cell_size)?;

        let session = self.sessions.start(request.session.as_deref())?;
        let outcome = match self.simulate(&session, &request, &mapped, kernel).await {
            Ok(outcome) => outcome,
            Err(_) if session.is_cancelled() => {
                return Err(SchedulerError::Cancelled(session.id().to_string()));
            }
            Err(e) => {
                session.fail(&e);
                return Err(e);
            }
        };
        session.complete();

        metrics::histogram!("exposure_request_duration_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        info!(
            session = %outcome.session_id,
            computed = outcome.computed,
            cache_hits = outcome.cache_hits,
            duration_ms = started.elapsed().as_millis() as u64,
            "Simulation complete"
        );
        Ok(outcome)
    }

    async fn simulate(
        &self,
        session: &SessionGuard,
        request: &SimulationRequest,
        mapped: &MappedBoundary,
        kernel: Arc<dyn SimulationKernel>,
    ) -> Result<SimulationOutcome> {
        let grid = mapped.grid;
        let mut tiles = self.cache.warm(request.metric, &grid).await?;

        // Filter pass
        let total = grid.len();
        let batch_count = initial_batch_count(total, self.config.parallelism_for(grid.cell_size));
        let (miss_tasks, hit_tasks) = split_by_cache(&grid, &tiles, batch_count);

        let filter = Arc::new(BoundaryFilter::new(
            &mapped.ring,
            grid.cell_size,
            self.membership.clone(),
        ));
        let misses = self.filter_phase(session, Phase::FilterMiss, miss_tasks, &filter).await?;
        let hits = self.filter_phase(session, Phase::FilterHit, hit_tasks, &filter).await?;

        info!(
            session = %session.id(),
            cells = total,
            batches = batch_count,
            to_compute = misses.kept.len(),
            cached = hits.kept.len(),
            "Boundary filter complete"
        );

        // Execution pass
        let computed = if misses.kept.is_empty() {
            ExecOutput::default()
        } else {
            self.execute_phase(session, request, batch_count, &grid, misses, kernel)
                .await?
        };

        if session.is_cancelled() {
            return Err(SchedulerError::Cancelled(session.id().to_string()));
        }

        // Assembly
        let cached_values = hits.kept.iter().filter_map(|c| c.cached).collect::<Vec<_>>();
        let (assembled, flushed) = ResultAssembler::new(&self.cache)
            .with_cancellation(session.token())
            .merge(
                &grid,
                &mut tiles,
                (computed.values, computed.indices),
                (cached_values, hits.indices),
            )
            .await?;

        // a cancel may land while tiles are being written
        if session.is_cancelled() {
            return Err(SchedulerError::Cancelled(session.id().to_string()));
        }

        let computed_count = assembled.computed;
        let cache_hits = assembled.len() - computed_count;
        metrics::counter!("exposure_cells_computed_total").increment(computed_count as u64);
        metrics::counter!("exposure_cache_hits_total").increment(cache_hits as u64);
        info!(
            session = %session.id(),
            tiles_written = flushed.tiles,
            cells_written = flushed.cells,
            "Results assembled"
        );

        Ok(SimulationOutcome {
            session_id: session.id().to_string(),
            values: assembled.values,
            indices: assembled.indices,
            cols: grid.cols,
            rows: grid.rows,
            computed: computed_count,
            cache_hits,
        })
    }

    async fn filter_phase(
        &self,
        session: &SessionGuard,
        phase: Phase,
        tasks: Vec<FilterTask>,
        filter: &Arc<BoundaryFilter>,
    ) -> Result<FilterOutput> {
        let filter = filter.clone();
        let outputs = self
            .pool
            .run_all(session.id(), phase, tasks, session.token(), move |task| {
                Ok(filter.filter_batch(task))
            })
            .await?;
        Ok(concat_filter(outputs))
    }

    async fn execute_phase(
        &self,
        session: &SessionGuard,
        request: &SimulationRequest,
        batch_count: usize,
        grid: &GridSpec,
        misses: FilterOutput,
        kernel: Arc<dyn SimulationKernel>,
    ) -> Result<ExecOutput> {
        let extent = grid.extent().expand(self.config.obstruction_margin_m);
        let model = Arc::new(self.obstructions.load(&extent).await?);
        session.workspace().write_json(OBSTRUCTIONS_FILE, &model.snapshot())?;

        let filtered = misses.kept.len();
        let exec_count = execution_batch_count(
            filtered,
            batch_count,
            self.config.max_points_for(request.metric),
        );
        let half = grid.cell_size / 2.0;
        let tasks: Vec<ExecTask> = batch_ranges(filtered, exec_count)
            .into_iter()
            .map(|range| ExecTask {
                points: misses.kept[range.clone()]
                    .iter()
                    .map(|c| Coordinate::new(c.coord.x + half, c.coord.y + half))
                    .collect(),
                indices: misses.indices[range].to_vec(),
            })
            .collect();

        info!(
            session = %session.id(),
            tasks = tasks.len(),
            points = filtered,
            obstructions = model.len(),
            "Dispatching kernel tasks"
        );

        let cell_size = grid.cell_size;
        let outputs = self
            .pool
            .run_all(session.id(), Phase::Execute, tasks, session.token(), move |task| {
                let values = kernel
                    .execute(&task.points, &model, cell_size)?
                    .ok_or(KernelError::Unavailable)?;
                if values.len() != task.points.len() {
                    return Err(KernelError::OutputMismatch {
                        expected: task.points.len(),
                        got: values.len(),
                    });
                }
                Ok(ExecOutput {
                    values,
                    indices: task.indices,
                })
            })
            .await?;

        Ok(concat_exec(outputs))
    }
}

/// Build the two filter task lists. Each task covers one contiguous index
/// range; a cell appears as a live slot in exactly one of the two lists.
fn split_by_cache(
    grid: &GridSpec,
    tiles: &TileSet,
    batch_count: usize,
) -> (Vec<FilterTask>, Vec<FilterTask>) {
    let mut misses = Vec::new();
    let mut hits = Vec::new();

    for range in batch_ranges(grid.len(), batch_count) {
        let start = range.start;
        let mut miss_slots = Vec::with_capacity(range.len());
        let mut hit_slots = Vec::with_capacity(range.len());

        for idx in range {
            let coord = grid.cell_coord(idx);
            let (gx, gy) = grid.global_cell(idx);
            match tiles.get(gx, gy) {
                Some(value) => {
                    miss_slots.push(None);
                    hit_slots.push(Some(Candidate {
                        coord,
                        cached: Some(value),
                    }));
                }
                None => {
                    miss_slots.push(Some(Candidate { coord, cached: None }));
                    hit_slots.push(None);
                }
            }
        }

        let miss_task = FilterTask {
            start,
            slots: miss_slots,
        };
        if miss_task.candidates() > 0 {
            misses.push(miss_task);
        }
        let hit_task = FilterTask {
            start,
            slots: hit_slots,
        };
        if hit_task.candidates() > 0 {
            hits.push(hit_task);
        }
    }

    (misses, hits)
}

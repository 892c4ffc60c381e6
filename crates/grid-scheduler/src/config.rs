//! Configuration for the grid scheduler.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use exposure_common::Metric;

/// Default parallelism per cell size (meters -> target task count).
pub const DEFAULT_PARALLELISM_TABLE: &str = "10:40,5:60,2:128,1:128";

/// Default cell ceiling per request (2 km square at 1 m).
pub const DEFAULT_MAX_GRID_CELLS: usize = 4_000_000;

/// Configuration for the grid scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of tasks executing at once.
    pub max_workers: usize,

    /// How long an idle worker thread is kept before release.
    pub idle_timeout_ms: u64,

    /// Cells per side of a cache tile.
    pub tile_span: usize,

    /// Number of cache tiles kept in memory.
    pub tile_memory_capacity: usize,

    /// Age after which an orphaned workspace is swept.
    pub retention_window_ms: u64,

    /// Root directory of cache tile files.
    pub cache_dir: PathBuf,

    /// Root directory of session workspaces.
    pub workspace_dir: PathBuf,

    /// Target task count per cell size, as `(cell_size, parallelism)` pairs.
    pub parallelism: Vec<(f64, usize)>,

    /// Target task count for cell sizes missing from the table.
    pub default_parallelism: usize,

    /// Upper bound on points per execution task, per metric.
    pub max_points_per_task: HashMap<Metric, usize>,

    /// Margin around the grid extent when loading obstructions (meters).
    pub obstruction_margin_m: f64,

    /// Largest grid a single request may lay out, in cells.
    pub max_grid_cells: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get(),
            idle_timeout_ms: 60_000,
            tile_span: 200,
            tile_memory_capacity: 64,
            retention_window_ms: 3_600_000,
            cache_dir: PathBuf::from("result"),
            workspace_dir: PathBuf::from("temp"),
            parallelism: parse_parallelism_table(DEFAULT_PARALLELISM_TABLE).unwrap_or_default(),
            default_parallelism: 60,
            max_points_per_task: Metric::ALL.iter().map(|m| (*m, 200)).collect(),
            obstruction_margin_m: 350.0,
            max_grid_cells: DEFAULT_MAX_GRID_CELLS,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MAX_WORKERS") {
            if let Ok(n) = val.parse() {
                config.max_workers = n;
            }
        }

        if let Ok(val) = std::env::var("IDLE_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                config.idle_timeout_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("TILE_SPAN") {
            if let Ok(span) = val.parse() {
                config.tile_span = span;
            }
        }

        if let Ok(val) = std::env::var("TILE_MEMORY_CAPACITY") {
            if let Ok(n) = val.parse() {
                config.tile_memory_capacity = n;
            }
        }

        if let Ok(val) = std::env::var("RETENTION_WINDOW_MS") {
            if let Ok(ms) = val.parse() {
                config.retention_window_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("CACHE_DIR") {
            config.cache_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("WORKSPACE_DIR") {
            config.workspace_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("PARALLELISM_TABLE") {
            if let Some(table) = parse_parallelism_table(&val) {
                config.parallelism = table;
            }
        }

        if let Ok(val) = std::env::var("DEFAULT_PARALLELISM") {
            if let Ok(n) = val.parse() {
                config.default_parallelism = n;
            }
        }

        if let Ok(val) = std::env::var("MAX_POINTS_PER_TASK") {
            apply_max_points(&mut config.max_points_per_task, &val);
        }

        if let Ok(val) = std::env::var("OBSTRUCTION_MARGIN_M") {
            if let Ok(m) = val.parse() {
                config.obstruction_margin_m = m;
            }
        }

        if let Ok(val) = std::env::var("MAX_GRID_CELLS") {
            if let Ok(n) = val.parse() {
                config.max_grid_cells = n;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be > 0".to_string());
        }

        if self.tile_span == 0 {
            return Err("tile_span must be > 0".to_string());
        }

        if self.default_parallelism == 0 || self.parallelism.iter().any(|(_, p)| *p == 0) {
            return Err("parallelism values must be > 0".to_string());
        }

        if self.max_points_per_task.values().any(|n| *n == 0) {
            return Err("max_points_per_task values must be > 0".to_string());
        }

        if !self.obstruction_margin_m.is_finite() || self.obstruction_margin_m < 0.0 {
            return Err("obstruction_margin_m must be >= 0".to_string());
        }

        if self.max_grid_cells == 0 {
            return Err("max_grid_cells must be > 0".to_string());
        }

        Ok(())
    }

    /// Target task count for a cell size.
    pub fn parallelism_for(&self, cell_size: f64) -> usize {
        self.parallelism
            .iter()
            .find(|(size, _)| (size - cell_size).abs() < 1e-9)
            .map(|(_, p)| *p)
            .unwrap_or(self.default_parallelism)
    }

    /// Points-per-task ceiling for a metric.
    pub fn max_points_for(&self, metric: Metric) -> usize {
        self.max_points_per_task.get(&metric).copied().unwrap_or(200)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn retention_window(&self) -> Duration {
        Duration::from_millis(self.retention_window_ms)
    }
}

/// Parse `"10:40,5:60"` into `[(10.0, 40), (5.0, 60)]`.
///
/// Returns `None` if any entry is malformed.
pub fn parse_parallelism_table(s: &str) -> Option<Vec<(f64, usize)>> {
    s.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (size, parallelism) = entry.split_once(':')?;
            Some((size.trim().parse().ok()?, parallelism.trim().parse().ok()?))
        })
        .collect()
}

/// Apply `MAX_POINTS_PER_TASK`: either a single number for every metric or
/// `metric:n` pairs. Malformed entries are ignored.
fn apply_max_points(table: &mut HashMap<Metric, usize>, s: &str) {
    if let Ok(n) = s.trim().parse::<usize>() {
        for metric in Metric::ALL {
            table.insert(metric, n);
        }
        return;
    }

    for entry in s.split(',') {
        if let Some((name, n)) = entry.split_once(':') {
            if let (Ok(metric), Ok(n)) = (name.trim().parse::<Metric>(), n.trim().parse()) {
                table.insert(metric, n);
            }
        }
    }
}

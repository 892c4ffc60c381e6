//! Typed work units passed through the worker pool.

use exposure_common::Coordinate;

/// One grid cell as it travels through the filter pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Lower-left corner of the cell in planar meters.
    pub coord: Coordinate,
    /// Value already held by the cache, if any.
    pub cached: Option<f64>,
}

/// A contiguous slice of the grid submitted to the boundary filter.
///
/// `slots[i]` corresponds to grid index `start + i`. A `None` slot belongs
/// to the other phase (cache hit vs miss) and is skipped.
#[derive(Debug, Clone)]
pub struct FilterTask {
    pub start: usize,
    pub slots: Vec<Option<Candidate>>,
}

impl FilterTask {
    /// Number of live slots.
    pub fn candidates(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Cells of one filter task that lie inside the boundary.
///
/// `kept[i]` pairs with `indices[i]`.
#[derive(Debug, Clone, Default)]
pub struct FilterOutput {
    pub kept: Vec<Candidate>,
    pub indices: Vec<usize>,
}

/// A batch of cells submitted to the simulation kernel.
#[derive(Debug, Clone)]
pub struct ExecTask {
    /// Cell centers in planar meters.
    pub points: Vec<Coordinate>,
    /// Grid index of each point.
    pub indices: Vec<usize>,
}

/// Kernel output for one execution task; `values[i]` pairs with `indices[i]`.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub values: Vec<f64>,
    pub indices: Vec<usize>,
}

/// Concatenate per-task filter outputs in the order given.
pub fn concat_filter(outputs: Vec<FilterOutput>) -> FilterOutput {
    let mut all = FilterOutput::default();
    for out in outputs {
        all.kept.extend(out.kept);
        all.indices.extend(out.indices);
    }
    all
}

/// Concatenate per-task execution outputs in the order given.
pub fn concat_exec(outputs: Vec<ExecOutput>) -> ExecOutput {
    let mut all = ExecOutput::default();
    for out in outputs {
        all.values.extend(out.values);
        all.indices.extend(out.indices);
    }
    all
}

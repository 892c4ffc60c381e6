//! Task sizing.
//!
//! Work is split into batches twice: once over every candidate cell for the
//! boundary filter, once over the surviving cells for kernel execution. Both
//! splits are pure functions of their inputs.

use std::ops::Range;

/// Number of filter batches for `total` candidates given a target parallelism.
///
/// Small requests get about ten items per batch; very large requests are
/// capped at ten thousand items per batch.
pub fn initial_batch_count(total: usize, target: usize) -> usize {
    if total == 0 {
        return 0;
    }
    let count = if total < target.saturating_mul(10) {
        total / 10
    } else if (target as f64) < total as f64 / 10_000.0 {
        total.div_ceil(10_000)
    } else {
        target
    };
    count.max(1)
}

/// Number of execution batches once the filter pass left `filtered` cells.
///
/// `batch_count` is the filter-pass batch count; `max_points_per_task`
/// caps how many cells one task may carry.
pub fn execution_batch_count(filtered: usize, batch_count: usize, max_points_per_task: usize) -> usize {
    if filtered == 0 {
        return 0;
    }
    let max_points = max_points_per_task.max(1);
    let count = if filtered < batch_count.saturating_mul(10) {
        filtered / 10
    } else if filtered as f64 / max_points as f64 > batch_count as f64 {
        filtered.div_ceil(max_points)
    } else {
        batch_count
    };
    count.max(1)
}

/// Split `0..total` into at most `batch_count` contiguous ranges of
/// `ceil(total / batch_count)` items. The last range may be short; ranges
/// that would start at or past `total` are dropped.
pub fn batch_ranges(total: usize, batch_count: usize) -> Vec<Range<usize>> {
    if total == 0 || batch_count == 0 {
        return Vec::new();
    }
    let per_batch = total.div_ceil(batch_count);
    (0..batch_count)
        .map(|i| i * per_batch)
        .take_while(|start| *start < total)
        .map(|start| start..(start + per_batch).min(total))
        .collect()
}

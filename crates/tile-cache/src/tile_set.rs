//! Session-local view of the warmed tiles.

use std::collections::HashMap;

use exposure_common::{Coordinate, Metric};

use crate::key::TileKey;
use crate::matrix::TileMatrix;

/// Tiles loaded for one request, plus the writes the request made.
///
/// A `TileSet` is owned by a single coordinating task, so it needs no
/// locking. Writes stay in memory until handed to
/// [`TileCacheStore::flush`](crate::TileCacheStore::flush); dropping the set
/// discards them.
#[derive(Debug)]
pub struct TileSet {
    metric: Metric,
    cell_size: f64,
    span: usize,
    tiles: HashMap<TileKey, TileMatrix>,
    pending: HashMap<TileKey, Vec<(usize, usize, f64)>>,
}

impl TileSet {
    pub(crate) fn new(metric: Metric, cell_size: f64, span: usize) -> Self {
        Self {
            metric,
            cell_size,
            span,
            tiles: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, key: TileKey, matrix: TileMatrix) {
        self.tiles.insert(key, matrix);
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of tiles held.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    fn key_for(&self, gx: i64, gy: i64) -> TileKey {
        TileKey::for_cell(self.metric, self.cell_size, self.span, gx, gy)
    }

    /// Cached value of global cell `(gx, gy)`.
    ///
    /// `Some(0.0)` is a found value; `None` means not yet computed or the
    /// owning tile was never warmed.
    pub fn get(&self, gx: i64, gy: i64) -> Option<f64> {
        let key = self.key_for(gx, gy);
        let (col, row) = key.local_offset(gx, gy);
        self.tiles.get(&key).and_then(|t| t.get(col, row))
    }

    /// Set global cell `(gx, gy)` and mark its tile dirty.
    ///
    /// A tile that was not warmed is allocated empty.
    pub fn set(&mut self, gx: i64, gy: i64, value: f64) {
        let key = self.key_for(gx, gy);
        let (col, row) = key.local_offset(gx, gy);
        let span = self.span;
        self.tiles
            .entry(key)
            .or_insert_with(|| TileMatrix::empty(span))
            .set(col, row, value);
        self.pending.entry(key).or_default().push((col, row, value));
    }

    /// Global cell address of a cell-corner coordinate.
    pub fn cell_of(&self, coord: &Coordinate) -> (i64, i64) {
        (
            (coord.x / self.cell_size).round() as i64,
            (coord.y / self.cell_size).round() as i64,
        )
    }

    /// [`TileSet::get`] addressed by cell-corner coordinate.
    pub fn get_at(&self, coord: &Coordinate) -> Option<f64> {
        let (gx, gy) = self.cell_of(coord);
        self.get(gx, gy)
    }

    /// [`TileSet::set`] addressed by cell-corner coordinate.
    pub fn set_at(&mut self, coord: &Coordinate, value: f64) {
        let (gx, gy) = self.cell_of(coord);
        self.set(gx, gy, value);
    }

    /// Number of tiles with unflushed writes.
    pub fn dirty_count(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn take_pending(&mut self) -> HashMap<TileKey, Vec<(usize, usize, f64)>> {
        std::mem::take(&mut self.pending)
    }
}

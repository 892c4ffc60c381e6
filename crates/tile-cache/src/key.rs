//! Tile addressing.

use std::fmt;

use exposure_common::{GridSpec, Metric};

/// Identifies one persisted tile: `(metric, cell size, tile origin)`.
///
/// The origin is stored as a tile index (`origin / (span * cell_size)`),
/// which keeps the key hashable; [`TileKey::origin`] recovers meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub metric: Metric,
    cell_size_bits: u64,
    pub span: usize,
    pub tile_x: i64,
    pub tile_y: i64,
}

impl TileKey {
    pub fn new(metric: Metric, cell_size: f64, span: usize, tile_x: i64, tile_y: i64) -> Self {
        Self {
            metric,
            cell_size_bits: cell_size.to_bits(),
            span,
            tile_x,
            tile_y,
        }
    }

    /// Key of the tile owning global cell `(gx, gy)`.
    pub fn for_cell(metric: Metric, cell_size: f64, span: usize, gx: i64, gy: i64) -> Self {
        let s = span as i64;
        Self::new(metric, cell_size, span, gx.div_euclid(s), gy.div_euclid(s))
    }

    pub fn cell_size(&self) -> f64 {
        f64::from_bits(self.cell_size_bits)
    }

    /// Planar origin of the tile in meters.
    pub fn origin(&self) -> (f64, f64) {
        let extent = self.span as f64 * self.cell_size();
        (self.tile_x as f64 * extent, self.tile_y as f64 * extent)
    }

    /// Global cell index of the tile's first cell.
    pub fn first_cell(&self) -> (i64, i64) {
        let s = self.span as i64;
        (self.tile_x * s, self.tile_y * s)
    }

    /// `(local_col, local_row)` of a global cell inside this tile.
    pub fn local_offset(&self, gx: i64, gy: i64) -> (usize, usize) {
        let s = self.span as i64;
        (gx.rem_euclid(s) as usize, gy.rem_euclid(s) as usize)
    }

    /// File name of the tile: `{metric}_{cellSize}_{originX}_{originY}.json`.
    pub fn file_name(&self) -> String {
        let (ox, oy) = self.origin();
        format!("{}_{}_{}_{}.json", self.metric, self.cell_size(), ox, oy)
    }

    /// Every tile key overlapping `grid`, in row-major tile order.
    pub fn covering(metric: Metric, grid: &GridSpec, span: usize) -> Vec<TileKey> {
        if grid.is_empty() {
            return Vec::new();
        }
        let s = span as i64;
        let tx0 = grid.origin_ix.div_euclid(s);
        let ty0 = grid.origin_iy.div_euclid(s);
        let tx1 = (grid.origin_ix + grid.cols as i64 - 1).div_euclid(s);
        let ty1 = (grid.origin_iy + grid.rows as i64 - 1).div_euclid(s);

        let mut keys = Vec::with_capacity(((tx1 - tx0 + 1) * (ty1 - ty0 + 1)) as usize);
        for ty in ty0..=ty1 {
            for tx in tx0..=tx1 {
                keys.push(TileKey::new(metric, grid.cell_size, span, tx, ty));
            }
        }
        keys
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ox, oy) = self.origin();
        write!(f, "{}/{}/{}/{}", self.metric, self.cell_size(), ox, oy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exposure_common::BoundingBox;

    #[test]
    fn test_for_cell_negative() {
        let key = TileKey::for_cell(Metric::Sky, 5.0, 200, -1, 0);
        assert_eq!((key.tile_x, key.tile_y), (-1, 0));
        assert_eq!(key.local_offset(-1, 0), (199, 0));
        assert_eq!(key.origin(), (-1000.0, 0.0));
        assert_eq!(key.first_cell(), (-200, 0));
    }

    #[test]
    fn test_file_name() {
        let key = TileKey::new(Metric::Solar, 5.0, 200, 2, -1);
        assert_eq!(key.file_name(), "solar_5_2000_-1000.json");
        let half = TileKey::new(Metric::Wind, 0.5, 200, 1, 0);
        assert_eq!(half.file_name(), "wind_0.5_100_0.json");
    }

    #[test]
    fn test_covering_spans_tile_boundary() {
        // cells -3..=2 along x, 0..=1 along y with span 4
        let grid = GridSpec::covering(&BoundingBox::new(-15.0, 0.0, 15.0, 10.0), 5.0).unwrap();
        let keys = TileKey::covering(Metric::Uhi, &grid, 4);
        let idx: Vec<(i64, i64)> = keys.iter().map(|k| (k.tile_x, k.tile_y)).collect();
        assert_eq!(idx, vec![(-1, 0), (0, 0)]);
    }
}

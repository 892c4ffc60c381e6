//! Computation grid definitions.
//!
//! A grid is anchored at integer multiples of its cell size so that the
//! same physical cell always maps to the same global cell index, no matter
//! which boundary produced the grid. The tile cache relies on this.

use serde::{Deserialize, Serialize};

use crate::{BoundingBox, Coordinate, ExposureError, ExposureResult};

/// A cell-aligned grid over a projected extent.
///
/// Cells are addressed row-major: `idx = row * cols + col`, rows growing
/// with `y`. The planar coordinate of a cell is its lower-left corner,
/// `origin + (col, row) * cell_size`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Cell side in meters.
    pub cell_size: f64,
    /// Global cell index of the origin along x (`origin_x / cell_size`).
    pub origin_ix: i64,
    /// Global cell index of the origin along y.
    pub origin_iy: i64,
    pub cols: usize,
    pub rows: usize,
}

impl GridSpec {
    /// Build the smallest aligned grid covering `extent`.
    ///
    /// The origin is the extent minimum floored to a cell multiple and the
    /// far edge is the maximum ceiled to a cell multiple.
    pub fn covering(extent: &BoundingBox, cell_size: f64) -> ExposureResult<Self> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(ExposureError::invalid_parameter(
                "gridSize",
                format!("must be a positive number, got {}", cell_size),
            ));
        }
        if extent.is_degenerate() {
            return Err(ExposureError::invalid_boundary(format!(
                "bounding box has zero area ({} x {})",
                extent.width(),
                extent.height()
            )));
        }

        let min_ix = (extent.min_x / cell_size).floor();
        let min_iy = (extent.min_y / cell_size).floor();
        let max_ix = (extent.max_x / cell_size).ceil();
        let max_iy = (extent.max_y / cell_size).ceil();

        let cols = (max_ix - min_ix) as i64;
        let rows = (max_iy - min_iy) as i64;
        if cols <= 0 || rows <= 0 {
            return Err(ExposureError::invalid_boundary(format!(
                "grid has no cells ({} x {})",
                cols, rows
            )));
        }
        if (cols as usize).checked_mul(rows as usize).is_none() {
            return Err(ExposureError::invalid_parameter(
                "gridSize",
                format!("{} too small, grid of {} x {} cells overflows", cell_size, cols, rows),
            ));
        }

        Ok(Self {
            cell_size,
            origin_ix: min_ix as i64,
            origin_iy: min_iy as i64,
            cols: cols as usize,
            rows: rows as usize,
        })
    }

    /// Total number of candidate cells. [`GridSpec::covering`] guarantees
    /// this does not overflow.
    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Planar origin (lower-left corner of cell 0).
    pub fn origin(&self) -> Coordinate {
        Coordinate::new(
            self.origin_ix as f64 * self.cell_size,
            self.origin_iy as f64 * self.cell_size,
        )
    }

    /// Projected extent covered by the grid.
    pub fn extent(&self) -> BoundingBox {
        let origin = self.origin();
        BoundingBox::new(
            origin.x,
            origin.y,
            origin.x + self.cols as f64 * self.cell_size,
            origin.y + self.rows as f64 * self.cell_size,
        )
    }

    /// `(col, row)` of a linear index.
    pub fn col_row(&self, idx: usize) -> (usize, usize) {
        (idx % self.cols, idx / self.cols)
    }

    /// Global integer cell address of a linear index.
    pub fn global_cell(&self, idx: usize) -> (i64, i64) {
        let (col, row) = self.col_row(idx);
        (self.origin_ix + col as i64, self.origin_iy + row as i64)
    }

    /// Planar coordinate of a linear index.
    pub fn cell_coord(&self, idx: usize) -> Coordinate {
        let (gx, gy) = self.global_cell(idx);
        Coordinate::new(gx as f64 * self.cell_size, gy as f64 * self.cell_size)
    }

    /// Planar center of a linear index.
    pub fn cell_center(&self, idx: usize) -> Coordinate {
        let c = self.cell_coord(idx);
        let half = self.cell_size / 2.0;
        Coordinate::new(c.x + half, c.y + half)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_grid() {
        let grid = GridSpec::covering(&BoundingBox::new(0.0, 0.0, 10.0, 10.0), 5.0).unwrap();
        assert_eq!(grid.cols, 2);
        assert_eq!(grid.rows, 2);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.cell_coord(3), Coordinate::new(5.0, 5.0));
        assert_eq!(grid.cell_center(0), Coordinate::new(2.5, 2.5));
    }

    #[test]
    fn test_negative_extent_floors_away_from_zero() {
        let grid =
            GridSpec::covering(&BoundingBox::new(-12.0, -3.0, 7.0, 4.0), 5.0).unwrap();
        assert_eq!(grid.origin_ix, -3);
        assert_eq!(grid.origin_iy, -1);
        assert_eq!(grid.cols, 5);
        assert_eq!(grid.rows, 2);
        assert_eq!(grid.origin(), Coordinate::new(-15.0, -5.0));
    }

    #[test]
    fn test_invalid_cell_size() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(GridSpec::covering(&bbox, 0.0).is_err());
        assert!(GridSpec::covering(&bbox, -1.0).is_err());
        assert!(GridSpec::covering(&bbox, f64::NAN).is_err());
    }

    #[test]
    fn test_overflowing_cell_count_rejected() {
        let bbox = BoundingBox::new(0.0, 0.0, 111_000.0, 111_000.0);
        let err = GridSpec::covering(&bbox, 1e-6).unwrap_err();
        assert!(matches!(
            err,
            ExposureError::InvalidParameter { ref param, .. } if param == "gridSize"
        ));
    }

    #[test]
    fn test_degenerate_extent() {
        let err = GridSpec::covering(&BoundingBox::new(0.0, 0.0, 10.0, 0.0), 5.0).unwrap_err();
        assert!(matches!(err, ExposureError::InvalidBoundary(_)));
    }
}

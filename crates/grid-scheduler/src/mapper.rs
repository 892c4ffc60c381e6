//! Boundary to grid mapping.

use std::sync::Arc;

use exposure_common::{Boundary, BoundingBox, Coordinate, ExposureError, GridSpec};
use projection::Projection;

use crate::config::DEFAULT_MAX_GRID_CELLS;
use crate::error::Result;

/// A boundary projected to planar meters together with its covering grid.
#[derive(Debug, Clone)]
pub struct MappedBoundary {
    /// Closed ring in planar coordinates.
    pub ring: Vec<Coordinate>,
    /// Aligned grid covering the ring.
    pub grid: GridSpec,
}

/// Projects boundaries and lays the computation grid over them.
#[derive(Clone)]
pub struct GridMapper {
    projection: Arc<dyn Projection>,
    max_cells: usize,
}

impl GridMapper {
    pub fn new(projection: Arc<dyn Projection>) -> Self {
        Self {
            projection,
            max_cells: DEFAULT_MAX_GRID_CELLS,
        }
    }

    /// Cap the number of cells a grid may have.
    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    pub fn max_cells(&self) -> usize {
        self.max_cells
    }

    /// Project `boundary` and compute the aligned grid for `cell_size`.
    ///
    /// Fails if the projected ring has a zero-area bounding box, the cell
    /// size is not a positive number, or the grid exceeds the cell cap.
    pub fn compute_grid(&self, boundary: &Boundary, cell_size: f64) -> Result<MappedBoundary> {
        let ring = self.projection.forward_ring(&boundary.closed_ring())?;
        let extent = BoundingBox::from_coordinates(&ring)
            .ok_or_else(|| ExposureError::invalid_boundary("no vertices"))?;
        let grid = GridSpec::covering(&extent, cell_size)?;
        if grid.len() > self.max_cells {
            return Err(ExposureError::invalid_parameter(
                "gridSize",
                format!(
                    "{} gives {} x {} cells, limit is {}",
                    cell_size, grid.cols, grid.rows, self.max_cells
                ),
            )
            .into());
        }
        Ok(MappedBoundary { ring, grid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedulerError;
    use projection::{Planar, TransverseMercator};

    fn mapper() -> GridMapper {
        GridMapper::new(Arc::new(Planar))
    }

    #[test]
    fn test_unit_square() {
        let boundary =
            Boundary::new(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]).unwrap();
        let mapped = mapper().compute_grid(&boundary, 5.0).unwrap();
        assert_eq!((mapped.grid.cols, mapped.grid.rows), (2, 2));
        assert_eq!(mapped.ring.len(), 5);
        assert_eq!(mapped.ring.first(), mapped.ring.last());
    }

    #[test]
    fn test_collinear_boundary_rejected() {
        let boundary = Boundary::new(vec![[0.0, 0.0], [5.0, 0.0], [10.0, 0.0]]).unwrap();
        let err = mapper().compute_grid(&boundary, 5.0).unwrap_err();
        assert!(err.is_client_error());
        assert!(matches!(
            err,
            SchedulerError::InvalidInput(ExposureError::InvalidBoundary(_))
        ));
    }

    #[test]
    fn test_bad_cell_size_rejected() {
        let boundary =
            Boundary::new(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]]).unwrap();
        assert!(mapper().compute_grid(&boundary, 0.0).is_err());
    }

    #[test]
    fn test_grid_over_cell_cap_rejected() {
        let boundary =
            Boundary::new(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]).unwrap();
        let capped = mapper().with_max_cells(3);
        let err = capped.compute_grid(&boundary, 5.0).unwrap_err();
        assert_eq!(err.http_status_code(), 400);
        assert!(matches!(
            err,
            SchedulerError::InvalidInput(ExposureError::InvalidParameter { ref param, .. })
                if param == "gridSize"
        ));
        assert!(mapper().with_max_cells(4).compute_grid(&boundary, 5.0).is_ok());
    }

    #[test]
    fn test_tiny_cell_over_degree_square_rejected() {
        let mapper = GridMapper::new(Arc::new(TransverseMercator::site()));
        let boundary = Boundary::new(vec![
            [103.0, 1.0],
            [104.0, 1.0],
            [104.0, 2.0],
            [103.0, 2.0],
        ])
        .unwrap();
        for cell in [1e-6, 0.01] {
            let err = mapper.compute_grid(&boundary, cell).unwrap_err();
            assert!(err.is_client_error());
            assert!(matches!(
                err,
                SchedulerError::InvalidInput(ExposureError::InvalidParameter { .. })
            ));
        }
    }
}

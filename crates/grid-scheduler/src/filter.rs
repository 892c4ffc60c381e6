//! Boundary membership filtering.
//!
//! A cell is kept when its center lies inside the boundary grown outward by
//! half a cell, so cells whose footprint straddles the edge are included.
//! The geometric test itself sits behind [`PointInPolygon`]; this module
//! owns how candidates are batched and paired with their grid indices.

use std::sync::Arc;

use exposure_common::Coordinate;
use geo::{Closest, ClosestPoint, Contains, Distance, Euclidean, LineString, Point, Polygon};

use crate::task::{FilterOutput, FilterTask};

/// Tolerance on the offset distance, in meters.
const OFFSET_EPSILON: f64 = 1e-9;

/// Point membership against a polygon grown by `offset`.
pub trait PointInPolygon: Send + Sync {
    fn contains(&self, polygon: &Polygon<f64>, offset: f64, point: &Coordinate) -> bool;
}

/// [`PointInPolygon`] backed by `geo`: inside the ring, or within `offset`
/// of its exterior.
///
/// Growing by distance rounds the polygon's convex corners; a point near a
/// corner but further than `offset` from it is outside.
#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetContains;

impl PointInPolygon for OffsetContains {
    fn contains(&self, polygon: &Polygon<f64>, offset: f64, point: &Coordinate) -> bool {
        let p = Point::new(point.x, point.y);
        if polygon.contains(&p) {
            return true;
        }
        let distance = match polygon.exterior().closest_point(&p) {
            Closest::Intersection(_) => 0.0,
            Closest::SinglePoint(q) => Euclidean.distance(p, q),
            Closest::Indeterminate => f64::INFINITY,
        };
        distance <= offset + OFFSET_EPSILON
    }
}

/// Filters candidate cells against one projected boundary.
pub struct BoundaryFilter {
    polygon: Polygon<f64>,
    half_cell: f64,
    test: Arc<dyn PointInPolygon>,
}

impl BoundaryFilter {
    /// Build a filter from a planar ring and the grid cell size.
    pub fn new(ring: &[Coordinate], cell_size: f64, test: Arc<dyn PointInPolygon>) -> Self {
        let exterior: LineString<f64> = ring.iter().map(|c| (c.x, c.y)).collect::<Vec<_>>().into();
        Self {
            polygon: Polygon::new(exterior, vec![]),
            half_cell: cell_size / 2.0,
            test,
        }
    }

    /// Whether the cell with lower-left corner `corner` is inside.
    pub fn keeps(&self, corner: &Coordinate) -> bool {
        let center = Coordinate::new(corner.x + self.half_cell, corner.y + self.half_cell);
        self.test.contains(&self.polygon, self.half_cell, &center)
    }

    /// Reduce one task to the candidates inside the boundary, each paired
    /// with its global grid index.
    pub fn filter_batch(&self, task: FilterTask) -> FilterOutput {
        let mut out = FilterOutput::default();
        for (i, slot) in task.slots.into_iter().enumerate() {
            let Some(candidate) = slot else { continue };
            if self.keeps(&candidate.coord) {
                out.kept.push(candidate);
                out.indices.push(task.start + i);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Candidate;

    fn square(size: f64) -> Vec<Coordinate> {
        vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(size, 0.0),
            Coordinate::new(size, size),
            Coordinate::new(0.0, size),
            Coordinate::new(0.0, 0.0),
        ]
    }

    fn miss(x: f64, y: f64) -> Option<Candidate> {
        Some(Candidate {
            coord: Coordinate::new(x, y),
            cached: None,
        })
    }

    #[test]
    fn test_cell_straddling_edge_is_kept() {
        let filter = BoundaryFilter::new(&square(10.0), 5.0, Arc::new(OffsetContains));
        // center (12.5, 2.5) is 2.5 m outside, exactly half a cell
        assert!(filter.keeps(&Coordinate::new(10.0, 0.0)));
        // center (17.5, 2.5) is 7.5 m outside
        assert!(!filter.keeps(&Coordinate::new(15.0, 0.0)));
    }

    #[test]
    fn test_corner_uses_round_offset() {
        let filter = BoundaryFilter::new(&square(10.0), 5.0, Arc::new(OffsetContains));
        // center (12.5, 12.5) is 3.54 m from the corner
        assert!(!filter.keeps(&Coordinate::new(10.0, 10.0)));
    }

    #[test]
    fn test_batch_skips_empty_slots_and_offsets_indices() {
        let filter = BoundaryFilter::new(&square(10.0), 5.0, Arc::new(OffsetContains));
        let task = FilterTask {
            start: 100,
            slots: vec![miss(0.0, 0.0), None, miss(50.0, 50.0), miss(5.0, 5.0)],
        };
        let out = filter.filter_batch(task);
        assert_eq!(out.indices, vec![100, 103]);
        assert_eq!(out.kept[1].coord, Coordinate::new(5.0, 5.0));
    }

    #[test]
    fn test_cached_value_travels_with_candidate() {
        let filter = BoundaryFilter::new(&square(10.0), 5.0, Arc::new(OffsetContains));
        let task = FilterTask {
            start: 0,
            slots: vec![Some(Candidate {
                coord: Coordinate::new(0.0, 0.0),
                cached: Some(0.0),
            })],
        };
        let out = filter.filter_batch(task);
        assert_eq!(out.kept[0].cached, Some(0.0));
    }
}

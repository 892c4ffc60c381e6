//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::Coordinate;

/// An axis-aligned bounding box.
///
/// Used both for geographic extents (degrees) and for projected
/// extents (meters); the caller knows which one it holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest box enclosing all the given coordinates.
    ///
    /// Returns `None` for an empty iterator.
    pub fn from_coordinates<'a, I>(coords: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Coordinate>,
    {
        let mut iter = coords.into_iter();
        let first = iter.next()?;
        let mut bbox = Self::new(first.x, first.y, first.x, first.y);
        for c in iter {
            bbox.min_x = bbox.min_x.min(c.x);
            bbox.min_y = bbox.min_y.min(c.y);
            bbox.max_x = bbox.max_x.max(c.x);
            bbox.max_y = bbox.max_y.max(c.y);
        }
        Some(bbox)
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when the box has no area.
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Check if a point is inside this bbox (edges inclusive).
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Grow the box by `margin` on every side.
    pub fn expand(&self, margin: f64) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }
}

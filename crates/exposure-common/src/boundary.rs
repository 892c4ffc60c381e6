//! User-drawn boundary polygons.

use serde::{Deserialize, Serialize};

use crate::{ExposureError, ExposureResult};

/// A planar coordinate (projected meters) or a lon/lat pair, depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from(v: [f64; 2]) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

/// Ordered `(longitude, latitude)` vertices of a simple polygon.
///
/// The ring does not need to be closed; [`Boundary::closed_ring`] appends
/// the first vertex when first != last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct Boundary {
    vertices: Vec<[f64; 2]>,
}

impl Boundary {
    /// Build a boundary, rejecting fewer than 3 distinct vertices and non-finite values.
    pub fn new(vertices: Vec<[f64; 2]>) -> ExposureResult<Self> {
        if let Some(bad) = vertices
            .iter()
            .find(|v| !v[0].is_finite() || !v[1].is_finite())
        {
            return Err(ExposureError::invalid_boundary(format!(
                "non-finite vertex {:?}",
                bad
            )));
        }

        let mut distinct = vertices.clone();
        if distinct.len() > 1 && distinct.first() == distinct.last() {
            distinct.pop();
        }
        if distinct.len() < 3 {
            return Err(ExposureError::invalid_boundary(format!(
                "need at least 3 vertices, got {}",
                distinct.len()
            )));
        }

        Ok(Self { vertices })
    }

    /// Vertices as supplied.
    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    /// Vertices with the ring closed (first vertex repeated at the end if needed).
    pub fn closed_ring(&self) -> Vec<[f64; 2]> {
        let mut ring = self.vertices.clone();
        if ring.first() != ring.last() {
            ring.push(ring[0]);
        }
        ring
    }
}

impl TryFrom<Vec<[f64; 2]>> for Boundary {
    type Error = ExposureError;

    fn try_from(vertices: Vec<[f64; 2]>) -> Result<Self, Self::Error> {
        Boundary::new(vertices)
    }
}

impl From<Boundary> for Vec<[f64; 2]> {
    fn from(b: Boundary) -> Self {
        b.vertices
    }
}

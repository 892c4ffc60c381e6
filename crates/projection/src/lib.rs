//! Coordinate reference system transformations.
//!
//! Implements the projections the exposure grid needs from scratch without
//! external dependencies: a site-anchored Transverse Mercator for lon/lat
//! boundaries and an identity projection for inputs already in meters.

pub mod planar;
pub mod transverse_mercator;

pub use planar::Planar;
pub use transverse_mercator::TransverseMercator;

use exposure_common::Coordinate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("coordinate out of range: lon={lon}, lat={lat}")]
    OutOfRange { lon: f64, lat: f64 },
}

/// Forward projection from geographic to planar coordinates (meters).
pub trait Projection: Send + Sync {
    /// Project a single `(lon, lat)` pair.
    fn forward(&self, lon: f64, lat: f64) -> Result<Coordinate, ProjectionError>;

    /// Project every vertex of a ring, preserving order.
    fn forward_ring(&self, ring: &[[f64; 2]]) -> Result<Vec<Coordinate>, ProjectionError> {
        ring.iter().map(|v| self.forward(v[0], v[1])).collect()
    }
}

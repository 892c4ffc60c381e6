//! Identity projection.

use exposure_common::Coordinate;

use crate::{Projection, ProjectionError};

/// Treats input pairs as planar meters already.
#[derive(Debug, Clone, Copy, Default)]
pub struct Planar;

impl Projection for Planar {
    fn forward(&self, x: f64, y: f64) -> Result<Coordinate, ProjectionError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::OutOfRange { lon: x, lat: y });
        }
        Ok(Coordinate::new(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        assert_eq!(Planar.forward(10.0, -3.5).unwrap(), Coordinate::new(10.0, -3.5));
        assert!(Planar.forward(f64::INFINITY, 0.0).is_err());
    }
}

//! Common types and utilities shared across the exposure grid services.

pub mod bbox;
pub mod boundary;
pub mod error;
pub mod grid;
pub mod metric;

pub use bbox::BoundingBox;
pub use boundary::{Boundary, Coordinate};
pub use error::{ExposureError, ExposureResult};
pub use grid::GridSpec;
pub use metric::Metric;

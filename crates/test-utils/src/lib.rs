//! Shared test utilities for the exposure-grid workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Boundary and configuration fixtures
//! - Instrumented kernels and obstruction providers
//! - Approximate float assertions
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in integration tests:
//!
//! ```ignore
//! use test_utils::{fixtures, CountingKernel};
//! ```

pub mod fixtures;
pub mod kernels;

pub use fixtures::*;
pub use kernels::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for approximate equality of planar coordinates.
///
/// ```ignore
/// use test_utils::assert_coords_approx_eq;
///
/// assert_coords_approx_eq!(projected, (0.0, 0.0), 1e-6);
/// ```
#[macro_export]
macro_rules! assert_coords_approx_eq {
    ($coord:expr, ($x:expr, $y:expr), $epsilon:expr) => {{
        let c = $coord;
        $crate::assert_approx_eq!(c.x, $x, $epsilon);
        $crate::assert_approx_eq!(c.y, $y, $epsilon);
    }};
}

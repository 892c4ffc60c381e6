//! Transverse Mercator projection on the WGS84 ellipsoid.
//!
//! Forward series from Snyder, "Map Projections: A Working Manual"
//! (USGS PP 1395), equations 8-9 and 8-10. Accurate to well under a
//! millimeter within a few degrees of the central meridian, which covers
//! any site-sized boundary.

use exposure_common::Coordinate;

use crate::{Projection, ProjectionError};

/// WGS84 semi-major axis (meters).
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Default site origin longitude (degrees).
pub const SITE_LON: f64 = 103.778329;
/// Default site origin latitude (degrees).
pub const SITE_LAT: f64 = 1.298759;

/// Transverse Mercator with false easting/northing of zero at the origin.
#[derive(Debug, Clone)]
pub struct TransverseMercator {
    /// Central meridian in radians
    lon0: f64,
    /// Latitude of origin in radians
    lat0: f64,
    /// Scale factor on the central meridian
    k0: f64,
    a: f64,
    e2: f64,
    ep2: f64,
    /// Meridional distance at the latitude of origin
    m0: f64,
}

impl TransverseMercator {
    /// Create a projection centered on `(lon0_deg, lat0_deg)` with scale `k0`.
    pub fn new(lon0_deg: f64, lat0_deg: f64, k0: f64) -> Self {
        let a = WGS84_A;
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);
        let lat0 = lat0_deg.to_radians();
        let m0 = meridional_distance(a, e2, lat0);
        Self {
            lon0: lon0_deg.to_radians(),
            lat0,
            k0,
            a,
            e2,
            ep2,
            m0,
        }
    }

    /// Projection anchored at the default site origin with `k0 = 1`.
    pub fn site() -> Self {
        Self::new(SITE_LON, SITE_LAT, 1.0)
    }

    /// Latitude of origin in degrees.
    pub fn origin_lat(&self) -> f64 {
        self.lat0.to_degrees()
    }

    /// Central meridian in degrees.
    pub fn origin_lon(&self) -> f64 {
        self.lon0.to_degrees()
    }
}

impl Default for TransverseMercator {
    fn default() -> Self {
        Self::site()
    }
}

/// Distance along the meridian from the equator to `phi` (Snyder 3-21).
fn meridional_distance(a: f64, e2: f64, phi: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    a * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

impl Projection for TransverseMercator {
    fn forward(&self, lon: f64, lat: f64) -> Result<Coordinate, ProjectionError> {
        if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
            return Err(ProjectionError::OutOfRange { lon, lat });
        }

        let phi = lat.to_radians();
        let mut dlam = lon.to_radians() - self.lon0;
        // wrap to [-pi, pi]
        if dlam > std::f64::consts::PI {
            dlam -= 2.0 * std::f64::consts::PI;
        } else if dlam < -std::f64::consts::PI {
            dlam += 2.0 * std::f64::consts::PI;
        }

        let sin_phi = phi.sin();
        let cos_phi = phi.cos();
        let tan_phi = phi.tan();

        let n = self.a / (1.0 - self.e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = self.ep2 * cos_phi * cos_phi;
        let aa = dlam * cos_phi;
        let m = meridional_distance(self.a, self.e2, phi);

        let a2 = aa * aa;
        let a3 = a2 * aa;
        let a4 = a3 * aa;
        let a5 = a4 * aa;
        let a6 = a5 * aa;

        let x = self.k0
            * n
            * (aa
                + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * self.ep2) * a5 / 120.0);

        let y = self.k0
            * (m - self.m0
                + n * tan_phi
                    * (a2 / 2.0
                        + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                        + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * self.ep2) * a6
                            / 720.0));

        Ok(Coordinate::new(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_zero() {
        let tm = TransverseMercator::site();
        let p = tm.forward(SITE_LON, SITE_LAT).unwrap();
        assert!(p.x.abs() < 1e-6);
        assert!(p.y.abs() < 1e-6);
    }

    #[test]
    fn test_small_offsets_are_metric() {
        let tm = TransverseMercator::site();

        // 0.001 deg of longitude near the equator is about 111.29 m
        let east = tm.forward(SITE_LON + 0.001, SITE_LAT).unwrap();
        assert!((east.x - 111.29).abs() < 0.1, "east.x = {}", east.x);
        assert!(east.y.abs() < 0.01);

        // 0.001 deg of latitude is about 110.57 m
        let north = tm.forward(SITE_LON, SITE_LAT + 0.001).unwrap();
        assert!(north.x.abs() < 1e-9);
        assert!((north.y - 110.57).abs() < 0.1, "north.y = {}", north.y);
    }

    #[test]
    fn test_symmetry_about_central_meridian() {
        let tm = TransverseMercator::site();
        let w = tm.forward(SITE_LON - 0.01, SITE_LAT + 0.01).unwrap();
        let e = tm.forward(SITE_LON + 0.01, SITE_LAT + 0.01).unwrap();
        assert!((w.x + e.x).abs() < 1e-6);
        assert!((w.y - e.y).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let tm = TransverseMercator::site();
        assert!(tm.forward(0.0, 91.0).is_err());
        assert!(tm.forward(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_forward_ring() {
        let tm = TransverseMercator::site();
        let ring = [[SITE_LON, SITE_LAT], [SITE_LON + 0.001, SITE_LAT]];
        let out = tm.forward_ring(&ring).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[1].x > out[0].x);
    }
}

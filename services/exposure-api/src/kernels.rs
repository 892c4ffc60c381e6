//! Reference simulation kernels.
//!
//! Every kernel casts horizontal rays from a ground-level point across the
//! extruded building footprints of the session's [`ObstructionModel`]. A ray
//! meeting a building at distance `d` with height `h` is obstructed up to the
//! elevation angle `atan(h / d)`. Buildings containing the point itself are
//! ignored.
//!
//! | Metric | Rays | Radius | Value |
//! |--------|------|--------|-------|
//! | sky    | 36   | 1000 m | mean `cos²(elevation)` x 100 |
//! | uhi    | 36   | 1000 m | `-6.51 * open + 7.13`, `open` = mean unobstructed elevation fraction |
//! | solar  | sun path | 1000 m | share of `sin(altitude)`-weighted equinox sun samples not blocked x 100 |
//! | wind   | 4    | 200 m  | mean free distance / radius x 100 |

use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

use exposure_common::{Coordinate, Metric};
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Contains, Coord, Line, Point};
use grid_scheduler::{KernelError, KernelRegistry, ObstructionModel, SimulationKernel};
use projection::transverse_mercator::SITE_LAT;

const SKY_RAYS: usize = 36;
const SKY_RADIUS_M: f64 = 1000.0;
const SOLAR_RADIUS_M: f64 = 1000.0;
const WIND_RAYS: usize = 4;
const WIND_RADIUS_M: f64 = 200.0;

const UHI_SLOPE: f64 = -6.51;
const UHI_INTERCEPT: f64 = 7.13;

/// Registry with all four reference kernels.
pub fn reference_kernels() -> KernelRegistry {
    KernelRegistry::new()
        .with(Metric::Sky, Arc::new(SkyViewKernel))
        .with(Metric::Uhi, Arc::new(UhiKernel))
        .with(Metric::Solar, Arc::new(SolarKernel::new(SITE_LAT)))
        .with(Metric::Wind, Arc::new(WindKernel))
}

/// Distance to the nearest footprint edge of every building the ray crosses,
/// paired with that building's height.
fn ray_hits(
    model: &ObstructionModel,
    origin: Coordinate,
    direction: (f64, f64),
    radius: f64,
) -> Vec<(f64, f64)> {
    let start = Coord {
        x: origin.x,
        y: origin.y,
    };
    let ray = Line::new(
        start,
        Coord {
            x: origin.x + direction.0 * radius,
            y: origin.y + direction.1 * radius,
        },
    );
    let here = Point::from(start);

    let mut hits = Vec::new();
    for building in &model.buildings {
        if let Some(b) = building.bounds() {
            let dx = (b.min_x - origin.x).max(origin.x - b.max_x).max(0.0);
            let dy = (b.min_y - origin.y).max(origin.y - b.max_y).max(0.0);
            if dx.hypot(dy) > radius {
                continue;
            }
        }
        if building.footprint.contains(&here) {
            continue;
        }

        let nearest = building
            .footprint
            .exterior()
            .lines()
            .filter_map(|edge| match line_intersection(ray, edge)? {
                LineIntersection::SinglePoint { intersection, .. } => {
                    Some((intersection.x - start.x).hypot(intersection.y - start.y))
                }
                LineIntersection::Collinear { intersection } => {
                    let a = (intersection.start.x - start.x).hypot(intersection.start.y - start.y);
                    let b = (intersection.end.x - start.x).hypot(intersection.end.y - start.y);
                    Some(a.min(b))
                }
            })
            .fold(f64::INFINITY, f64::min);

        if nearest.is_finite() {
            hits.push((nearest, building.height));
        }
    }
    hits
}

/// Highest obstruction elevation angle along one ray (radians).
fn max_elevation(model: &ObstructionModel, origin: Coordinate, azimuth: f64, radius: f64) -> f64 {
    ray_hits(model, origin, (azimuth.sin(), azimuth.cos()), radius)
        .into_iter()
        .map(|(dist, height)| height.atan2(dist.max(f64::EPSILON)))
        .fold(0.0, f64::max)
}

fn azimuths(rays: usize) -> impl Iterator<Item = f64> {
    (0..rays).map(move |i| 2.0 * PI * i as f64 / rays as f64)
}

/// Sky view factor, 0 to 100.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkyViewKernel;

impl SkyViewKernel {
    pub fn sky_view(model: &ObstructionModel, point: Coordinate) -> f64 {
        let sum: f64 = azimuths(SKY_RAYS)
            .map(|az| max_elevation(model, point, az, SKY_RADIUS_M).cos().powi(2))
            .sum();
        sum / SKY_RAYS as f64
    }

    /// Mean unobstructed share of the elevation range, 0 to 1.
    pub fn open_fraction(model: &ObstructionModel, point: Coordinate) -> f64 {
        let sum: f64 = azimuths(SKY_RAYS)
            .map(|az| 1.0 - max_elevation(model, point, az, SKY_RADIUS_M) / FRAC_PI_2)
            .sum();
        sum / SKY_RAYS as f64
    }
}

impl SimulationKernel for SkyViewKernel {
    fn execute(
        &self,
        points: &[Coordinate],
        model: &ObstructionModel,
        _cell_size: f64,
    ) -> Result<Option<Vec<f64>>, KernelError> {
        Ok(Some(
            points
                .iter()
                .map(|p| (Self::sky_view(model, *p) * 100.0).clamp(0.0, 100.0))
                .collect(),
        ))
    }
}

/// Urban heat island intensity in degrees from the open sky fraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct UhiKernel;

impl SimulationKernel for UhiKernel {
    fn execute(
        &self,
        points: &[Coordinate],
        model: &ObstructionModel,
        _cell_size: f64,
    ) -> Result<Option<Vec<f64>>, KernelError> {
        Ok(Some(
            points
                .iter()
                .map(|p| {
                    let open = SkyViewKernel::open_fraction(model, *p);
                    (UHI_SLOPE * open + UHI_INTERCEPT).max(0.0)
                })
                .collect(),
        ))
    }
}

/// One sun position: horizontal direction `(east, north)` and altitude.
#[derive(Debug, Clone, Copy)]
struct SunSample {
    direction: (f64, f64),
    altitude: f64,
}

/// Direct sun exposure over the equinox day, 0 to 100.
#[derive(Debug, Clone)]
pub struct SolarKernel {
    samples: Vec<SunSample>,
}

impl SolarKernel {
    /// Sun samples every hour from 06:30 to 17:30 solar time at `latitude`.
    pub fn new(latitude: f64) -> Self {
        let phi = latitude.to_radians();
        let samples = (0..12)
            .filter_map(|i| {
                let hour = 6.5 + i as f64;
                let h = (15.0 * (hour - 12.0)).to_radians();
                // declination 0
                let east = -h.sin();
                let north = -phi.sin() * h.cos();
                let up = phi.cos() * h.cos();
                if up <= 0.0 {
                    return None;
                }
                let horizontal = east.hypot(north);
                let direction = if horizontal > 0.0 {
                    (east / horizontal, north / horizontal)
                } else {
                    (0.0, 1.0)
                };
                Some(SunSample {
                    direction,
                    altitude: up.asin(),
                })
            })
            .collect();
        Self { samples }
    }

    fn exposure(&self, model: &ObstructionModel, point: Coordinate) -> f64 {
        let mut total = 0.0;
        let mut lit = 0.0;
        for sample in &self.samples {
            let weight = sample.altitude.sin();
            total += weight;
            let blocked = ray_hits(model, point, sample.direction, SOLAR_RADIUS_M)
                .into_iter()
                .any(|(dist, height)| height.atan2(dist.max(f64::EPSILON)) > sample.altitude);
            if !blocked {
                lit += weight;
            }
        }
        if total > 0.0 {
            lit / total
        } else {
            0.0
        }
    }
}

impl SimulationKernel for SolarKernel {
    fn execute(
        &self,
        points: &[Coordinate],
        model: &ObstructionModel,
        _cell_size: f64,
    ) -> Result<Option<Vec<f64>>, KernelError> {
        Ok(Some(
            points
                .iter()
                .map(|p| (self.exposure(model, *p) * 100.0).clamp(0.0, 100.0))
                .collect(),
        ))
    }
}

/// Wind permeability, 0 to 100.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindKernel;

impl WindKernel {
    fn permeability(model: &ObstructionModel, point: Coordinate) -> f64 {
        let sum: f64 = azimuths(WIND_RAYS)
            .map(|az| {
                let free = ray_hits(model, point, (az.sin(), az.cos()), WIND_RADIUS_M)
                    .into_iter()
                    .map(|(dist, _)| dist)
                    .fold(WIND_RADIUS_M, f64::min);
                free / WIND_RADIUS_M
            })
            .sum();
        sum / WIND_RAYS as f64
    }
}

impl SimulationKernel for WindKernel {
    fn execute(
        &self,
        points: &[Coordinate],
        model: &ObstructionModel,
        _cell_size: f64,
    ) -> Result<Option<Vec<f64>>, KernelError> {
        Ok(Some(
            points
                .iter()
                .map(|p| (Self::permeability(model, *p) * 100.0).clamp(0.0, 100.0))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exposure_common::BoundingBox;
    use geo::polygon;
    use grid_scheduler::Obstruction;
    use test_utils::assert_approx_eq;

    fn open() -> ObstructionModel {
        ObstructionModel::new(BoundingBox::new(-500.0, -500.0, 500.0, 500.0), vec![])
    }

    /// A 20 m tall block whose near face is 10 m east of the origin.
    fn east_block() -> ObstructionModel {
        let footprint = polygon![
            (x: 10.0, y: -50.0),
            (x: 60.0, y: -50.0),
            (x: 60.0, y: 50.0),
            (x: 10.0, y: 50.0),
        ];
        ObstructionModel::new(
            BoundingBox::new(-500.0, -500.0, 500.0, 500.0),
            vec![Obstruction::new(footprint, 20.0)],
        )
    }

    fn run(kernel: &dyn SimulationKernel, model: &ObstructionModel) -> f64 {
        kernel
            .execute(&[Coordinate::new(0.0, 0.0)], model, 1.0)
            .unwrap()
            .unwrap()[0]
    }

    #[test]
    fn test_open_terrain_is_fully_exposed() {
        let model = open();
        assert_eq!(run(&SkyViewKernel, &model), 100.0);
        assert_eq!(run(&WindKernel, &model), 100.0);
        assert_eq!(run(&SolarKernel::new(SITE_LAT), &model), 100.0);
        assert_approx_eq!(run(&UhiKernel, &model), UHI_SLOPE + UHI_INTERCEPT, 1e-12);
    }

    #[test]
    fn test_building_reduces_exposure() {
        let model = east_block();
        assert!(run(&SkyViewKernel, &model) < 100.0);
        assert!(run(&SolarKernel::new(SITE_LAT), &model) < 100.0);
        assert!(run(&UhiKernel, &model) > UHI_SLOPE + UHI_INTERCEPT);
    }

    #[test]
    fn test_wind_free_distance() {
        // east ray stops after 10 of 200 m, the other three are free
        let expected = (3.0 + 10.0 / WIND_RADIUS_M) / 4.0 * 100.0;
        assert_approx_eq!(run(&WindKernel, &east_block()), expected, 1e-9);
    }

    #[test]
    fn test_point_inside_building_ignores_it() {
        let model = east_block();
        let out = WindKernel
            .execute(&[Coordinate::new(30.0, 0.0)], &model, 1.0)
            .unwrap()
            .unwrap();
        assert_eq!(out, vec![100.0]);
    }

    #[test]
    fn test_output_matches_input_length() {
        let points: Vec<Coordinate> = (0..7).map(|i| Coordinate::new(i as f64, 0.0)).collect();
        let out = SkyViewKernel.execute(&points, &open(), 1.0).unwrap().unwrap();
        assert_eq!(out.len(), 7);
    }

    #[test]
    fn test_registry_has_every_metric() {
        assert_eq!(reference_kernels().metrics(), Metric::ALL.to_vec());
    }
}

//! Boundary filter checked against a straightforward reference.

use std::sync::Arc;

use exposure_common::Coordinate;
use grid_scheduler::task::{Candidate, FilterTask};
use grid_scheduler::{BoundaryFilter, OffsetContains};

/// Even-odd ray cast.
fn inside(ring: &[Coordinate], p: &Coordinate) -> bool {
    let mut inside = false;
    for w in ring.windows(2) {
        let (a, b) = (w[0], w[1]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

fn segment_distance(a: &Coordinate, b: &Coordinate, p: &Coordinate) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

fn boundary_distance(ring: &[Coordinate], p: &Coordinate) -> f64 {
    ring.windows(2)
        .map(|w| segment_distance(&w[0], &w[1], p))
        .fold(f64::INFINITY, f64::min)
}

/// Irregular pentagon with a concave notch.
fn ring() -> Vec<Coordinate> {
    [
        (3.0, 1.0),
        (41.0, 4.0),
        (37.0, 33.0),
        (20.0, 17.0),
        (6.0, 38.0),
        (3.0, 1.0),
    ]
    .into_iter()
    .map(|(x, y)| Coordinate::new(x, y))
    .collect()
}

#[test]
fn test_filter_matches_reference() {
    let ring = ring();
    let cell = 3.0;
    let half = cell / 2.0;
    let filter = BoundaryFilter::new(&ring, cell, Arc::new(OffsetContains));

    let mut checked = 0;
    for gy in -3..16 {
        for gx in -3..16 {
            let corner = Coordinate::new(gx as f64 * cell, gy as f64 * cell);
            let center = Coordinate::new(corner.x + half, corner.y + half);
            let distance = boundary_distance(&ring, &center);
            // skip centers sitting on the grown edge
            if (distance - half).abs() < 1e-6 {
                continue;
            }
            let expected = inside(&ring, &center) || distance <= half;
            assert_eq!(
                filter.keeps(&corner),
                expected,
                "cell at ({}, {}) center ({}, {})",
                gx,
                gy,
                center.x,
                center.y
            );
            checked += 1;
        }
    }
    assert!(checked > 300);
}

#[test]
fn test_filter_batch_preserves_global_indices() {
    let ring = ring();
    let cell = 3.0;
    let filter = BoundaryFilter::new(&ring, cell, Arc::new(OffsetContains));

    // one row of cells at y = 6, starting at global index 100
    let slots: Vec<Option<Candidate>> = (0..16)
        .map(|gx| {
            Some(Candidate {
                coord: Coordinate::new(gx as f64 * cell, 6.0),
                cached: None,
            })
        })
        .collect();
    let out = filter.filter_batch(FilterTask { start: 100, slots });

    assert!(!out.kept.is_empty());
    assert_eq!(out.kept.len(), out.indices.len());
    for (candidate, idx) in out.kept.iter().zip(&out.indices) {
        let gx = idx - 100;
        assert_eq!(candidate.coord.x, gx as f64 * cell);
        assert!(filter.keeps(&candidate.coord));
    }
    // indices ascend
    assert!(out.indices.windows(2).all(|w| w[0] < w[1]));
}

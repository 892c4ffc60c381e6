//! Grid alignment tests for GridSpec.

use exposure_common::{BoundingBox, Coordinate, GridSpec};

fn assert_aligned(grid: &GridSpec, idx: usize) {
    let c = grid.cell_coord(idx);
    let kx = c.x / grid.cell_size;
    let ky = c.y / grid.cell_size;
    assert!((kx - kx.round()).abs() < 1e-9, "x not aligned: {}", c.x);
    assert!((ky - ky.round()).abs() < 1e-9, "y not aligned: {}", c.y);
}

// ============================================================================
// Alignment
// ============================================================================

#[test]
fn test_every_cell_is_a_cell_multiple() {
    let extents = [
        BoundingBox::new(0.3, 0.7, 97.1, 41.9),
        BoundingBox::new(-1234.5, -88.8, -1001.0, 12.25),
        BoundingBox::new(10.0, 10.0, 20.0, 20.0),
    ];
    for extent in extents {
        for cell in [1.0, 2.0, 5.0, 10.0] {
            let grid = GridSpec::covering(&extent, cell).unwrap();
            for idx in 0..grid.len() {
                assert_aligned(&grid, idx);
            }
        }
    }
}

#[test]
fn test_grid_covers_extent() {
    let extent = BoundingBox::new(-1234.5, -88.8, -1001.0, 12.25);
    for cell in [1.0, 2.0, 5.0, 10.0] {
        let grid = GridSpec::covering(&extent, cell).unwrap();
        let origin = grid.origin();
        assert!(origin.x <= extent.min_x);
        assert!(origin.y <= extent.min_y);
        assert!(origin.x + grid.cols as f64 * cell >= extent.max_x);
        assert!(origin.y + grid.rows as f64 * cell >= extent.max_y);
        // no spare column or row
        assert!(origin.x + (grid.cols - 1) as f64 * cell < extent.max_x);
        assert!(origin.y + (grid.rows - 1) as f64 * cell < extent.max_y);
    }
}

// ============================================================================
// Index addressing
// ============================================================================

#[test]
fn test_row_major_addressing() {
    let grid = GridSpec::covering(&BoundingBox::new(0.0, 0.0, 30.0, 20.0), 10.0).unwrap();
    assert_eq!((grid.cols, grid.rows), (3, 2));
    assert_eq!(grid.col_row(0), (0, 0));
    assert_eq!(grid.col_row(2), (2, 0));
    assert_eq!(grid.col_row(3), (0, 1));
    assert_eq!(grid.cell_coord(4), Coordinate::new(10.0, 10.0));
    assert_eq!(grid.global_cell(5), (2, 1));
}

#[test]
fn test_same_cell_same_global_address() {
    let a = GridSpec::covering(&BoundingBox::new(0.0, 0.0, 50.0, 50.0), 5.0).unwrap();
    let b = GridSpec::covering(&BoundingBox::new(12.0, 7.0, 40.0, 33.0), 5.0).unwrap();
    // b's first cell sits at (10, 5), which is a's cell (col 2, row 1)
    assert_eq!(b.global_cell(0), a.global_cell(a.cols + 2));
}

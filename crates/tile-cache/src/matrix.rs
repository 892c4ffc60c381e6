//! In-memory tile matrix and its on-disk encoding.

use crate::error::{Result, TileCacheError};
use crate::key::TileKey;

/// A `span x span` block of nullable cell values.
///
/// Stored flat in row-major order (`local_row * span + local_col`). On disk
/// the matrix is a JSON array of `span` rows, each an array of `span`
/// numbers or `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMatrix {
    span: usize,
    cells: Vec<Option<f64>>,
}

impl TileMatrix {
    /// A matrix with every cell unknown.
    pub fn empty(span: usize) -> Self {
        Self {
            span,
            cells: vec![None; span * span],
        }
    }

    pub fn span(&self) -> usize {
        self.span
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        self.cells.get(row * self.span + col).copied().flatten()
    }

    pub fn set(&mut self, col: usize, row: usize, value: f64) {
        let i = row * self.span + col;
        if let Some(cell) = self.cells.get_mut(i) {
            *cell = Some(value);
        }
    }

    /// Number of cells holding a value.
    pub fn known(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Decode a tile file body, validating its shape.
    pub fn decode(key: &TileKey, bytes: &[u8]) -> Result<Self> {
        let rows: Vec<Vec<Option<f64>>> = serde_json::from_slice(bytes)
            .map_err(|e| TileCacheError::corrupt(key, e.to_string()))?;

        let span = key.span;
        let bad_row = rows.iter().find(|r| r.len() != span);
        if rows.len() != span || bad_row.is_some() {
            return Err(TileCacheError::Shape {
                key: key.to_string(),
                rows: rows.len(),
                cols: bad_row.map(|r| r.len()).unwrap_or(span),
                span,
            });
        }

        Ok(Self {
            span,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    /// Encode as the nested JSON row layout.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        let rows: Vec<&[Option<f64>]> = self.cells.chunks(self.span).collect();
        serde_json::to_vec(&rows)
    }
}

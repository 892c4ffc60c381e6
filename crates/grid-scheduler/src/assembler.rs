//! Merging computed and cached values and writing them back to the cache.

use exposure_common::GridSpec;
use serde::Serialize;
use tile_cache::{FlushStats, TileCacheStore, TileSet};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Values paired with their grid indices, computed first then cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssembledResult {
    pub values: Vec<f64>,
    pub indices: Vec<usize>,
    /// How many leading entries came from the kernel.
    pub computed: usize,
}

impl AssembledResult {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Dense grid-ordered vector of `grid_len` slots; `None` where a cell
    /// was filtered out or its task failed.
    pub fn to_grid_vector(&self, grid_len: usize) -> Vec<Option<f64>> {
        let mut dense = vec![None; grid_len];
        for (value, &idx) in self.values.iter().zip(&self.indices) {
            if let Some(slot) = dense.get_mut(idx) {
                *slot = Some(*value);
            }
        }
        dense
    }
}

/// Writes results into the session's tiles and persists them.
pub struct ResultAssembler<'a> {
    store: &'a TileCacheStore,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> ResultAssembler<'a> {
    pub fn new(store: &'a TileCacheStore) -> Self {
        Self {
            store,
            cancel: None,
        }
    }

    /// Stop flushing at the next tile once `token` fires.
    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Concatenate `computed` then `cached`, record every value in `tiles`
    /// and flush the dirty tiles.
    ///
    /// Cells already holding the identical value are not rewritten, so a
    /// fully cached request writes nothing. Non-finite values are returned
    /// but never cached.
    pub async fn merge(
        &self,
        grid: &GridSpec,
        tiles: &mut TileSet,
        computed: (Vec<f64>, Vec<usize>),
        cached: (Vec<f64>, Vec<usize>),
    ) -> Result<(AssembledResult, FlushStats)> {
        let (mut values, mut indices) = computed;
        let computed_len = values.len();
        values.extend(cached.0);
        indices.extend(cached.1);

        for (value, &idx) in values.iter().zip(&indices) {
            if !value.is_finite() {
                continue;
            }
            let (gx, gy) = grid.global_cell(idx);
            if tiles.get(gx, gy).map(f64::to_bits) != Some(value.to_bits()) {
                tiles.set(gx, gy, *value);
            }
        }

        let cancel = self.cancel;
        let flushed = self
            .store
            .flush_while(tiles, || !cancel.is_some_and(|t| t.is_cancelled()))
            .await?;
        Ok((
            AssembledResult {
                values,
                indices,
                computed: computed_len,
            },
            flushed,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedulerError;
    use exposure_common::{BoundingBox, Metric};
    use tile_cache::TileCacheError;

    #[test]
    fn test_to_grid_vector() {
        let result = AssembledResult {
            values: vec![1.0, 2.0],
            indices: vec![3, 0],
            computed: 1,
        };
        assert_eq!(result.to_grid_vector(4), vec![Some(2.0), None, None, Some(1.0)]);
    }

    #[tokio::test]
    async fn test_merge_orders_computed_first_and_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let store = TileCacheStore::open(dir.path(), 200, 4).unwrap();
        let grid = GridSpec::covering(&BoundingBox::new(0.0, 0.0, 10.0, 10.0), 5.0).unwrap();
        let mut tiles = store.warm(Metric::Sky, &grid).await.unwrap();

        let (result, flushed) = ResultAssembler::new(&store)
            .merge(&grid, &mut tiles, (vec![7.0, f64::NAN], vec![2, 3]), (vec![], vec![]))
            .await
            .unwrap();
        assert_eq!(result.indices, vec![2, 3]);
        assert_eq!(result.computed, 2);
        assert_eq!(flushed.cells, 1);

        // a rerun with only cache hits writes nothing
        let mut tiles = store.warm(Metric::Sky, &grid).await.unwrap();
        assert_eq!(tiles.get(0, 1), Some(7.0));
        let (_, flushed) = ResultAssembler::new(&store)
            .merge(&grid, &mut tiles, (vec![], vec![]), (vec![7.0], vec![2]))
            .await
            .unwrap();
        assert_eq!(flushed.tiles, 0);
    }

    #[tokio::test]
    async fn test_cancelled_merge_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = TileCacheStore::open(dir.path(), 200, 4).unwrap();
        let grid = GridSpec::covering(&BoundingBox::new(0.0, 0.0, 10.0, 10.0), 5.0).unwrap();
        let mut tiles = store.warm(Metric::Sky, &grid).await.unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = ResultAssembler::new(&store)
            .with_cancellation(&token)
            .merge(&grid, &mut tiles, (vec![1.0, 2.0], vec![0, 1]), (vec![], vec![]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Cache(TileCacheError::Interrupted { tiles_written: 0 })
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

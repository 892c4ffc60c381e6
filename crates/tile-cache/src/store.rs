//! File-backed tile store shared by all sessions.
//!
//! ## Layout
//!
//! One JSON file per tile under the cache root, named by
//! [`TileKey::file_name`]. Files are replaced atomically (temp file in the
//! same directory, then rename), so readers never see a half-written tile.
//!
//! ## Concurrency
//!
//! Sessions read tiles freely. Writes to one tile are serialized through a
//! per-key async mutex: the flushing session re-reads the current file under
//! the lock and applies only the cells it set, so overlapping sessions never
//! lose each other's results.
//!
//! ## Memory layer
//!
//! Recently used tiles are kept in a bounded LRU so repeated requests over
//! the same area skip the file read. Every write goes through the store,
//! which refreshes the LRU entry under the tile lock.

use std::collections::HashMap;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use exposure_common::{GridSpec, Metric};
use lru::LruCache;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, TileCacheError};
use crate::key::TileKey;
use crate::matrix::TileMatrix;
use crate::tile_set::TileSet;

/// Default tile span (cells per side).
pub const DEFAULT_TILE_SPAN: usize = 200;

/// Default number of tiles kept in memory.
pub const DEFAULT_MEMORY_TILES: usize = 64;

/// Statistics for the tile store.
///
/// All fields are atomic for lock-free reads from stats endpoints.
#[derive(Default)]
pub struct TileCacheStats {
    /// Tiles read from disk
    pub tiles_loaded: AtomicU64,
    /// Tiles allocated empty because no file existed
    pub tiles_created: AtomicU64,
    /// Tiles served from the memory layer
    pub memory_hits: AtomicU64,
    /// Tile files written
    pub tiles_written: AtomicU64,
    /// Individual cells written
    pub cells_written: AtomicU64,
}

impl TileCacheStats {
    /// Fraction of tile lookups served from memory, as a percentage (0-100).
    pub fn memory_hit_rate(&self) -> f64 {
        let hits = self.memory_hits.load(Ordering::Relaxed);
        let total = hits
            + self.tiles_loaded.load(Ordering::Relaxed)
            + self.tiles_created.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    pub fn snapshot(&self) -> TileCacheStatsSnapshot {
        TileCacheStatsSnapshot {
            tiles_loaded: self.tiles_loaded.load(Ordering::Relaxed),
            tiles_created: self.tiles_created.load(Ordering::Relaxed),
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            tiles_written: self.tiles_written.load(Ordering::Relaxed),
            cells_written: self.cells_written.load(Ordering::Relaxed),
            memory_hit_rate: self.memory_hit_rate(),
        }
    }
}

/// Point-in-time copy of [`TileCacheStats`].
#[derive(Debug, Clone, Serialize)]
pub struct TileCacheStatsSnapshot {
    pub tiles_loaded: u64,
    pub tiles_created: u64,
    pub memory_hits: u64,
    pub tiles_written: u64,
    pub cells_written: u64,
    pub memory_hit_rate: f64,
}

/// Outcome of a [`TileCacheStore::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub tiles: usize,
    pub cells: usize,
}

pub struct TileCacheStore {
    root: PathBuf,
    span: usize,
    memory: Mutex<LruCache<TileKey, Arc<TileMatrix>>>,
    locks: Mutex<HashMap<TileKey, Arc<tokio::sync::Mutex<()>>>>,
    stats: Arc<TileCacheStats>,
}

impl TileCacheStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, span: usize, memory_tiles: usize) -> Result<Self> {
        if span == 0 {
            return Err(TileCacheError::InvalidSpan(span));
        }
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| TileCacheError::io(&root, e))?;

        let capacity = NonZeroUsize::new(memory_tiles.max(1)).unwrap_or(NonZeroUsize::MIN);
        info!(
            root = %root.display(),
            span = span,
            memory_tiles = capacity.get(),
            "Tile cache opened"
        );

        Ok(Self {
            root,
            span,
            memory: Mutex::new(LruCache::new(capacity)),
            locks: Mutex::new(HashMap::new()),
            stats: Arc::new(TileCacheStats::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn span(&self) -> usize {
        self.span
    }

    pub fn stats(&self) -> &TileCacheStats {
        &self.stats
    }

    /// Path of the file backing `key`.
    pub fn tile_path(&self, key: &TileKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Load every tile overlapping `grid` into a fresh [`TileSet`].
    ///
    /// Missing files yield empty tiles. A file that exists but does not
    /// decode fails the whole warm.
    pub async fn warm(&self, metric: Metric, grid: &GridSpec) -> Result<TileSet> {
        let keys = TileKey::covering(metric, grid, self.span);
        let mut set = TileSet::new(metric, grid.cell_size, self.span);

        for key in keys {
            let matrix = self.load(&key).await?;
            set.insert(key, (*matrix).clone());
        }

        debug!(
            metric = %metric,
            cell_size = grid.cell_size,
            tiles = set.tile_count(),
            "Tiles warmed"
        );
        Ok(set)
    }

    /// Current contents of one tile.
    pub async fn load(&self, key: &TileKey) -> Result<Arc<TileMatrix>> {
        if let Some(hit) = self.memory_get(key) {
            self.stats.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        // A concurrent flush may be replacing this tile.
        let lock = self.lock_for(key);
        let loaded = {
            let _guard = lock.lock().await;
            self.load_locked(key).await
        };
        self.release_lock(key, lock);
        loaded
    }

    async fn load_locked(&self, key: &TileKey) -> Result<Arc<TileMatrix>> {
        if let Some(hit) = self.memory_get(key) {
            self.stats.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        let matrix = Arc::new(match self.read_file(key).await? {
            Some(m) => {
                self.stats.tiles_loaded.fetch_add(1, Ordering::Relaxed);
                m
            }
            None => {
                self.stats.tiles_created.fetch_add(1, Ordering::Relaxed);
                TileMatrix::empty(self.span)
            }
        });
        self.memory_put(*key, matrix.clone());
        Ok(matrix)
    }

    /// Persist every tile the set wrote to.
    ///
    /// For each dirty tile: take the tile lock, re-read the file, apply this
    /// set's cells, write the full matrix atomically. The set's pending
    /// writes are consumed even if a later tile fails.
    pub async fn flush(&self, set: &mut TileSet) -> Result<FlushStats> {
        self.flush_while(set, || true).await
    }

    /// Like [`TileCacheStore::flush`], but checks `proceed` before each tile
    /// and stops with [`TileCacheError::Interrupted`] once it returns false.
    /// Tiles already written stay written.
    pub async fn flush_while<F>(&self, set: &mut TileSet, proceed: F) -> Result<FlushStats>
    where
        F: Fn() -> bool,
    {
        let pending = set.take_pending();
        let mut stats = FlushStats::default();

        for (key, writes) in pending {
            if !proceed() {
                debug!(tiles = stats.tiles, "Flush interrupted");
                return Err(TileCacheError::Interrupted {
                    tiles_written: stats.tiles,
                });
            }

            let lock = self.lock_for(&key);
            let written = {
                let _guard = lock.lock().await;
                self.write_tile_locked(&key, &writes).await
            };
            self.release_lock(&key, lock);
            written?;

            stats.tiles += 1;
            stats.cells += writes.len();
            self.stats.tiles_written.fetch_add(1, Ordering::Relaxed);
            self.stats
                .cells_written
                .fetch_add(writes.len() as u64, Ordering::Relaxed);
        }

        if stats.tiles > 0 {
            debug!(tiles = stats.tiles, cells = stats.cells, "Tiles flushed");
        }
        Ok(stats)
    }

    async fn write_tile_locked(
        &self,
        key: &TileKey,
        writes: &[(usize, usize, f64)],
    ) -> Result<()> {
        let mut matrix = self
            .read_file(key)
            .await?
            .unwrap_or_else(|| TileMatrix::empty(self.span));
        for &(col, row, value) in writes {
            matrix.set(col, row, value);
        }

        self.write_file(key, &matrix).await?;
        self.memory_put(*key, Arc::new(matrix));
        Ok(())
    }

    /// Drop all tiles from the memory layer.
    pub fn clear_memory(&self) {
        if let Ok(mut memory) = self.memory.lock() {
            memory.clear();
        }
    }

    fn memory_get(&self, key: &TileKey) -> Option<Arc<TileMatrix>> {
        self.memory.lock().ok()?.get(key).cloned()
    }

    fn memory_put(&self, key: TileKey, matrix: Arc<TileMatrix>) {
        match self.memory.lock() {
            Ok(mut memory) => {
                memory.put(key, matrix);
            }
            Err(_) => warn!(tile = %key, "Tile memory layer poisoned, skipping insert"),
        }
    }

    /// Number of tile locks currently held or awaited.
    pub fn lock_count(&self) -> usize {
        self.locks().len()
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<TileKey, Arc<tokio::sync::Mutex<()>>>> {
        match self.locks.lock() {
            Ok(l) => l,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_for(&self, key: &TileKey) -> Arc<tokio::sync::Mutex<()>> {
        self.locks().entry(*key).or_default().clone()
    }

    /// Drop the map entry for `key` unless another caller still holds it.
    fn release_lock(&self, key: &TileKey, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks();
        // one reference in the map, one in `lock`
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    async fn read_file(&self, key: &TileKey) -> Result<Option<TileMatrix>> {
        let path = self.tile_path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => TileMatrix::decode(key, &bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TileCacheError::io(path, e)),
        }
    }

    async fn write_file(&self, key: &TileKey, matrix: &TileMatrix) -> Result<()> {
        let path = self.tile_path(key);
        let bytes = matrix
            .encode()
            .map_err(|e| TileCacheError::corrupt(key, e.to_string()))?;
        let dir = self.root.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp =
                tempfile::NamedTempFile::new_in(&dir).map_err(|e| TileCacheError::io(&dir, e))?;
            tmp.write_all(&bytes)
                .map_err(|e| TileCacheError::io(tmp.path(), e))?;
            tmp.as_file()
                .sync_all()
                .map_err(|e| TileCacheError::io(tmp.path(), e))?;
            tmp.persist(&path)
                .map_err(|e| TileCacheError::io(&path, e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| TileCacheError::Join(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exposure_common::BoundingBox;

    fn grid() -> GridSpec {
        GridSpec::covering(&BoundingBox::new(0.0, 0.0, 10.0, 10.0), 5.0).unwrap()
    }

    #[tokio::test]
    async fn test_warm_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = TileCacheStore::open(dir.path(), 4, 8).unwrap();
        let set = store.warm(Metric::Sky, &grid()).await.unwrap();
        assert_eq!(set.tile_count(), 1);
        assert_eq!(set.get(0, 0), None);
        assert_eq!(store.stats().snapshot().tiles_created, 1);
    }

    #[tokio::test]
    async fn test_second_warm_hits_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = TileCacheStore::open(dir.path(), 4, 8).unwrap();
        store.warm(Metric::Sky, &grid()).await.unwrap();
        store.warm(Metric::Sky, &grid()).await.unwrap();
        let snap = store.stats().snapshot();
        assert_eq!(snap.memory_hits, 1);
        assert!((snap.memory_hit_rate - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_locks_released_after_use() {
        let dir = tempfile::tempdir().unwrap();
        let store = TileCacheStore::open(dir.path(), 4, 8).unwrap();
        let mut set = store.warm(Metric::Sky, &grid()).await.unwrap();
        assert_eq!(store.lock_count(), 0);

        set.set(0, 0, 1.0);
        store.flush(&mut set).await.unwrap();
        assert_eq!(store.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_flush_while_stops_before_next_tile() {
        let dir = tempfile::tempdir().unwrap();
        let store = TileCacheStore::open(dir.path(), 4, 8).unwrap();
        let wide = GridSpec::covering(&BoundingBox::new(0.0, 0.0, 40.0, 10.0), 5.0).unwrap();
        let mut set = store.warm(Metric::Sky, &wide).await.unwrap();
        set.set(0, 0, 1.0);
        set.set(5, 0, 2.0);
        assert_eq!(set.dirty_count(), 2);

        let checks = std::sync::atomic::AtomicUsize::new(0);
        let err = store
            .flush_while(&mut set, || checks.fetch_add(1, Ordering::SeqCst) == 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TileCacheError::Interrupted { tiles_written: 1 }));
        assert_eq!(store.stats().snapshot().tiles_written, 1);
        assert_eq!(set.dirty_count(), 0);
        assert_eq!(store.lock_count(), 0);
    }

    #[test]
    fn test_zero_span_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            TileCacheStore::open(dir.path(), 0, 8),
            Err(TileCacheError::InvalidSpan(0))
        ));
    }
}

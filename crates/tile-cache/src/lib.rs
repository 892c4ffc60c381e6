//! Persistent tile cache for per-cell exposure results.
//!
//! Results are grouped into square tiles of `span x span` cells keyed by
//! `(metric, cell size, tile origin)`. A request warms the tiles covering
//! its grid into a [`TileSet`], reads and writes cells there, and hands the
//! set back to [`TileCacheStore::flush`] once its results are final.

pub mod error;
pub mod key;
pub mod matrix;
pub mod store;
pub mod tile_set;

pub use error::{Result, TileCacheError};
pub use key::TileKey;
pub use matrix::TileMatrix;
pub use store::{
    FlushStats, TileCacheStats, TileCacheStatsSnapshot, TileCacheStore, DEFAULT_MEMORY_TILES,
    DEFAULT_TILE_SPAN,
};
pub use tile_set::TileSet;

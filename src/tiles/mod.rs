//! Tile residency: the texture cache, the tile source boundary and the fetch pool.

pub mod cache;
pub mod scheduler;
pub mod source;

// Re-exports for convenience
pub use cache::{CacheEntry, TileCache};
pub use scheduler::{FetchScheduler, ReadyTile, RequestStatus, SchedulerStats};
pub use source::{FetchOutcome, TileSource};

#[cfg(feature = "http")]
pub use source::HttpTileSource;

//! Core constants derived from common slippy-map conventions.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Square tile size in pixels.
pub const TILE_SIZE: f64 = 256.0;

/// Lowest zoom level the viewport accepts.
pub const MIN_ZOOM: u8 = 0;

/// Highest zoom level the viewport accepts (standard OSM pyramid depth).
pub const MAX_ZOOM: u8 = 19;

/// Zoom level used when seeding a viewport from a location fix.
pub const DEFAULT_ZOOM: u8 = 15;

/// Minimum time between two accepted zoom changes.
pub const ZOOM_DEBOUNCE_MS: i64 = 300;

/// Exponential smoothing factor applied to pan deltas.
pub const PAN_SMOOTHING: f64 = 0.15;

/// Multiplier from screen pixels to offset pixels.
pub const PAN_GAIN: f64 = 1.0;

/// Latitude limit of the spherical Web-Mercator projection.
pub const MAX_LATITUDE: f64 = 85.051_128_779_8;

/// Concurrent tile fetches.
pub const DEFAULT_FETCH_WORKERS: usize = 6;

/// Extra ring of tiles kept around the visible grid before eviction.
pub const DEFAULT_EVICTION_MARGIN: u32 = 2;

/// Visible grid radius in tiles, per direction.
pub const DEFAULT_GRID_RADIUS: u32 = 4;

//! Engine configuration
//!
//! Settings are grouped per component the same way the engine is wired:
//! viewport motion, visible grid, tile cache and fetch pool. Every group has
//! sensible defaults so a partial JSON document is enough to override a few
//! values.

use crate::core::constants::{
    DEFAULT_EVICTION_MARGIN, DEFAULT_FETCH_WORKERS, DEFAULT_GRID_RADIUS, MAX_ZOOM, MIN_ZOOM,
    PAN_GAIN, PAN_SMOOTHING, ZOOM_DEBOUNCE_MS,
};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Highest zoom level a configuration may allow; keeps `2^zoom` inside `i32`.
const ZOOM_CEILING: u8 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Zoom events closer together than this are ignored
    pub zoom_debounce_ms: i64,
    pub pan_gain: f64,
    /// Blend factor in (0, 1]; 1.0 applies deltas unsmoothed
    pub pan_smoothing: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            zoom_debounce_ms: ZOOM_DEBOUNCE_MS,
            pan_gain: PAN_GAIN,
            pan_smoothing: PAN_SMOOTHING,
        }
    }
}

/// Visible grid radius around the viewport tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub tiles_x: u32,
    pub tiles_y: u32,
}

impl GridConfig {
    /// Number of tiles in one full frame.
    pub fn tile_count(&self) -> usize {
        (2 * self.tiles_x as usize + 1) * (2 * self.tiles_y as usize + 1)
    }

    /// Radius used when deciding which cached tiles are still near the view.
    pub fn keep_radius(&self) -> u32 {
        self.tiles_x.max(self.tiles_y)
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            tiles_x: DEFAULT_GRID_RADIUS,
            tiles_y: DEFAULT_GRID_RADIUS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on resident tiles
    pub capacity: usize,
    /// Tiles kept beyond the visible radius before proximity eviction
    pub eviction_margin: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 512,
            eviction_margin: DEFAULT_EVICTION_MARGIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Size of the worker pool
    pub workers: usize,
    /// Attempts after the first one for transient failures
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub exponential_backoff: bool,
}

impl FetchConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = if self.exponential_backoff {
            2_u64.saturating_pow(attempt.saturating_sub(1))
        } else {
            1
        };
        Duration::from_millis(self.retry_delay_ms.saturating_mul(multiplier))
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_FETCH_WORKERS,
            max_retries: 3,
            retry_delay_ms: 200,
            exponential_backoff: true,
        }
    }
}

/// Settings for the HTTP tile source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSourceConfig {
    /// URL with `{z}`, `{x}`, `{y}` and optional `{s}` placeholders
    pub url_template: String,
    pub subdomains: Vec<String>,
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            subdomains: Vec::new(),
            user_agent: concat!("slipmap/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub viewport: ViewportConfig,
    pub grid: GridConfig,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub http: HttpSourceConfig,
}

impl EngineConfig {
    /// Smaller grid, fewer workers and a tighter cache for constrained devices.
    pub fn low_resource() -> Self {
        Self {
            grid: GridConfig {
                tiles_x: 2,
                tiles_y: 2,
            },
            cache: CacheConfig {
                capacity: 64,
                eviction_margin: 1,
            },
            fetch: FetchConfig {
                workers: 2,
                max_retries: 1,
                retry_delay_ms: 500,
                exponential_backoff: false,
            },
            ..Default::default()
        }
    }

    /// Deterministic settings for tests: one worker, no retry delay.
    pub fn for_testing() -> Self {
        Self {
            fetch: FetchConfig {
                workers: 1,
                max_retries: 2,
                retry_delay_ms: 0,
                exponential_backoff: false,
            },
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let vp = &self.viewport;
        if vp.min_zoom > vp.max_zoom {
            return Err(MapError::InvalidConfig(format!(
                "min_zoom {} exceeds max_zoom {}",
                vp.min_zoom, vp.max_zoom
            )));
        }
        if vp.max_zoom > ZOOM_CEILING {
            return Err(MapError::InvalidConfig(format!(
                "max_zoom {} exceeds {}",
                vp.max_zoom, ZOOM_CEILING
            )));
        }
        if !(vp.pan_smoothing > 0.0 && vp.pan_smoothing <= 1.0) {
            return Err(MapError::InvalidConfig(format!(
                "pan_smoothing must be in (0, 1], got {}",
                vp.pan_smoothing
            )));
        }
        if !vp.pan_gain.is_finite() {
            return Err(MapError::InvalidConfig("pan_gain must be finite".to_string()));
        }
        if vp.zoom_debounce_ms < 0 {
            return Err(MapError::InvalidConfig(
                "zoom_debounce_ms must not be negative".to_string(),
            ));
        }
        if self.fetch.workers == 0 {
            return Err(MapError::InvalidConfig(
                "fetch pool needs at least one worker".to_string(),
            ));
        }
        if self.cache.capacity < self.grid.tile_count() {
            return Err(MapError::InvalidConfig(format!(
                "cache capacity {} cannot hold a full frame of {} tiles",
                self.cache.capacity,
                self.grid.tile_count()
            )));
        }
        Ok(())
    }
}

use crate::core::config::ViewportConfig;
use crate::core::constants::TILE_SIZE;
use crate::core::geo::{LatLng, TileKey};
use crate::core::projection::Projection;
use crate::location::LocationProvider;
use crate::Result;

/// An accepted zoom transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomChange {
    pub from: u8,
    pub to: u8,
}

/// Which way pending sub-tile motion overflows on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Carry {
    None,
    Diagonal(i32, i32),
    Horizontal(i32),
    Vertical(i32),
}

impl Carry {
    fn detect(offset_x: f64, offset_y: f64) -> Self {
        match (overflow(offset_x), overflow(offset_y)) {
            (0, 0) => Carry::None,
            (sx, 0) => Carry::Horizontal(sx),
            (0, sy) => Carry::Vertical(sy),
            (sx, sy) => Carry::Diagonal(sx, sy),
        }
    }
}

fn overflow(offset: f64) -> i32 {
    if offset >= TILE_SIZE {
        1
    } else if offset <= -TILE_SIZE {
        -1
    } else {
        0
    }
}

/// Whole tiles in `offset` beyond the first one, so that at most a single
/// carry per axis remains for the step-wise pass.
fn bulk_tiles(offset: f64) -> i32 {
    let whole = (offset / TILE_SIZE).trunc();
    if whole.abs() > 1.0 {
        (whole - whole.signum()).clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
    } else {
        0
    }
}

/// The map view: integer tile position at the current zoom plus the sub-tile
/// pixel remainder.
///
/// Mutated only from the frame thread. Total horizontal displacement is
/// `tile_x * TILE_SIZE + offset_x` (same for y), and every pan preserves it
/// while keeping both offsets strictly inside `(-TILE_SIZE, TILE_SIZE)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    zoom: u8,
    tile_x: i32,
    tile_y: i32,
    offset_x: f64,
    offset_y: f64,
    last_zoom_ms: Option<i64>,
    config: ViewportConfig,
}

impl Viewport {
    /// Creates a viewport centred on `center`, with the zoom clamped to the configured range.
    pub fn new(center: LatLng, zoom: u8, config: ViewportConfig) -> Self {
        let zoom = zoom.clamp(config.min_zoom, config.max_zoom);
        let (tile_x, tile_y) = Projection::to_tile(center.lat, center.lng, zoom);
        Self::at_tile(zoom, tile_x, tile_y, config)
    }

    /// Creates a viewport positioned directly on a tile.
    pub fn at_tile(zoom: u8, tile_x: i32, tile_y: i32, config: ViewportConfig) -> Self {
        Self {
            zoom: zoom.clamp(config.min_zoom, config.max_zoom),
            tile_x,
            tile_y,
            offset_x: 0.0,
            offset_y: 0.0,
            last_zoom_ms: None,
            config,
        }
    }

    /// Seeds a viewport from a one-shot location fix.
    ///
    /// An unavailable location is returned as an error so the caller can pick a
    /// fallback position; it never affects an already running engine.
    pub async fn from_location(
        provider: &dyn LocationProvider,
        zoom: u8,
        config: ViewportConfig,
    ) -> Result<Self> {
        let fix = provider.current_position().await?;
        log::info!("seeding viewport from location fix {}", fix);
        Ok(Self::new(fix, zoom, config))
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn tile_x(&self) -> i32 {
        self.tile_x
    }

    pub fn tile_y(&self) -> i32 {
        self.tile_y
    }

    pub fn offset_x(&self) -> f64 {
        self.offset_x
    }

    pub fn offset_y(&self) -> f64 {
        self.offset_y
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    /// Key of the tile the viewport is anchored on.
    pub fn center_key(&self) -> TileKey {
        TileKey::new(self.zoom, self.tile_x, self.tile_y)
    }

    /// Geographic position of the anchor tile.
    pub fn center(&self) -> LatLng {
        Projection::tile_to_lat_lng(self.tile_x, self.tile_y, self.zoom)
    }

    /// Total displacement in pixels at the current zoom, tile units included.
    pub fn displacement(&self) -> (f64, f64) {
        (
            f64::from(self.tile_x) * TILE_SIZE + self.offset_x,
            f64::from(self.tile_y) * TILE_SIZE + self.offset_y,
        )
    }

    /// Applies a screen-space drag delta.
    ///
    /// Content follows the finger, so the offsets move opposite to the delta.
    /// Non-finite deltas are ignored.
    pub fn apply_pan(&mut self, dx: f64, dy: f64) {
        if !dx.is_finite() || !dy.is_finite() {
            log::debug!("ignoring non-finite pan delta ({}, {})", dx, dy);
            return;
        }

        let gain = self.config.pan_gain;
        let smoothing = self.config.pan_smoothing;
        self.offset_x = lerp(self.offset_x, self.offset_x - dx * gain, smoothing);
        self.offset_y = lerp(self.offset_y, self.offset_y - dy * gain, smoothing);

        self.settle();
    }

    /// Moves whole tile units out of the offsets until both fit inside one tile.
    fn settle(&mut self) {
        let bulk_x = bulk_tiles(self.offset_x);
        let bulk_y = bulk_tiles(self.offset_y);
        if bulk_x != 0 || bulk_y != 0 {
            self.transfer(bulk_x, bulk_y);
        }

        loop {
            match Carry::detect(self.offset_x, self.offset_y) {
                Carry::None => break,
                Carry::Diagonal(sx, sy) => self.transfer(sx, sy),
                Carry::Horizontal(sx) => self.transfer(sx, 0),
                Carry::Vertical(sy) => self.transfer(0, sy),
            }
        }
    }

    fn transfer(&mut self, units_x: i32, units_y: i32) {
        shift_axis(&mut self.tile_x, &mut self.offset_x, units_x);
        shift_axis(&mut self.tile_y, &mut self.offset_y, units_y);
    }

    /// Applies a pinch scale factor observed at `now_ms`.
    ///
    /// Returns the accepted transition, or `None` when the event falls inside the
    /// debounce window, does not change the zoom, or is clamped away.
    pub fn apply_zoom(&mut self, scale_factor: f64, now_ms: i64) -> Option<ZoomChange> {
        if let Some(last) = self.last_zoom_ms {
            if now_ms.saturating_sub(last) < self.config.zoom_debounce_ms {
                log::debug!(
                    "zoom event at {}ms debounced ({}ms since last change)",
                    now_ms,
                    now_ms.saturating_sub(last)
                );
                return None;
            }
        }

        let target = if scale_factor > 1.0 {
            self.zoom.saturating_add(1)
        } else if scale_factor < 1.0 {
            self.zoom.saturating_sub(1)
        } else {
            return None;
        }
        .clamp(self.config.min_zoom, self.config.max_zoom);

        if target == self.zoom {
            return None;
        }

        let from = self.zoom;
        let (lat, lon) = Projection::to_geo(f64::from(self.tile_x), f64::from(self.tile_y), from);
        let (tile_x, tile_y) = Projection::to_tile(lat, lon, target);

        self.zoom = target;
        self.tile_x = tile_x;
        self.tile_y = tile_y;
        self.offset_x = 0.0;
        self.offset_y = 0.0;
        self.last_zoom_ms = Some(now_ms);

        log::info!("zoom {} -> {} at tile {}/{}", from, target, tile_x, tile_y);
        Some(ZoomChange { from, to: target })
    }
}

/// Moves `units` tiles from `offset` into `tile`. Once the tile coordinate
/// saturates, the remaining offset is folded into one tile instead.
fn shift_axis(tile: &mut i32, offset: &mut f64, units: i32) {
    let moved = tile.saturating_add(units);
    let applied = i64::from(moved) - i64::from(*tile);
    *tile = moved;
    *offset -= applied as f64 * TILE_SIZE;
    if applied != i64::from(units) {
        *offset %= TILE_SIZE;
    }
}

fn lerp(start: f64, end: f64, alpha: f64) -> f64 {
    start + alpha * (end - start)
}

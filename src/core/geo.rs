use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::constants::MAX_LATITUDE;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    /// Wraps longitude to [-180, 180) range
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
        if wrapped.is_finite() {
            wrapped
        } else {
            0.0
        }
    }

    /// Clamps latitude to the range Web-Mercator can represent
    pub fn clamp_lat(lat: f64) -> f64 {
        if lat.is_nan() {
            return 0.0;
        }
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Identity of one tile in the slippy-map pyramid.
///
/// Coordinates are signed so that keys just outside the grid (left of x = 0,
/// above y = 0) can be described and then rejected by [`TileKey::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub zoom: u8,
    pub x: i32,
    pub y: i32,
}

impl TileKey {
    pub fn new(zoom: u8, x: i32, y: i32) -> Self {
        Self { zoom, x, y }
    }

    /// Number of tiles along one axis at `zoom`.
    pub fn grid_size(zoom: u8) -> i64 {
        1_i64 << zoom.min(62)
    }

    /// True when the key addresses a tile inside `[0, 2^zoom)` on both axes.
    pub fn is_valid(&self) -> bool {
        let n = Self::grid_size(self.zoom);
        self.x >= 0 && self.y >= 0 && i64::from(self.x) < n && i64::from(self.y) < n
    }

    /// Chebyshev distance to `(x, y)` on the same grid.
    pub fn chebyshev_distance(&self, x: i32, y: i32) -> u32 {
        let dx = (i64::from(self.x) - i64::from(x)).unsigned_abs();
        let dy = (i64::from(self.y) - i64::from(y)).unsigned_abs();
        dx.max(dy).min(u64::from(u32::MAX)) as u32
    }

    /// Offsets the key by whole tiles at the same zoom.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.zoom,
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
        )
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

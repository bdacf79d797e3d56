//! Spherical Web-Mercator conversion between geographic and tile-grid coordinates.
//!
//! Every function here is pure and can be called from any thread.

use std::f64::consts::PI;

use crate::core::geo::LatLng;

/// Stateless namespace for the tile-grid projection.
pub struct Projection;

impl Projection {
    /// Unrounded tile-grid position of `(lat, lon)` at `zoom`.
    ///
    /// Latitude is clamped to the Mercator limit and longitude wrapped, so the
    /// result is always finite.
    pub fn to_tile_f64(lat: f64, lon: f64, zoom: u8) -> (f64, f64) {
        let n = 2_f64.powi(i32::from(zoom));
        let lat_rad = LatLng::clamp_lat(lat).to_radians();
        let lon = LatLng::wrap_lng(lon);

        let x = (lon + 180.0) / 360.0 * n;
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;
        (x, y)
    }

    /// Nearest tile-grid intersection to `(lat, lon)` at `zoom`.
    pub fn to_tile(lat: f64, lon: f64, zoom: u8) -> (i32, i32) {
        let (x, y) = Self::to_tile_f64(lat, lon, zoom);
        (saturate(x.round()), saturate(y.round()))
    }

    /// Inverse of [`Projection::to_tile_f64`]; returns `(lat, lon)` in degrees.
    pub fn to_geo(tile_x: f64, tile_y: f64, zoom: u8) -> (f64, f64) {
        let n = 2_f64.powi(i32::from(zoom));
        let lon = tile_x / n * 360.0 - 180.0;
        let lat = (PI - 2.0 * PI * tile_y / n).sinh().atan().to_degrees();
        (lat, lon)
    }

    /// Convenience wrapper returning a [`LatLng`].
    pub fn tile_to_lat_lng(tile_x: i32, tile_y: i32, zoom: u8) -> LatLng {
        let (lat, lng) = Self::to_geo(f64::from(tile_x), f64::from(tile_y), zoom);
        LatLng::new(lat, lng)
    }
}

fn saturate(v: f64) -> i32 {
    if v.is_nan() {
        0
    } else {
        v.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
    }
}

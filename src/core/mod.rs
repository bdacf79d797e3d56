//! Geographic primitives, projection and viewport state.

pub mod config;
pub mod constants;
pub mod geo;
pub mod projection;
pub mod viewport;

pub use config::EngineConfig;
pub use geo::{LatLng, TileKey};
pub use projection::Projection;
pub use viewport::{Viewport, ZoomChange};

//! # slipmap
//!
//! A slippy-map tile engine.
//!
//! The engine keeps a Web-Mercator viewport in sync with pan and pinch
//! gestures, fetches the raster tiles around it on a bounded worker pool,
//! caches them as backend textures with proximity eviction, and emits one
//! draw list per frame for a rendering backend to consume.
//!
//! Tile images, device location and drawing are supplied by the caller
//! through the [`TileSource`], [`LocationProvider`] and [`RenderBackend`]
//! traits.

pub mod core;
pub mod engine;
pub mod location;
pub mod prelude;
pub mod rendering;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::EngineConfig,
    geo::{LatLng, TileKey},
    projection::Projection,
    viewport::{Viewport, ZoomChange},
};

pub use crate::engine::{FrameStats, MapEngine, MapEngineBuilder};

pub use crate::location::{FixedLocation, LocationProvider, NoLocation, WithFallback};

pub use crate::rendering::{
    backend::{DrawCommand, DrawList, HeadlessBackend, RenderBackend, TextureHandle},
    composer::FrameComposer,
};

pub use crate::tiles::{
    cache::TileCache,
    scheduler::{FetchScheduler, RequestStatus},
    source::{FetchOutcome, TileSource},
};

#[cfg(feature = "http")]
pub use crate::tiles::source::HttpTileSource;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Texture upload failed: {0}")]
    Upload(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Error type alias for convenience
pub type Error = MapError;

//! Prelude module for common slipmap types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use slipmap::prelude::*;`

pub use crate::core::{
    config::{CacheConfig, EngineConfig, FetchConfig, GridConfig, HttpSourceConfig, ViewportConfig},
    constants::{MAX_ZOOM, MIN_ZOOM, TILE_SIZE},
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

pub use crate::{Error as MapError, Result};

pub use std::{sync::Arc, time::Duration};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

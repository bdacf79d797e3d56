//! The map engine: one explicit instance owning the viewport, the tile cache,
//! the fetch pool and the rendering backend.
//!
//! All methods run on the frame thread. Gesture input goes through
//! [`MapEngine::on_pan`] and [`MapEngine::on_zoom`]; [`MapEngine::frame`] is
//! called once per displayed frame.

use std::fmt;
use std::sync::Arc;

use crate::core::config::EngineConfig;
use crate::core::constants::DEFAULT_ZOOM;
use crate::core::geo::LatLng;
use crate::core::viewport::{Viewport, ZoomChange};
use crate::location::LocationProvider;
use crate::rendering::backend::RenderBackend;
use crate::rendering::composer::FrameComposer;
use crate::tiles::cache::TileCache;
use crate::tiles::scheduler::FetchScheduler;
use crate::tiles::source::TileSource;
use crate::{MapError, Result};

/// What happened during one call to [`MapEngine::frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    /// Tiles in the draw list
    pub drawn: usize,
    /// Fetched tiles uploaded this frame
    pub uploaded: usize,
    /// Keys newly queued for fetching
    pub requested: usize,
    /// Cache entries released after drawing
    pub evicted: usize,
    /// Keys queued or in flight at the end of the frame
    pub pending: usize,
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {}: drawn {}, uploaded {}, requested {}, evicted {}, pending {}",
            self.frame, self.drawn, self.uploaded, self.requested, self.evicted, self.pending
        )
    }
}

pub struct MapEngine<B: RenderBackend> {
    config: EngineConfig,
    viewport: Viewport,
    cache: TileCache,
    scheduler: FetchScheduler,
    composer: FrameComposer,
    backend: B,
}

impl<B: RenderBackend> MapEngine<B> {
    /// Applies a pan gesture delta in screen pixels.
    pub fn on_pan(&mut self, dx: f64, dy: f64) {
        self.viewport.apply_pan(dx, dy);
    }

    /// Applies a pinch scale factor. Returns the accepted zoom change, if any.
    pub fn on_zoom(&mut self, scale_factor: f64, timestamp_ms: i64) -> Option<ZoomChange> {
        let change = self.viewport.apply_zoom(scale_factor, timestamp_ms)?;
        self.scheduler.invalidate_zoom(change.to);
        Some(change)
    }

    /// Runs one frame: apply finished fetches, draw, then evict.
    pub fn frame(&mut self) -> FrameStats {
        let frame = self.cache.begin_frame();
        let uploaded = self.apply_completions();

        let composition = self
            .composer
            .compose(&self.viewport, &mut self.cache, &mut self.scheduler);
        self.backend.draw(&composition.draw_list);

        // Textures are released only after the draw calls for this frame.
        let center = self.viewport.center_key();
        let keep_radius = self.config.grid.keep_radius();
        let evicted = self.cache.evict(center, keep_radius);
        for entry in &evicted {
            self.backend.release_texture(entry.texture);
        }
        self.scheduler
            .cancel_far(center, keep_radius.saturating_add(self.config.cache.eviction_margin));

        let stats = FrameStats {
            frame,
            drawn: composition.draw_list.len(),
            uploaded,
            requested: composition.requested.len(),
            evicted: evicted.len(),
            pending: self.scheduler.pending_len(),
        };
        log::trace!("{}", stats);
        stats
    }

    fn apply_completions(&mut self) -> usize {
        let mut uploaded = 0;
        for tile in self.scheduler.drain() {
            match self.backend.upload_texture(&tile.bytes) {
                Ok(texture) => {
                    if let Some(replaced) = self.cache.insert(tile.key, texture) {
                        self.backend.release_texture(replaced);
                    }
                    uploaded += 1;
                }
                Err(e) => {
                    log::warn!("texture upload failed for tile {}: {}", tile.key, e);
                    self.scheduler.mark_missing(tile.key);
                }
            }
        }
        uploaded
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Geographic position of the viewport tile.
    pub fn center(&self) -> LatLng {
        self.viewport.center()
    }

    pub fn zoom(&self) -> u8 {
        self.viewport.zoom()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &FetchScheduler {
        &self.scheduler
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Stops the fetch pool, releases every cached texture and hands the
    /// backend back.
    pub fn shutdown(mut self) -> B {
        self.scheduler.shutdown();
        for entry in self.cache.evict_all() {
            self.backend.release_texture(entry.texture);
        }
        log::info!("map engine stopped");
        self.backend
    }
}

/// Wires an engine from its collaborators.
pub struct MapEngineBuilder {
    config: EngineConfig,
    zoom: u8,
    tile_source: Option<Arc<dyn TileSource>>,
}

impl MapEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            zoom: DEFAULT_ZOOM,
            tile_source: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Initial zoom level, clamped to the configured range.
    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_tile_source(mut self, source: Arc<dyn TileSource>) -> Self {
        self.tile_source = Some(source);
        self
    }

    /// Builds an engine centred on a known position.
    pub fn build_at<B: RenderBackend>(self, center: LatLng, backend: B) -> Result<MapEngine<B>> {
        self.config.validate()?;
        let viewport = Viewport::new(center, self.zoom, self.config.viewport.clone());
        self.assemble(viewport, backend)
    }

    /// Builds an engine centred on the provider's one-shot location fix.
    ///
    /// Fails with [`MapError::LocationUnavailable`] when there is no fix; the
    /// caller decides on a fallback position.
    pub async fn build_from_location<B: RenderBackend>(
        self,
        provider: &dyn LocationProvider,
        backend: B,
    ) -> Result<MapEngine<B>> {
        self.config.validate()?;
        let viewport = Viewport::from_location(provider, self.zoom, self.config.viewport.clone()).await?;
        self.assemble(viewport, backend)
    }

    /// Expects a validated config.
    fn assemble<B: RenderBackend>(self, viewport: Viewport, backend: B) -> Result<MapEngine<B>> {
        let source = self
            .tile_source
            .ok_or_else(|| MapError::InvalidConfig("no tile source specified".to_string()))?;

        let scheduler = FetchScheduler::new(source, self.config.fetch.clone(), viewport.zoom())?;
        log::info!(
            "map engine at {} (tile {}), {} visible tiles",
            viewport.center(),
            viewport.center_key(),
            self.config.grid.tile_count()
        );

        Ok(MapEngine {
            cache: TileCache::new(&self.config.cache),
            composer: FrameComposer::new(self.config.grid.clone()),
            scheduler,
            viewport,
            config: self.config,
            backend,
        })
    }
}

impl Default for MapEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

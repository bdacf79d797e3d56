//! Boundary to the graphics backend.
//!
//! The engine never touches GPU state itself: it hands raw tile bytes to
//! [`RenderBackend::upload_texture`], keeps the returned opaque handle in the
//! tile cache, and passes a [`DrawList`] to [`RenderBackend::draw`] once per
//! frame. All calls happen on the frame thread.

use crate::core::geo::TileKey;
use crate::prelude::HashMap;
use crate::{MapError, Result};

/// Opaque backend texture id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// One tile placement in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub key: TileKey,
    pub texture: TextureHandle,
    pub screen_x: f64,
    pub screen_y: f64,
    pub size: f64,
}

/// Ordered tile placements for one frame.
///
/// Tiles that are not ready yet are simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    pub frame: u64,
    pub commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new(frame: u64) -> Self {
        Self {
            frame,
            commands: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.commands.iter().any(|c| c.key == *key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands.iter()
    }
}

pub trait RenderBackend {
    /// Turns raw image bytes into a texture. Called once per fetched tile.
    fn upload_texture(&mut self, bytes: &[u8]) -> Result<TextureHandle>;

    /// Frees a texture. Never called while a draw list referencing it is in use.
    fn release_texture(&mut self, handle: TextureHandle);

    /// Issues the draw calls for one frame.
    fn draw(&mut self, list: &DrawList);
}

/// Backend that keeps textures in memory and records what it was asked to draw.
///
/// Used by the demo binary and in tests.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
    textures: HashMap<TextureHandle, usize>,
    uploads: usize,
    releases: usize,
    last_frame: Option<DrawList>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Textures currently alive.
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn uploads(&self) -> usize {
        self.uploads
    }

    pub fn releases(&self) -> usize {
        self.releases
    }

    pub fn is_live(&self, handle: TextureHandle) -> bool {
        self.textures.contains_key(&handle)
    }

    pub fn last_frame(&self) -> Option<&DrawList> {
        self.last_frame.as_ref()
    }
}

impl RenderBackend for HeadlessBackend {
    fn upload_texture(&mut self, bytes: &[u8]) -> Result<TextureHandle> {
        if bytes.is_empty() {
            return Err(MapError::Upload("empty image payload".to_string()));
        }
        self.next_id += 1;
        let handle = TextureHandle(self.next_id);
        self.textures.insert(handle, bytes.len());
        self.uploads += 1;
        Ok(handle)
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        if self.textures.remove(&handle).is_some() {
            self.releases += 1;
        } else {
            log::warn!("release of unknown texture {:?}", handle);
        }
    }

    fn draw(&mut self, list: &DrawList) {
        for command in list.iter() {
            if !self.textures.contains_key(&command.texture) {
                log::error!("draw of released texture {:?} for tile {}", command.texture, command.key);
            }
        }
        self.last_frame = Some(list.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_texture_lifecycle() {
        let mut backend = HeadlessBackend::new();
        let a = backend.upload_texture(&[1, 2, 3]).unwrap();
        let b = backend.upload_texture(&[4]).unwrap();
        assert_ne!(a, b);
        assert_eq!(backend.live_textures(), 2);

        backend.release_texture(a);
        assert!(!backend.is_live(a));
        assert!(backend.is_live(b));
        assert_eq!(backend.releases(), 1);

        backend.release_texture(a);
        assert_eq!(backend.releases(), 1);
    }

    #[test]
    fn test_empty_upload_fails() {
        let mut backend = HeadlessBackend::new();
        assert!(matches!(backend.upload_texture(&[]), Err(MapError::Upload(_))));
        assert_eq!(backend.uploads(), 0);
    }

    #[test]
    fn test_draw_records_frame() {
        let mut backend = HeadlessBackend::new();
        let texture = backend.upload_texture(&[9]).unwrap();
        let mut list = DrawList::new(4);
        list.commands.push(DrawCommand {
            key: TileKey::new(3, 1, 1),
            texture,
            screen_x: 0.0,
            screen_y: 0.0,
            size: 256.0,
        });
        backend.draw(&list);
        assert_eq!(backend.last_frame(), Some(&list));
        assert!(list.contains(&TileKey::new(3, 1, 1)));
    }
}

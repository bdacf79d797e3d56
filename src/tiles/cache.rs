use lru::LruCache;

use crate::core::config::CacheConfig;
use crate::core::geo::TileKey;
use crate::rendering::backend::TextureHandle;

/// A resident tile texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: TileKey,
    pub texture: TextureHandle,
    pub last_touched_frame: u64,
}

/// Frame-thread-owned map from tile key to uploaded texture.
///
/// Entries only leave the cache through [`TileCache::evict`] (or
/// [`TileCache::evict_all`] at teardown), which hands them back to the caller
/// so the textures can be released after the frame's draw calls.
#[derive(Debug)]
pub struct TileCache {
    entries: LruCache<TileKey, CacheEntry>,
    frame: u64,
    capacity: usize,
    margin: u32,
}

impl TileCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: LruCache::unbounded(),
            frame: 0,
            capacity: config.capacity.max(1),
            margin: config.eviction_margin,
        }
    }

    /// Advances the frame counter used for `last_touched_frame`.
    pub fn begin_frame(&mut self) -> u64 {
        self.frame += 1;
        self.frame
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Looks up a ready tile and marks it as used this frame. Never fetches.
    pub fn get(&mut self, key: &TileKey) -> Option<TextureHandle> {
        let frame = self.frame;
        self.entries.get_mut(key).map(|entry| {
            entry.last_touched_frame = frame;
            entry.texture
        })
    }

    /// Looks up an entry without touching it.
    pub fn peek(&self, key: &TileKey) -> Option<&CacheEntry> {
        self.entries.peek(key)
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.entries.contains(key)
    }

    /// Inserts or replaces a tile. Returns the replaced texture, which the
    /// caller now owns and must release.
    pub fn insert(&mut self, key: TileKey, texture: TextureHandle) -> Option<TextureHandle> {
        let entry = CacheEntry {
            key,
            texture,
            last_touched_frame: self.frame,
        };
        self.entries
            .put(key, entry)
            .map(|old| old.texture)
            .filter(|old| *old != texture)
    }

    /// Removes every entry farther than `keep_radius + margin` (Chebyshev) from
    /// `center`, then trims the least recently touched entries down to capacity.
    ///
    /// Entries at a zoom other than `center.zoom` are always removed. Entries
    /// touched during the current frame are never removed by the capacity pass.
    pub fn evict(&mut self, center: TileKey, keep_radius: u32) -> Vec<CacheEntry> {
        let limit = keep_radius.saturating_add(self.margin);
        let far: Vec<TileKey> = self
            .entries
            .iter()
            .filter(|(key, _)| {
                key.zoom != center.zoom || key.chebyshev_distance(center.x, center.y) > limit
            })
            .map(|(key, _)| *key)
            .collect();

        let mut evicted = Vec::with_capacity(far.len());
        for key in far {
            if let Some(entry) = self.entries.pop(&key) {
                evicted.push(entry);
            }
        }

        while self.entries.len() > self.capacity {
            let stale = matches!(
                self.entries.peek_lru(),
                Some((_, entry)) if entry.last_touched_frame < self.frame
            );
            if !stale {
                break;
            }
            if let Some((_, entry)) = self.entries.pop_lru() {
                evicted.push(entry);
            }
        }

        if !evicted.is_empty() {
            log::debug!(
                "evicted {} tiles around {} (radius {}), {} resident",
                evicted.len(),
                center,
                limit,
                self.entries.len()
            );
        }
        evicted
    }

    /// Empties the cache, returning every entry for release.
    pub fn evict_all(&mut self) -> Vec<CacheEntry> {
        let mut evicted = Vec::with_capacity(self.entries.len());
        while let Some((_, entry)) = self.entries.pop_lru() {
            evicted.push(entry);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn keys(&self) -> impl Iterator<Item = &TileKey> {
        self.entries.iter().map(|(key, _)| key)
    }
}

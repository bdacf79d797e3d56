use crate::core::config::GridConfig;
use crate::core::constants::TILE_SIZE;
use crate::core::geo::TileKey;
use crate::core::viewport::Viewport;
use crate::rendering::backend::{DrawCommand, DrawList};
use crate::tiles::cache::TileCache;
use crate::tiles::scheduler::{FetchScheduler, RequestStatus};

/// A grid cell relative to the viewport tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub dx: i32,
    pub dy: i32,
    pub key: TileKey,
}

/// Output of one composition pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    pub draw_list: DrawList,
    /// Keys newly handed to the scheduler, nearest first
    pub requested: Vec<TileKey>,
}

/// Turns viewport state into a draw list and fetch requests.
///
/// Does no I/O and never blocks: cached tiles become draw commands, the rest
/// are requested from the scheduler and drawn on a later frame.
#[derive(Debug, Clone)]
pub struct FrameComposer {
    grid: GridConfig,
}

impl FrameComposer {
    pub fn new(grid: GridConfig) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &GridConfig {
        &self.grid
    }

    /// Every cell of the visible grid in row-major order (top row first).
    pub fn visible_cells(&self, viewport: &Viewport) -> Vec<GridCell> {
        let tx = self.grid.tiles_x as i32;
        let ty = self.grid.tiles_y as i32;
        let center = viewport.center_key();

        let mut cells = Vec::with_capacity(self.grid.tile_count());
        for dy in -ty..=ty {
            for dx in -tx..=tx {
                cells.push(GridCell {
                    dx,
                    dy,
                    key: center.offset(dx, dy),
                });
            }
        }
        cells
    }

    /// Builds the draw list for `viewport` and requests the tiles it lacks.
    pub fn compose(
        &self,
        viewport: &Viewport,
        cache: &mut TileCache,
        scheduler: &mut FetchScheduler,
    ) -> Composition {
        let mut draw_list = DrawList::new(cache.frame());
        let mut wanted = Vec::new();

        for cell in self.visible_cells(viewport) {
            match cache.get(&cell.key) {
                Some(texture) => draw_list.commands.push(DrawCommand {
                    key: cell.key,
                    texture,
                    screen_x: f64::from(cell.dx) * TILE_SIZE - viewport.offset_x(),
                    screen_y: -f64::from(cell.dy) * TILE_SIZE + viewport.offset_y(),
                    size: TILE_SIZE,
                }),
                None => wanted.push(cell),
            }
        }

        wanted.sort_by_key(|cell| cell.dx.unsigned_abs().max(cell.dy.unsigned_abs()));

        let mut requested = Vec::new();
        for cell in wanted {
            if scheduler.request(cell.key, cache) == RequestStatus::Queued {
                requested.push(cell.key);
            }
        }

        Composition {
            draw_list,
            requested,
        }
    }
}

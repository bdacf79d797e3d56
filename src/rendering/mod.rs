pub mod backend;
pub mod composer;

// Re-export main types
pub use backend::{DrawCommand, DrawList, HeadlessBackend, RenderBackend, TextureHandle};
pub use composer::{Composition, FrameComposer, GridCell};

//! GPU abstraction consumed by the [`Painter`](crate::painter::Painter).
//!
//! A backend owns textures and the current render target and executes
//! fully prepared draw calls. Everything stateful about *what* to draw
//! (matrices, clip stack, batching) lives in the painter.

use thiserror::Error;

use crate::display::BlendMode;
use crate::geom::Rect;
use crate::pixmap::Pixmap;
use crate::quad::{BatchId, Smoothing};
use crate::texture::{TextureDescriptor, TextureId};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("No render context available")]
    MissingContext,
    #[error("Unknown texture: {0}")]
    UnknownTexture(TextureId),
    #[error("Invalid texture size {width}×{height}")]
    TextureSize { width: u32, height: u32 },
    #[error("Pixmap is {got:?} but texture {texture} expects {expected:?}")]
    PixmapSize {
        texture: TextureId,
        expected: (u32, u32),
        got: (u32, u32),
    },
    #[error("Pop on empty {0} stack")]
    StackUnderflow(&'static str),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Content regeneration failed: {0}")]
    Content(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Capabilities a backend reports once per context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendCaps {
    /// Whether textures may have non-power-of-two dimensions.
    pub non_power_of_two: bool,
    /// Largest texture edge in device pixels.
    pub max_texture_size: u32,
}

impl Default for BackendCaps {
    fn default() -> Self {
        Self {
            non_power_of_two: true,
            max_texture_size: 8192,
        }
    }
}

/// A quad transformed into render-target space: a parallelogram spanned by
/// `axis_x` and `axis_y` from `origin`, with premultiplied color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreparedQuad {
    pub origin: [f32; 2],
    pub axis_x: [f32; 2],
    pub axis_y: [f32; 2],
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
    pub color: [f32; 4],
}

/// One draw call, ready for submission.
#[derive(Clone, Debug)]
pub struct DrawCall<'a> {
    pub quads: &'a [PreparedQuad],
    pub texture: Option<TextureId>,
    pub blend_mode: BlendMode,
    pub smoothing: Smoothing,
    /// Size of the projection in points; maps `(0,0)..size` onto the target.
    pub projection: [f32; 2],
    /// Scissor rectangle in projection space.
    pub clip: Option<Rect>,
    /// Set for non-batchable batches whose buffer may be cached.
    pub cache_key: Option<BatchId>,
}

pub trait RenderBackend {
    /// A context exists (it may still be lost).
    fn is_available(&self) -> bool;

    /// The context exists and has not been lost.
    fn is_context_valid(&self) -> bool {
        self.is_available()
    }

    fn capabilities(&self) -> BackendCaps;

    /// Device pixels per point.
    fn content_scale_factor(&self) -> f32;

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureId, RenderError>;

    /// Replace the texture's contents. Sizes must match exactly.
    fn upload_pixels(&mut self, texture: TextureId, pixels: &Pixmap) -> Result<(), RenderError>;

    fn dispose_texture(&mut self, texture: TextureId);

    /// `None` unbinds back to the default target.
    fn set_render_target(&mut self, target: Option<TextureId>, anti_alias: u32) -> Result<(), RenderError>;

    /// Clear the current render target.
    fn clear(&mut self, rgb: u32, alpha: f32) -> Result<(), RenderError>;

    fn draw_quads(&mut self, call: &DrawCall<'_>) -> Result<(), RenderError>;

    /// Drop buffers cached under `key`.
    fn release_buffers(&mut self, key: BatchId);

    /// Copy a texture (the default target for `None`) back to the CPU.
    fn read_pixels(&self, texture: Option<TextureId>) -> Result<Pixmap, RenderError>;
}

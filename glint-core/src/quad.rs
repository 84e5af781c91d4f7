//! Quads and quad batches.
//!
//! A [`QuadBatch`] is a mergeable set of colored, optionally textured
//! rectangles that the painter submits as one draw call. Batches own no
//! textures; a non-batchable batch may own a cached GPU buffer in the
//! backend, keyed by its [`BatchId`] and released by [`QuadBatch::dispose`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::RenderError;
use crate::color;
use crate::display::BlendMode;
use crate::geom::Rect;
use crate::painter::Painter;
use crate::texture::Texture;

/// Texture filtering used when sampling a quad's texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Smoothing {
    None,
    #[default]
    Bilinear,
}

/// Identity of a quad batch's backend buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

/// An axis-aligned rectangle in batch-local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quad {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// `[u_min, v_min, u_max, v_max]` in normalized texture space.
    pub uv: [f32; 4],
    /// Straight RGBA color, each channel in [0.0, 1.0].
    pub color: [f32; 4],
}

impl Quad {
    /// Untextured solid quad.
    pub fn solid(x: f32, y: f32, width: f32, height: f32, rgb: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            uv: [0.0, 0.0, 1.0, 1.0],
            color: color::to_rgba(rgb, 1.0),
        }
    }

    pub fn with_uv(mut self, uv: [f32; 4]) -> Self {
        self.uv = uv;
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.color[3] = alpha;
        self
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Clone, Debug)]
pub struct QuadBatch {
    id: BatchId,
    quads: Vec<Quad>,
    texture: Option<Texture>,
    pub smoothing: Smoothing,
    pub blend_mode: BlendMode,
    /// Batchable quads merge into the painter's pending batch; others are
    /// drawn on their own through a cached GPU buffer.
    pub batchable: bool,
}

impl Default for QuadBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadBatch {
    pub fn new() -> Self {
        Self {
            id: BatchId::new(),
            quads: Vec::new(),
            texture: None,
            smoothing: Smoothing::default(),
            blend_mode: BlendMode::Auto,
            batchable: true,
        }
    }

    pub fn with_texture(texture: Texture) -> Self {
        Self { texture: Some(texture), ..Self::new() }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref()
    }

    /// Quads already added refer to the old texture's UV space; callers
    /// switching textures normally `reset` first.
    pub fn set_texture(&mut self, texture: Option<Texture>) {
        self.texture = texture;
    }

    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    pub fn num_quads(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    pub fn add_quad(&mut self, quad: Quad) {
        self.quads.push(quad);
    }

    /// Remove all quads but keep the texture, settings and buffer identity.
    pub fn reset(&mut self) {
        self.quads.clear();
    }

    /// Union of all quad rectangles in batch-local space.
    pub fn bounds(&self) -> Rect {
        self.quads
            .iter()
            .fold(Rect::default(), |acc, q| acc.union(&q.bounds()))
    }

    /// True if both batches could be submitted in one draw call.
    pub fn is_state_compatible(&self, other: &QuadBatch) -> bool {
        self.texture.as_ref().map(|t| t.id) == other.texture.as_ref().map(|t| t.id)
            && self.smoothing == other.smoothing
            && self.blend_mode == other.blend_mode
    }

    pub fn render(&self, painter: &mut Painter, parent_alpha: f32) -> Result<(), RenderError> {
        if self.quads.is_empty() {
            return Ok(());
        }
        let previous = painter.blend_mode();
        painter.set_blend_mode(self.blend_mode);
        let texture = self.texture.as_ref().map(|t| t.id);
        let result = if self.batchable {
            painter.batch_quads(&self.quads, texture, self.smoothing, parent_alpha)
        } else {
            painter.draw_quads_direct(self.id, &self.quads, texture, self.smoothing, parent_alpha)
        };
        painter.restore_blend_mode(previous);
        result
    }

    /// Release backend buffers cached for this batch.
    pub fn dispose(&mut self, painter: &mut Painter) {
        self.quads.clear();
        painter.release_quad_batch(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{TextureDescriptor, TextureId};

    #[test]
    fn test_bounds_is_union() {
        let mut batch = QuadBatch::new();
        assert!(batch.bounds().is_empty());
        batch.add_quad(Quad::solid(2.0, 3.0, 10.0, 5.0, 0));
        batch.add_quad(Quad::solid(-1.0, 4.0, 2.0, 10.0, 0));
        assert_eq!(batch.bounds(), Rect::new(-1.0, 3.0, 13.0, 11.0));
    }

    #[test]
    fn test_reset_keeps_identity() {
        let mut batch = QuadBatch::new();
        let id = batch.id();
        batch.add_quad(Quad::solid(0.0, 0.0, 1.0, 1.0, 0));
        batch.reset();
        assert!(batch.is_empty());
        assert_eq!(batch.id(), id);
    }

    #[test]
    fn test_state_compatibility() {
        let tex = Texture::from_descriptor(TextureId::new(), &TextureDescriptor::new(8.0, 8.0, 1.0));
        let a = QuadBatch::with_texture(tex.clone());
        let b = QuadBatch::with_texture(tex);
        let c = QuadBatch::new();
        assert!(a.is_state_compatible(&b));
        assert!(!a.is_state_compatible(&c));
        let mut d = b.clone();
        d.blend_mode = BlendMode::Add;
        assert!(!a.is_state_compatible(&d));
    }
}

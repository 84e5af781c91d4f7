//! A display object showing one texture.

use crate::backend::RenderError;
use crate::color;
use crate::display::{BlendMode, DisplayObject, Transform2D};
use crate::geom::{Matrix, Rect};
use crate::painter::Painter;
use crate::quad::{Quad, Smoothing};
use crate::texture::Texture;

/// Textured quad sized to its texture in points.
///
/// The image holds a texture *handle*; it never disposes the texture.
#[derive(Clone, Debug)]
pub struct Image {
    texture: Texture,
    width: f32,
    height: f32,
    pub color: u32,
    pub smoothing: Smoothing,
    pub transform: Transform2D,
    pub alpha: f32,
    pub blend_mode: BlendMode,
    pub visible: bool,
}

impl Image {
    pub fn new(texture: Texture) -> Self {
        Self {
            width: texture.width,
            height: texture.height,
            texture,
            color: color::WHITE,
            smoothing: Smoothing::default(),
            transform: Transform2D::default(),
            alpha: 1.0,
            blend_mode: BlendMode::Auto,
            visible: true,
        }
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    /// Show a different texture and adopt its size.
    pub fn set_texture(&mut self, texture: Texture) {
        self.texture = texture;
        self.readjust_size();
    }

    pub fn readjust_size(&mut self) {
        self.width = self.texture.width;
        self.height = self.texture.height;
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Bounds in the space described by `target`, which maps local
    /// coordinates into it.
    pub fn bounds(&self, target: &Matrix) -> Rect {
        target.transform_rect_bounds(&Rect::new(0.0, 0.0, self.width, self.height))
    }

    fn quad(&self) -> Quad {
        Quad {
            x: 0.0,
            y: 0.0,
            width: self.width,
            height: self.height,
            uv: [0.0, 0.0, 1.0, 1.0],
            color: color::to_rgba(self.color, 1.0),
        }
    }
}

impl DisplayObject for Image {
    fn transform(&self) -> Transform2D {
        self.transform
    }

    fn alpha(&self) -> f32 {
        self.alpha
    }

    fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    fn visible(&self) -> bool {
        self.visible
    }

    fn render(&mut self, painter: &mut Painter, parent_alpha: f32) -> Result<(), RenderError> {
        if !self.visible || self.alpha <= 0.0 {
            return Ok(());
        }
        let previous = painter.blend_mode();
        painter.set_blend_mode(self.blend_mode);
        let result = painter.batch_quads(
            &[self.quad()],
            Some(self.texture.id),
            self.smoothing,
            parent_alpha * self.alpha,
        );
        painter.restore_blend_mode(previous);
        result
    }
}

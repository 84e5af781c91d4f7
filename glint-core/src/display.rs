//! The display-object contract consumed by the painter and render textures.

use serde::{Deserialize, Serialize};

use crate::backend::RenderError;
use crate::geom::Matrix;
use crate::painter::Painter;

/// How a display object's pixels combine with the render target.
///
/// `Auto` inherits whatever mode the painter currently uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Auto,
    None,
    Normal,
    Add,
    Multiply,
    Screen,
    Erase,
}

/// Position, pivot, scale and rotation of a display object in its parent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform2D {
    pub x: f32,
    pub y: f32,
    pub pivot_x: f32,
    pub pivot_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Rotation in radians.
    pub rotation: f32,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            pivot_x: 0.0,
            pivot_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
        }
    }
}

impl Transform2D {
    pub fn at(x: f32, y: f32) -> Self {
        Self { x, y, ..Default::default() }
    }

    /// Local → parent matrix: pivot, then scale, rotate, translate.
    pub fn to_matrix(&self) -> Matrix {
        let mut m = Matrix::IDENTITY;
        if self.pivot_x != 0.0 || self.pivot_y != 0.0 {
            m = m.translate(-self.pivot_x, -self.pivot_y);
        }
        if self.scale_x != 1.0 || self.scale_y != 1.0 {
            m = m.scale(self.scale_x, self.scale_y);
        }
        if self.rotation != 0.0 {
            m = m.rotate(self.rotation);
        }
        m.translate(self.x, self.y)
    }
}

/// Anything that can be drawn through a [`Painter`].
///
/// When `render` is called the painter's model-view matrix already contains
/// this object's own transformation; implementations draw in local space.
pub trait DisplayObject {
    fn transform(&self) -> Transform2D;

    fn transformation_matrix(&self) -> Matrix {
        self.transform().to_matrix()
    }

    fn alpha(&self) -> f32 {
        1.0
    }

    fn blend_mode(&self) -> BlendMode {
        BlendMode::Auto
    }

    fn visible(&self) -> bool {
        true
    }

    fn render(&mut self, painter: &mut Painter, parent_alpha: f32) -> Result<(), RenderError>;
}

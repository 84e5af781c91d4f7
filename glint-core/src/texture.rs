//! Texture handles.
//!
//! A [`Texture`] is a cheap, cloneable handle describing a GPU-side image
//! owned by a [`RenderBackend`](crate::backend::RenderBackend). Cloning the
//! handle does not duplicate pixels; whoever created the texture disposes it
//! through the painter exactly once. Swapping two handles swaps *roles*
//! only, which is what the render-texture double buffer relies on.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a backend texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(Uuid);

impl TextureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TextureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tex-{}", &self.0.simple().to_string()[..8])
    }
}

/// Pixel layout of a texture on the GPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureFormat {
    #[default]
    Rgba8,
    Bgra8,
}

/// Parameters for [`Painter::create_texture`](crate::painter::Painter::create_texture).
#[derive(Clone, Debug, PartialEq)]
pub struct TextureDescriptor {
    /// Width in points.
    pub width: f32,
    /// Height in points.
    pub height: f32,
    /// Device pixels per point.
    pub scale: f32,
    pub premultiplied_alpha: bool,
    pub format: TextureFormat,
    pub repeat: bool,
    /// Set when the texture will be bound as a render target.
    pub render_target: bool,
    pub label: Option<String>,
}

impl TextureDescriptor {
    pub fn new(width: f32, height: f32, scale: f32) -> Self {
        Self {
            width,
            height,
            scale,
            premultiplied_alpha: true,
            format: TextureFormat::default(),
            repeat: false,
            render_target: false,
            label: None,
        }
    }

    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn as_render_target(mut self) -> Self {
        self.render_target = true;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Size in device pixels, rounded up.
    pub fn native_size(&self) -> (u32, u32) {
        native_extent(self.width, self.height, self.scale)
    }
}

/// Handle to a backend texture plus the metadata needed to draw it.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub id: TextureId,
    pub width: f32,
    pub height: f32,
    pub scale: f32,
    pub premultiplied_alpha: bool,
    pub format: TextureFormat,
    pub repeat: bool,
}

impl Texture {
    pub fn from_descriptor(id: TextureId, desc: &TextureDescriptor) -> Self {
        Self {
            id,
            width: desc.width,
            height: desc.height,
            scale: desc.scale,
            premultiplied_alpha: desc.premultiplied_alpha,
            format: desc.format,
            repeat: desc.repeat,
        }
    }

    pub fn native_width(&self) -> u32 {
        native_extent(self.width, self.height, self.scale).0
    }

    pub fn native_height(&self) -> u32 {
        native_extent(self.width, self.height, self.scale).1
    }
}

fn native_extent(width: f32, height: f32, scale: f32) -> (u32, u32) {
    (device_pixels(width * scale), device_pixels(height * scale))
}

/// Round up, but absorb float noise from a pixels → points → pixels trip.
fn device_pixels(value: f32) -> u32 {
    let nearest = value.round();
    let px = if (value - nearest).abs() < 1e-3 { nearest } else { value.ceil() };
    (px as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_size_rounds_up() {
        let desc = TextureDescriptor::new(10.5, 3.0, 2.0);
        assert_eq!(desc.native_size(), (21, 6));
        let desc = TextureDescriptor::new(10.2, 0.0, 1.0);
        assert_eq!(desc.native_size(), (11, 1));
        let desc = TextureDescriptor::new(101.0 / 3.0, 7.0 / 3.0, 3.0);
        assert_eq!(desc.native_size(), (101, 7));
    }

    #[test]
    fn test_handle_clone_shares_id() {
        let desc = TextureDescriptor::new(4.0, 4.0, 1.0);
        let tex = Texture::from_descriptor(TextureId::new(), &desc);
        let copy = tex.clone();
        assert_eq!(tex.id, copy.id);
        assert_eq!(copy.native_width(), 4);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(TextureId::new(), TextureId::new());
    }
}

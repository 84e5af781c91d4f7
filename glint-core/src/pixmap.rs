//! CPU-side RGBA8 pixel buffer with premultiplied alpha.
//!
//! Text rasterizers draw into a [`Pixmap`] which is then uploaded into a
//! texture; the software backend also keeps one pixmap per texture.

use crate::color;

#[derive(Clone, Debug, PartialEq)]
pub struct Pixmap {
    width: u32,
    height: u32,
    /// RGBA pixel data (`width * height * 4` bytes), premultiplied.
    data: Vec<u8>,
}

impl Pixmap {
    /// Fully transparent pixmap.
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize) * 4;
        Self { width, height, data: vec![0u8; len] }
    }

    /// Wrap existing RGBA bytes. Returns `None` on a size mismatch.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        Some(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(((y as u32 * self.width + x as u32) * 4) as usize)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        self.index(x, y).map(|i| {
            [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
        })
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, rgba: [u8; 4]) {
        if let Some(i) = self.index(x, y) {
            self.data[i..i + 4].copy_from_slice(&rgba);
        }
    }

    /// Fill every pixel with a straight color and alpha.
    pub fn fill(&mut self, rgb: u32, alpha: f32) {
        let px = premultiplied_bytes(rgb, alpha);
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    /// Source-over blend of a premultiplied pixel.
    pub fn blend_pixel(&mut self, x: i32, y: i32, src: [u8; 4]) {
        let Some(i) = self.index(x, y) else { return };
        let inv = 255 - src[3] as u32;
        for c in 0..4 {
            let dst = self.data[i + c] as u32;
            self.data[i + c] = (src[c] as u32 + (dst * inv + 127) / 255).min(255) as u8;
        }
    }

    /// Blend `rgb` at the given coverage (0–255).
    pub fn blend_coverage(&mut self, x: i32, y: i32, rgb: u32, coverage: u8) {
        if coverage == 0 {
            return;
        }
        self.blend_pixel(x, y, premultiplied_bytes(rgb, coverage as f32 / 255.0));
    }

    /// Blit a glyph bitmap at `(dst_x, dst_y)`.
    ///
    /// Handles both alpha-only masks (1 byte/pixel, tinted with `rgb`) and
    /// straight RGBA images (4 bytes/pixel, e.g. color emoji).
    pub fn blit_bitmap(&mut self, dst_x: i32, dst_y: i32, width: u32, height: u32, bitmap: &[u8], rgb: u32) {
        let expected_rgba = (width * height * 4) as usize;
        let expected_alpha = (width * height) as usize;

        let is_rgba = bitmap.len() >= expected_rgba;
        let is_alpha = bitmap.len() >= expected_alpha && !is_rgba;

        for row in 0..height {
            for col in 0..width {
                let x = dst_x + col as i32;
                let y = dst_y + row as i32;
                if is_rgba {
                    let s = ((row * width + col) * 4) as usize;
                    let a = bitmap[s + 3] as u32;
                    let src = [
                        (bitmap[s] as u32 * a / 255) as u8,
                        (bitmap[s + 1] as u32 * a / 255) as u8,
                        (bitmap[s + 2] as u32 * a / 255) as u8,
                        a as u8,
                    ];
                    self.blend_pixel(x, y, src);
                } else if is_alpha {
                    let s = (row * width + col) as usize;
                    self.blend_coverage(x, y, rgb, bitmap[s]);
                }
            }
        }
    }

    /// Solid rectangle, clipped to the pixmap.
    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, rgb: u32, alpha: f32) {
        let px = premultiplied_bytes(rgb, alpha);
        for row in 0..height as i32 {
            for col in 0..width as i32 {
                self.blend_pixel(x + col, y + row, px);
            }
        }
    }

    /// Number of pixels with non-zero alpha.
    pub fn covered_pixels(&self) -> usize {
        self.data.chunks_exact(4).filter(|p| p[3] > 0).count()
    }
}

/// Premultiplied RGBA bytes for a straight color.
pub fn premultiplied_bytes(rgb: u32, alpha: f32) -> [u8; 4] {
    let a = alpha.clamp(0.0, 1.0);
    let [r, g, b, a] = color::premultiply(color::to_rgba(rgb, a));
    [
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
        (a * 255.0).round() as u8,
    ]
}

// ===================================================================
// Tests
// ===================================================================

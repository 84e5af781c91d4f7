//! Bitmap fonts: glyph regions in one texture, laid out into quad batches.
//!
//! Layout works in font units (the font's native size) inside a container
//! of `width / scale × height / scale`, then scales every glyph location by
//! `font_size / native_size`. Lines wrap at the last whitespace; when
//! auto-scaling, a word that does not fit restarts the whole layout one font
//! unit smaller instead of being split.

use std::collections::HashMap;

use glint_core::{color, Painter, Quad, QuadBatch, Rect, Texture};
use log::{trace, warn};

use crate::error::TextError;
use crate::layout::{HAlign, VAlign};

/// Most glyphs one text field may place.
pub const MAX_GLYPHS: usize = 8192;

/// Auto-scale stops shrinking at this size.
const MIN_AUTO_SCALE_FONT_SIZE: f32 = 3.0;

#[derive(Clone, Debug, PartialEq)]
pub struct BitmapChar {
    pub id: u32,
    /// Glyph rectangle inside the font texture, in points.
    pub region: Rect,
    pub x_offset: f32,
    pub y_offset: f32,
    pub x_advance: f32,
    kernings: HashMap<u32, f32>,
}

impl BitmapChar {
    pub fn new(id: u32, region: Rect, x_offset: f32, y_offset: f32, x_advance: f32) -> Self {
        Self {
            id,
            region,
            x_offset,
            y_offset,
            x_advance,
            kernings: HashMap::new(),
        }
    }

    /// Adjust the advance when this char follows `previous`.
    pub fn add_kerning(&mut self, previous: u32, amount: f32) {
        self.kernings.insert(previous, amount);
    }

    pub fn kerning(&self, previous: u32) -> f32 {
        self.kernings.get(&previous).copied().unwrap_or(0.0)
    }

    pub fn width(&self) -> f32 {
        self.region.width
    }

    pub fn height(&self) -> f32 {
        self.region.height
    }
}

/// Where one glyph ends up, in container space.
#[derive(Clone, Copy, Debug, PartialEq)]
struct CharLocation {
    id: u32,
    x: f32,
    y: f32,
    scale: f32,
}

#[derive(Debug)]
pub struct BitmapFont {
    name: String,
    size: f32,
    line_height: f32,
    base: f32,
    texture: Texture,
    chars: HashMap<u32, BitmapChar>,
    disposed: bool,
}

impl BitmapFont {
    pub fn new(name: impl Into<String>, size: f32, line_height: f32, base: f32, texture: Texture) -> Self {
        Self {
            name: name.into(),
            size,
            line_height,
            base,
            texture,
            chars: HashMap::new(),
            disposed: false,
        }
    }

    /// Fixed-cell font: `chars` fill the texture row by row in cells of
    /// `cell_width × cell_height` points. Whitespace gets an empty region.
    pub fn from_grid(name: impl Into<String>, texture: Texture, cell_width: f32, cell_height: f32, chars: &str) -> Self {
        let columns = ((texture.width / cell_width).floor() as usize).max(1);
        let mut font = Self::new(name, cell_height, cell_height, cell_height, texture);
        for (i, ch) in chars.chars().enumerate() {
            let region = if ch.is_whitespace() {
                Rect::default()
            } else {
                let col = (i % columns) as f32;
                let row = (i / columns) as f32;
                Rect::new(col * cell_width, row * cell_height, cell_width, cell_height)
            };
            font.add_char(BitmapChar::new(ch as u32, region, 0.0, 0.0, cell_width));
        }
        font
    }

    pub fn add_char(&mut self, ch: BitmapChar) {
        self.chars.insert(ch.id, ch);
    }

    pub fn char(&self, id: u32) -> Option<&BitmapChar> {
        self.chars.get(&id)
    }

    pub fn char_mut(&mut self, id: u32) -> Option<&mut BitmapChar> {
        self.chars.get_mut(&id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native size in points.
    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    pub fn base(&self) -> f32 {
        self.base
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Release the font texture. Later calls do nothing.
    pub fn dispose(&mut self, painter: &mut Painter) {
        if self.disposed {
            return;
        }
        painter.dispose_texture(&self.texture);
        self.disposed = true;
    }

    /// Lay out `text` inside `width × height` and append one quad per
    /// visible glyph to `batch`.
    ///
    /// A negative `font_size` is a multiple of the native size (`-1` = native).
    #[allow(clippy::too_many_arguments)]
    pub fn fill_quad_batch(
        &self,
        batch: &mut QuadBatch,
        width: f32,
        height: f32,
        text: &str,
        font_size: f32,
        color: u32,
        h_align: HAlign,
        v_align: VAlign,
        auto_scale: bool,
        kerning: bool,
    ) -> Result<(), TextError> {
        let locations = self.arrange_chars(width, height, text, font_size, h_align, v_align, auto_scale, kerning);
        if locations.len() > MAX_GLYPHS {
            return Err(TextError::TextTooLong { limit: MAX_GLYPHS, got: locations.len() });
        }
        let rgba = color::to_rgba(color, 1.0);
        let (tw, th) = (self.texture.width, self.texture.height);
        for loc in &locations {
            let Some(ch) = self.chars.get(&loc.id) else { continue };
            let r = &ch.region;
            batch.add_quad(Quad {
                x: loc.x,
                y: loc.y,
                width: r.width * loc.scale,
                height: r.height * loc.scale,
                uv: [r.x / tw, r.y / th, r.right() / tw, r.bottom() / th],
                color: rgba,
            });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn arrange_chars(
        &self,
        width: f32,
        height: f32,
        text: &str,
        font_size: f32,
        h_align: HAlign,
        v_align: VAlign,
        auto_scale: bool,
        kerning: bool,
    ) -> Vec<CharLocation> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut font_size = if font_size < 0.0 { font_size * -self.size } else { font_size };
        let chars: Vec<char> = text.chars().collect();
        let num_chars = chars.len();

        let mut lines: Vec<Vec<CharLocation>> = Vec::new();
        let mut finished = false;
        let mut scale = 1.0;
        let mut container_width = width;
        let mut container_height = height;
        let mut current_y = 0.0;
        let mut attempts = 0;

        while !finished {
            lines.clear();
            attempts += 1;
            scale = font_size / self.size;
            container_width = width / scale;
            container_height = height / scale;

            if self.line_height <= container_height {
                let mut last_white_space: Option<usize> = None;
                let mut last_char_id: Option<u32> = None;
                let mut current_x = 0.0;
                let mut current_line: Vec<CharLocation> = Vec::new();
                current_y = 0.0;

                let mut i = 0;
                while i < num_chars {
                    let mut line_full = false;
                    let ch = chars[i];
                    let char_id = ch as u32;

                    if ch == '\n' || ch == '\r' {
                        line_full = true;
                    } else if let Some(bc) = self.chars.get(&char_id) {
                        if ch == ' ' || ch == '\t' {
                            last_white_space = Some(i);
                        }
                        if kerning {
                            if let Some(previous) = last_char_id {
                                current_x += bc.kerning(previous);
                            }
                        }
                        let location = CharLocation {
                            id: char_id,
                            x: current_x + bc.x_offset,
                            y: current_y + bc.y_offset,
                            scale: 1.0,
                        };
                        current_line.push(location);
                        current_x += bc.x_advance;
                        last_char_id = Some(char_id);

                        if location.x + bc.width() > container_width {
                            // Auto-scaling must not split a word: restart smaller.
                            if auto_scale && last_white_space.is_none() {
                                break;
                            }
                            let num_to_remove = match last_white_space {
                                Some(ws) => i - ws,
                                None => 1,
                            };
                            let keep = current_line.len().saturating_sub(num_to_remove);
                            current_line.truncate(keep);
                            if current_line.is_empty() {
                                break;
                            }
                            i -= num_to_remove;
                            line_full = true;
                        }
                    } else {
                        warn!("Missing character {char_id:#x} in bitmap font '{}'", self.name);
                    }

                    if i == num_chars - 1 {
                        lines.push(std::mem::take(&mut current_line));
                        finished = true;
                    } else if line_full {
                        if last_white_space == Some(i) {
                            current_line.pop();
                        }
                        lines.push(std::mem::take(&mut current_line));

                        if current_y + 2.0 * self.line_height <= container_height {
                            current_x = 0.0;
                            current_y += self.line_height;
                            last_white_space = None;
                            last_char_id = None;
                        } else {
                            break;
                        }
                    }
                    i += 1;
                }
            }

            if auto_scale && !finished && font_size > MIN_AUTO_SCALE_FONT_SIZE {
                font_size -= 1.0;
            } else {
                finished = true;
            }
        }
        if attempts > 1 {
            trace!("Bitmap text auto-scaled to {font_size} after {attempts} layouts");
        }

        let bottom = current_y + self.line_height;
        let y_offset = match v_align {
            VAlign::Top => 0.0,
            VAlign::Center => (container_height - bottom) / 2.0,
            VAlign::Bottom => container_height - bottom,
        };

        let mut result = Vec::new();
        for line in &lines {
            let Some(last) = line.last() else { continue };
            let Some(last_char) = self.chars.get(&last.id) else { continue };
            let right = last.x - last_char.x_offset + last_char.x_advance;
            let x_offset = match h_align {
                HAlign::Left => 0.0,
                HAlign::Center => (container_width - right) / 2.0,
                HAlign::Right => container_width - right,
            };
            for loc in line {
                let Some(ch) = self.chars.get(&loc.id) else { continue };
                if ch.width() > 0.0 && ch.height() > 0.0 {
                    result.push(CharLocation {
                        id: loc.id,
                        x: scale * (loc.x + x_offset),
                        y: scale * (loc.y + y_offset),
                        scale,
                    });
                }
            }
        }
        result
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::UNBOUNDED;
    use glint_core::{SoftwareBackend, TextureDescriptor, TextureId};

    const CHARS: &str = "abcdefghijklmnopqrstuvwxyz ";

    fn font() -> BitmapFont {
        let texture = Texture::from_descriptor(TextureId::new(), &TextureDescriptor::new(100.0, 30.0, 1.0));
        BitmapFont::from_grid("grid", texture, 10.0, 10.0, CHARS)
    }

    fn layout(font: &BitmapFont, w: f32, h: f32, text: &str, h_align: HAlign, v_align: VAlign, auto_scale: bool) -> Vec<Quad> {
        let mut batch = QuadBatch::new();
        font.fill_quad_batch(&mut batch, w, h, text, -1.0, 0xFFFFFF, h_align, v_align, auto_scale, true)
            .unwrap();
        batch.quads().to_vec()
    }

    #[test]
    fn test_single_line() {
        let q = layout(&font(), 100.0, 20.0, "abc", HAlign::Left, VAlign::Top, false);
        assert_eq!(q.len(), 3);
        assert_eq!((q[0].x, q[1].x, q[2].x), (0.0, 10.0, 20.0));
        assert!(q.iter().all(|q| q.y == 0.0));
        // 'b' sits in the second grid cell.
        assert_eq!(q[1].uv, [0.1, 0.0, 0.2, 10.0 / 30.0]);
    }

    #[test]
    fn test_wraps_at_last_whitespace() {
        let q = layout(&font(), 35.0, 50.0, "ab cd", HAlign::Left, VAlign::Top, false);
        assert_eq!(q.len(), 4);
        assert_eq!((q[2].x, q[2].y), (0.0, 10.0));
        assert_eq!((q[3].x, q[3].y), (10.0, 10.0));
    }

    #[test]
    fn test_newline_starts_new_line() {
        let q = layout(&font(), 100.0, 50.0, "ab\ncd", HAlign::Left, VAlign::Top, false);
        assert_eq!(q.len(), 4);
        assert_eq!((q[2].x, q[2].y), (0.0, 10.0));
    }

    #[test]
    fn test_auto_scale_shrinks_whole_units() {
        let q = layout(&font(), 30.0, 10.0, "abcdef", HAlign::Left, VAlign::Top, true);
        assert_eq!(q.len(), 6);
        // Fits at font size 5: scale 0.5.
        assert_eq!(q[5].x, 25.0);
        assert_eq!(q[5].width, 5.0);
    }

    #[test]
    fn test_center_and_bottom_alignment() {
        let q = layout(&font(), 100.0, 50.0, "ab", HAlign::Center, VAlign::Bottom, false);
        assert_eq!(q[0].x, 40.0);
        assert_eq!(q[0].y, 40.0);
        let r = layout(&font(), 100.0, 50.0, "ab", HAlign::Right, VAlign::Center, false);
        assert_eq!(r[0].x, 80.0);
        assert_eq!(r[0].y, 20.0);
    }

    #[test]
    fn test_missing_char_skipped() {
        let q = layout(&font(), 100.0, 20.0, "a?b", HAlign::Left, VAlign::Top, false);
        assert_eq!(q.len(), 2);
        assert_eq!(q[1].x, 10.0);
    }

    #[test]
    fn test_kerning() {
        let mut f = font();
        if let Some(b) = f.char_mut('b' as u32) {
            b.add_kerning('a' as u32, -2.0);
        }
        let q = layout(&f, 100.0, 20.0, "ab", HAlign::Left, VAlign::Top, false);
        assert_eq!(q[1].x, 8.0);

        let mut batch = QuadBatch::new();
        f.fill_quad_batch(&mut batch, 100.0, 20.0, "ab", -1.0, 0, HAlign::Left, VAlign::Top, false, false)
            .unwrap();
        assert_eq!(batch.quads()[1].x, 10.0);
    }

    #[test]
    fn test_box_too_small_for_one_line() {
        let q = layout(&font(), 100.0, 5.0, "abc", HAlign::Left, VAlign::Top, false);
        assert!(q.is_empty());
    }

    #[test]
    fn test_glyph_limit() {
        let text = "a".repeat(MAX_GLYPHS + 1);
        let mut batch = QuadBatch::new();
        let err = font().fill_quad_batch(
            &mut batch,
            UNBOUNDED,
            UNBOUNDED,
            &text,
            -1.0,
            0,
            HAlign::Left,
            VAlign::Top,
            false,
            false,
        );
        assert!(matches!(err, Err(TextError::TextTooLong { got, .. }) if got == MAX_GLYPHS + 1));
    }

    #[test]
    fn test_dispose_once() {
        let backend = SoftwareBackend::default();
        let mut painter = Painter::new(Box::new(backend.clone()));
        let texture = painter.create_texture(&TextureDescriptor::new(100.0, 30.0, 1.0)).unwrap();
        let mut f = BitmapFont::from_grid("grid", texture, 10.0, 10.0, CHARS);
        f.dispose(&mut painter);
        f.dispose(&mut painter);
        assert!(f.is_disposed());
        assert_eq!(backend.stats().textures_disposed, 1);
    }
}

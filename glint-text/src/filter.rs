//! Native filters for rasterized text.
//!
//! Filters do two things: they enlarge the area the text occupies (which
//! moves the text inside its pixmap, see [`filter_offset`]) and they are
//! applied to the pixmap after the glyphs are drawn.

use glint_core::{Pixmap, Point, Rect};
use serde::{Deserialize, Serialize};

use crate::layout::{HAlign, VAlign};

/// Extra margin per unit of blur.
const BLUR_MARGIN: f32 = 1.33;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    Blur {
        blur_x: f32,
        blur_y: f32,
    },
    DropShadow {
        distance: f32,
        /// Degrees, clockwise from the positive x axis.
        angle: f32,
        color: u32,
        alpha: f32,
        blur_x: f32,
        blur_y: f32,
    },
    Glow {
        color: u32,
        alpha: f32,
        blur_x: f32,
        blur_y: f32,
    },
    /// A filter kind this engine cannot apply. Contributes no margin.
    Other,
}

impl Filter {
    pub fn drop_shadow(color: u32) -> Self {
        Filter::DropShadow {
            distance: 4.0,
            angle: 45.0,
            color,
            alpha: 1.0,
            blur_x: 4.0,
            blur_y: 4.0,
        }
    }

    pub fn glow(color: u32) -> Self {
        Filter::Glow { color, alpha: 1.0, blur_x: 6.0, blur_y: 6.0 }
    }

    /// `(blur_x, blur_y, angle_deg, distance)`; zero where a kind lacks one.
    pub fn geometry(&self) -> (f32, f32, f32, f32) {
        match *self {
            Filter::Blur { blur_x, blur_y } => (blur_x, blur_y, 0.0, 0.0),
            Filter::DropShadow { distance, angle, blur_x, blur_y, .. } => (blur_x, blur_y, angle, distance),
            Filter::Glow { blur_x, blur_y, .. } => (blur_x, blur_y, 0.0, 0.0),
            Filter::Other => (0.0, 0.0, 0.0, 0.0),
        }
    }

    /// Region the filtered text covers, relative to the unfiltered text.
    pub fn bounds(&self, text_width: f32, text_height: f32) -> Rect {
        let (blur_x, blur_y, angle_deg, distance) = self.geometry();
        let angle = angle_deg.to_radians();
        let margin_x = blur_x * BLUR_MARGIN;
        let margin_y = blur_y * BLUR_MARGIN;
        Rect::new(
            angle.cos() * distance - margin_x / 2.0,
            angle.sin() * distance - margin_y / 2.0,
            text_width + margin_x,
            text_height + margin_y,
        )
    }

    /// Apply the filter to a rasterized pixmap in place.
    pub fn apply(&self, pixmap: &mut Pixmap) {
        match *self {
            Filter::Blur { blur_x, blur_y } => box_blur(pixmap, blur_radius(blur_x), blur_radius(blur_y)),
            Filter::DropShadow { distance, angle, color, alpha, blur_x, blur_y } => {
                let a = angle.to_radians();
                let dx = (a.cos() * distance).round() as i32;
                let dy = (a.sin() * distance).round() as i32;
                underlay(pixmap, color, alpha, dx, dy, blur_radius(blur_x), blur_radius(blur_y));
            }
            Filter::Glow { color, alpha, blur_x, blur_y } => {
                underlay(pixmap, color, alpha, 0, 0, blur_radius(blur_x), blur_radius(blur_y));
            }
            Filter::Other => {}
        }
    }
}

/// Offset that keeps filtered text inside its pixmap.
///
/// Only the leading alignment pulls negative overhang back in, and only the
/// trailing alignment pushes positive overhang back; note that the
/// horizontal trailing case tests the union's `y`, not its `x`.
pub fn filter_offset(filters: &[Filter], h_align: HAlign, v_align: VAlign, text_width: f32, text_height: f32) -> Point {
    let mut offset = Point::ZERO;
    if filters.is_empty() {
        return offset;
    }
    let union = filters
        .iter()
        .fold(Rect::default(), |acc, f| acc.union(&f.bounds(text_width, text_height)));

    if h_align == HAlign::Left && union.x < 0.0 {
        offset.x = -union.x;
    } else if h_align == HAlign::Right && union.y > 0.0 {
        offset.x = -(union.right() - text_width);
    }
    if v_align == VAlign::Top && union.y < 0.0 {
        offset.y = -union.y;
    } else if v_align == VAlign::Bottom && union.y > 0.0 {
        offset.y = -(union.bottom() - text_height);
    }
    offset
}

fn blur_radius(blur: f32) -> usize {
    (blur / 2.0).max(0.0).round() as usize
}

/// Separable box blur over premultiplied channels.
fn box_blur(pixmap: &mut Pixmap, rx: usize, ry: usize) {
    let (w, h) = (pixmap.width() as usize, pixmap.height() as usize);
    if rx > 0 {
        blur_pass(pixmap.data_mut(), w, h, rx, 4, w * 4);
    }
    if ry > 0 {
        blur_pass(pixmap.data_mut(), h, w, ry, w * 4, 4);
    }
}

/// One blur direction: `len` samples `step` bytes apart, repeated for
/// `lines` lines starting `line_step` bytes apart.
fn blur_pass(data: &mut [u8], len: usize, lines: usize, radius: usize, step: usize, line_step: usize) {
    let mut line = vec![[0u32; 4]; len];
    for l in 0..lines {
        let base = l * line_step;
        for (i, px) in line.iter_mut().enumerate() {
            let o = base + i * step;
            *px = [data[o] as u32, data[o + 1] as u32, data[o + 2] as u32, data[o + 3] as u32];
        }
        for i in 0..len {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius).min(len - 1);
            let mut sum = [0u32; 4];
            for px in &line[lo..=hi] {
                for c in 0..4 {
                    sum[c] += px[c];
                }
            }
            // Out-of-range samples count as transparent.
            let n = (2 * radius + 1) as u32;
            let o = base + i * step;
            for c in 0..4 {
                data[o + c] = (sum[c] / n) as u8;
            }
        }
    }
}

/// Draw a tinted, offset and blurred copy of the coverage beneath the
/// original pixels.
fn underlay(pixmap: &mut Pixmap, rgb: u32, alpha: f32, dx: i32, dy: i32, rx: usize, ry: usize) {
    let (w, h) = (pixmap.width() as i32, pixmap.height() as i32);
    let mut shadow = Pixmap::new(pixmap.width(), pixmap.height());
    for y in 0..h {
        for x in 0..w {
            if let Some([.., a]) = pixmap.pixel(x, y) {
                if a > 0 {
                    let coverage = (a as f32 * alpha.clamp(0.0, 1.0)).round() as u8;
                    shadow.blend_coverage(x + dx, y + dy, rgb, coverage);
                }
            }
        }
    }
    box_blur(&mut shadow, rx, ry);
    for y in 0..h {
        for x in 0..w {
            if let Some(src) = pixmap.pixel(x, y) {
                shadow.blend_pixel(x, y, src);
            }
        }
    }
    *pixmap = shadow;
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filters_no_offset() {
        assert_eq!(filter_offset(&[], HAlign::Left, VAlign::Top, 100.0, 20.0), Point::ZERO);
    }

    #[test]
    fn test_blur_offsets_leading_alignment() {
        let filters = [Filter::Blur { blur_x: 6.0, blur_y: 3.0 }];
        let off = filter_offset(&filters, HAlign::Left, VAlign::Top, 100.0, 20.0);
        assert!((off.x - 3.99).abs() < 1e-4);
        assert!((off.y - 1.995).abs() < 1e-4);
        // Centered text is never shifted.
        let centered = filter_offset(&filters, HAlign::Center, VAlign::Center, 100.0, 20.0);
        assert_eq!(centered, Point::ZERO);
    }

    #[test]
    fn test_right_alignment_tests_union_y() {
        // Shadow straight down: union.y > 0 while union.x < 0.
        let down = [Filter::DropShadow {
            distance: 10.0,
            angle: 90.0,
            color: 0,
            alpha: 1.0,
            blur_x: 2.0,
            blur_y: 2.0,
        }];
        let off = filter_offset(&down, HAlign::Right, VAlign::Bottom, 100.0, 20.0);
        let union = down[0].bounds(100.0, 20.0);
        assert!(union.y > 0.0);
        assert!((off.x + (union.right() - 100.0)).abs() < 1e-4);
        assert!((off.y + (union.bottom() - 20.0)).abs() < 1e-4);

        // Shadow straight right: union.x > 0 but union.y < 0, so no x shift.
        let right = [Filter::DropShadow {
            distance: 10.0,
            angle: 0.0,
            color: 0,
            alpha: 1.0,
            blur_x: 2.0,
            blur_y: 2.0,
        }];
        let off = filter_offset(&right, HAlign::Right, VAlign::Top, 100.0, 20.0);
        assert_eq!(off.x, 0.0);
        assert!(off.y > 0.0);
    }

    #[test]
    fn test_other_filter_has_no_margin() {
        let off = filter_offset(&[Filter::Other], HAlign::Left, VAlign::Top, 50.0, 10.0);
        assert_eq!(off, Point::ZERO);
    }

    #[test]
    fn test_blur_spreads_coverage() {
        let mut p = Pixmap::new(9, 1);
        p.set_pixel(4, 0, [255, 255, 255, 255]);
        Filter::Blur { blur_x: 4.0, blur_y: 0.0 }.apply(&mut p);
        assert_eq!(p.covered_pixels(), 5);
        assert_eq!(p.pixel(4, 0).unwrap()[3], 51);
    }

    #[test]
    fn test_drop_shadow_underlays() {
        let mut p = Pixmap::new(8, 8);
        p.set_pixel(2, 2, [255, 255, 255, 255]);
        Filter::DropShadow {
            distance: 2.0,
            angle: 0.0,
            color: 0xFF0000,
            alpha: 1.0,
            blur_x: 0.0,
            blur_y: 0.0,
        }
        .apply(&mut p);
        assert_eq!(p.pixel(2, 2), Some([255, 255, 255, 255]));
        assert_eq!(p.pixel(4, 2), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_serde_tagged() {
        let json = r#"{"type":"glow","color":65280,"alpha":0.5,"blur_x":4.0,"blur_y":4.0}"#;
        let filter: Filter = serde_json::from_str(json).unwrap();
        assert!(matches!(filter, Filter::Glow { color: 0x00FF00, .. }));
    }
}

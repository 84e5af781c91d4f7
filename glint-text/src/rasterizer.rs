//! Rasterized text: the engine contract and its cosmic-text implementation.
//!
//! The engine lays text out inside the request box minus a 2-unit gutter on
//! each side, wraps lines at the box width and aligns every line
//! horizontally. Vertical alignment is the caller's job: it moves the
//! draw `origin`.
//!
//! [`CosmicRasterizer`] keeps two font systems. Embedded fonts (registered
//! with [`CosmicRasterizer::embed_font`]) live in their own database and are
//! tried first; the system database is only loaded when a request asks for
//! non-embedded fonts.

use std::num::NonZeroUsize;

use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping, Style, SwashCache, Weight};
use glint_core::Pixmap;
use log::debug;
use lru::LruCache;

use crate::filter::Filter;
use crate::layout::{HAlign, TextMetrics, GUTTER, UNBOUNDED};

/// Line height as a multiple of the font size.
const LINE_SPACING: f32 = 1.2;

/// Font selection and styling for one request.
#[derive(Clone, Debug, PartialEq)]
pub struct FontSpec {
    pub name: String,
    /// Size in device pixels.
    pub size: f32,
    pub color: u32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub kerning: bool,
}

#[derive(Clone, Debug)]
pub struct RasterRequest<'a> {
    pub text: &'a str,
    pub font: FontSpec,
    /// Layout box in device pixels; [`UNBOUNDED`] disables wrapping.
    pub width: f32,
    pub height: f32,
    pub h_align: HAlign,
    pub filters: &'a [Filter],
    /// Restrict font lookup to embedded fonts.
    pub embed_fonts: bool,
}

pub trait TextRasterizer {
    /// Natural size of the laid-out text.
    fn measure(&mut self, request: &RasterRequest<'_>) -> TextMetrics;

    /// Draw the glyphs into a box whose top-left corner is at `origin`; the
    /// first line starts one gutter (2 units) inside it.
    fn draw(&mut self, request: &RasterRequest<'_>, origin: (f32, f32), target: &mut Pixmap);

    /// Draw, then apply the request's filters to the whole pixmap.
    fn rasterize(&mut self, request: &RasterRequest<'_>, origin: (f32, f32), target: &mut Pixmap) {
        self.draw(request, origin, target);
        for filter in request.filters {
            filter.apply(target);
        }
    }
}

// ── cosmic-text ──────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct MeasureKey {
    text: String,
    font: String,
    size: u32,
    width: u32,
    style: u8,
    embed: bool,
}

impl MeasureKey {
    fn new(req: &RasterRequest<'_>) -> Self {
        let f = &req.font;
        let style = (f.bold as u8) | (f.italic as u8) << 1 | (f.kerning as u8) << 2;
        Self {
            text: req.text.to_string(),
            font: f.name.to_lowercase(),
            size: f.size.to_bits(),
            width: req.width.to_bits(),
            style,
            embed: req.embed_fonts,
        }
    }
}

/// One shaped line: its glyph run offsets and width.
struct ShapedLine {
    line_y: f32,
    line_w: f32,
    glyphs: Vec<(cosmic_text::CacheKey, i32, i32)>,
}

pub struct CosmicRasterizer {
    embedded: FontSystem,
    system: Option<FontSystem>,
    swash_cache: SwashCache,
    measurements: LruCache<MeasureKey, TextMetrics>,
}

impl Default for CosmicRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CosmicRasterizer {
    pub fn new() -> Self {
        let embedded = FontSystem::new_with_locale_and_db("en-US".to_string(), cosmic_text::fontdb::Database::new());
        let capacity = NonZeroUsize::new(256).unwrap_or(NonZeroUsize::MIN);
        Self {
            embedded,
            system: None,
            swash_cache: SwashCache::new(),
            measurements: LruCache::new(capacity),
        }
    }

    /// Register font file bytes (TTF/OTF) as an embedded font.
    pub fn embed_font(&mut self, data: Vec<u8>) {
        self.embedded.db_mut().load_font_data(data);
        self.measurements.clear();
    }

    /// Whether an embedded face with this family name exists.
    pub fn has_embedded_font(&self, name: &str) -> bool {
        has_family(&self.embedded, name)
    }

    fn shape(&mut self, req: &RasterRequest<'_>) -> Vec<ShapedLine> {
        if req.text.is_empty() {
            return Vec::new();
        }
        if req.embed_fonts && !self.has_embedded_font(&req.font.name) {
            return Vec::new();
        }
        let font = &req.font;
        let line_height = font.size * LINE_SPACING;
        let wrap_width = if req.width >= UNBOUNDED { None } else { Some((req.width - GUTTER).max(0.0)) };
        let shaping = if font.kerning { Shaping::Advanced } else { Shaping::Basic };

        let family = family_for(&font.name);
        let attrs = Attrs::new()
            .family(family)
            .weight(if font.bold { Weight::BOLD } else { Weight::NORMAL })
            .style(if font.italic { Style::Italic } else { Style::Normal });

        let fs = select_font_system(&mut self.embedded, &mut self.system, req.embed_fonts);
        let mut buffer = Buffer::new(fs, Metrics::new(font.size, line_height));
        buffer.set_size(fs, wrap_width, None);
        buffer.set_text(fs, req.text, attrs, shaping);
        buffer.shape_until_scroll(fs, false);

        buffer
            .layout_runs()
            .map(|run| ShapedLine {
                line_y: run.line_y,
                line_w: run.line_w,
                glyphs: run
                    .glyphs
                    .iter()
                    .map(|g| {
                        let physical = g.physical((0.0, 0.0), 1.0);
                        (physical.cache_key, physical.x, physical.y)
                    })
                    .collect(),
            })
            .collect()
    }
}

impl TextRasterizer for CosmicRasterizer {
    fn measure(&mut self, request: &RasterRequest<'_>) -> TextMetrics {
        let key = MeasureKey::new(request);
        if let Some(metrics) = self.measurements.get(&key) {
            return *metrics;
        }
        let lines = self.shape(request);
        let line_height = request.font.size * LINE_SPACING;
        let metrics = TextMetrics {
            width: lines.iter().map(|l| l.line_w).fold(0.0, f32::max),
            height: lines.len() as f32 * line_height,
        };
        self.measurements.put(key, metrics);
        metrics
    }

    fn draw(&mut self, request: &RasterRequest<'_>, origin: (f32, f32), target: &mut Pixmap) {
        let lines = self.shape(request);
        let available = if request.width >= UNBOUNDED { None } else { Some(request.width - GUTTER) };
        let font = &request.font;
        let embed = request.embed_fonts;

        for line in &lines {
            let align = match (available, request.h_align) {
                (Some(avail), HAlign::Center) => ((avail - line.line_w) / 2.0).max(0.0),
                (Some(avail), HAlign::Right) => (avail - line.line_w).max(0.0),
                _ => 0.0,
            };
            let x0 = origin.0 + GUTTER / 2.0 + align;
            // line_y is the baseline.
            let y0 = origin.1 + GUTTER / 2.0 + line.line_y;

            for &(cache_key, gx, gy) in &line.glyphs {
                let fs = select_font_system(&mut self.embedded, &mut self.system, embed);
                let image = self.swash_cache.get_image(fs, cache_key);
                let image = match image {
                    Some(img) => img,
                    None => continue, // whitespace or missing glyph
                };
                if image.placement.width == 0 || image.placement.height == 0 {
                    continue;
                }
                target.blit_bitmap(
                    (x0 + (gx + image.placement.left) as f32).round() as i32,
                    (y0 + (gy - image.placement.top) as f32).round() as i32,
                    image.placement.width,
                    image.placement.height,
                    &image.data,
                    font.color,
                );
            }

            if font.underline && line.line_w > 0.0 {
                let thickness = (font.size / 16.0).ceil().max(1.0) as u32;
                let y = (y0 + font.size * 0.15).round() as i32;
                target.fill_rect(x0.round() as i32, y, line.line_w.ceil() as u32, thickness, font.color, 1.0);
            }
        }
    }
}

fn select_font_system<'a>(
    embedded: &'a mut FontSystem,
    system: &'a mut Option<FontSystem>,
    embed_fonts: bool,
) -> &'a mut FontSystem {
    if embed_fonts {
        return embedded;
    }
    system.get_or_insert_with(|| {
        debug!("Loading system fonts for non-embedded text");
        FontSystem::new()
    })
}

fn family_for(name: &str) -> Family<'_> {
    match name.to_ascii_lowercase().as_str() {
        "sans-serif" | "_sans" => Family::SansSerif,
        "serif" | "_serif" => Family::Serif,
        "monospace" | "_typewriter" => Family::Monospace,
        _ => Family::Name(name),
    }
}

fn has_family(fs: &FontSystem, name: &str) -> bool {
    fs.db()
        .faces()
        .any(|face| face.families.iter().any(|(family, _)| family.eq_ignore_ascii_case(name)))
}

// ===================================================================
// Tests
// ===================================================================

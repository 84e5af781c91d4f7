//! Shared fixtures: a deterministic text engine and a software painter.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use glint_core::{Painter, Pixmap, SoftwareBackend, TextureDescriptor};
use glint_text::layout::{GUTTER, UNBOUNDED};
use glint_text::{BitmapFont, HAlign, RasterRequest, SharedTextContext, TextConfig, TextContext, TextMetrics, TextRasterizer};

/// One engine call.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub draw: bool,
    pub font_size: f32,
    pub embed_fonts: bool,
    pub width: f32,
}

/// Every glyph is `size / 2` wide; every line is `size × 1.2` tall.
/// Lines are aligned like the real engine but not wrapped.
/// Embedded lookups only succeed for names in `embedded`.
pub struct FixedRasterizer {
    pub embedded: HashSet<String>,
    pub calls: Rc<RefCell<Vec<Call>>>,
}

impl FixedRasterizer {
    pub fn natural(text: &str, size: f32) -> TextMetrics {
        if text.is_empty() {
            return TextMetrics::default();
        }
        let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        let lines = text.lines().count().max(1);
        TextMetrics {
            width: longest as f32 * size / 2.0,
            height: lines as f32 * size * 6.0 / 5.0,
        }
    }

    fn lookup(&self, req: &RasterRequest<'_>) -> TextMetrics {
        if req.embed_fonts && !self.embedded.contains(&req.font.name) {
            return TextMetrics::default();
        }
        Self::natural(req.text, req.font.size)
    }
}

impl TextRasterizer for FixedRasterizer {
    fn measure(&mut self, req: &RasterRequest<'_>) -> TextMetrics {
        self.calls.borrow_mut().push(Call {
            draw: false,
            font_size: req.font.size,
            embed_fonts: req.embed_fonts,
            width: req.width,
        });
        self.lookup(req)
    }

    fn draw(&mut self, req: &RasterRequest<'_>, origin: (f32, f32), target: &mut Pixmap) {
        self.calls.borrow_mut().push(Call {
            draw: true,
            font_size: req.font.size,
            embed_fonts: req.embed_fonts,
            width: req.width,
        });
        let m = self.lookup(req);
        let align = match req.h_align {
            _ if req.width >= UNBOUNDED => 0.0,
            HAlign::Left => 0.0,
            HAlign::Center => (req.width - GUTTER - m.width) / 2.0,
            HAlign::Right => req.width - GUTTER - m.width,
        };
        let x = (origin.0 + GUTTER / 2.0 + align) as i32;
        let y = (origin.1 + GUTTER / 2.0) as i32;
        target.fill_rect(x, y, m.width as u32, m.height as u32, req.font.color, 1.0);
    }
}

pub struct Fixture {
    pub painter: Painter,
    pub backend: SoftwareBackend,
    pub context: SharedTextContext,
    pub calls: Rc<RefCell<Vec<Call>>>,
}

pub fn fixture() -> Fixture {
    fixture_with(&["Verdana"])
}

pub fn fixture_with(embedded: &[&str]) -> Fixture {
    let backend = SoftwareBackend::default();
    let painter = Painter::new(Box::new(backend.clone()));
    let calls = Rc::new(RefCell::new(Vec::new()));
    let rasterizer = FixedRasterizer {
        embedded: embedded.iter().map(|s| s.to_string()).collect(),
        calls: Rc::clone(&calls),
    };
    let context = TextContext::new(Box::new(rasterizer), TextConfig::default()).shared();
    Fixture { painter, backend, context, calls }
}

/// Register a 10×10 grid font named "grid" with a real texture.
pub fn register_grid_font(fx: &mut Fixture) {
    let texture = fx
        .painter
        .create_texture(&TextureDescriptor::new(100.0, 30.0, 1.0))
        .expect("font texture");
    let font = BitmapFont::from_grid("grid", texture, 10.0, 10.0, "abcdefghijklmnopqrstuvwxyz ");
    fx.context.borrow_mut().fonts.register(font, None);
}

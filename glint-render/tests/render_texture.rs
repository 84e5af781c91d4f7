//! Render texture behavior against the software backend.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use glint_core::{
    BlendMode, DisplayObject, Matrix, Painter, PainterConfig, Pixmap, Quad, Rect, RenderError, Smoothing,
    SoftwareBackend, SoftwareBackendConfig, TextureDescriptor, Transform2D,
};
use glint_render::{RenderTexture, RenderTextureConfig};
use glint_text::{
    BitmapFont, CosmicRasterizer, RasterRequest, TextConfig, TextContext, TextField, TextFormat, TextMetrics,
    TextRasterizer,
};

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const CLEAR: [u8; 4] = [0, 0, 0, 0];

/// Solid rectangle that counts how often it is rendered.
struct Probe {
    rect: Rect,
    color: u32,
    transform: Transform2D,
    renders: Rc<Cell<u32>>,
}

impl Probe {
    fn new(rect: Rect, color: u32, renders: &Rc<Cell<u32>>) -> Self {
        Self {
            rect,
            color,
            transform: Transform2D::default(),
            renders: Rc::clone(renders),
        }
    }
}

impl DisplayObject for Probe {
    fn transform(&self) -> Transform2D {
        self.transform
    }

    fn blend_mode(&self) -> BlendMode {
        BlendMode::Auto
    }

    fn render(&mut self, painter: &mut Painter, parent_alpha: f32) -> Result<(), RenderError> {
        self.renders.set(self.renders.get() + 1);
        let quad = Quad::solid(self.rect.x, self.rect.y, self.rect.width, self.rect.height, self.color);
        painter.batch_quads(&[quad], None, Smoothing::None, parent_alpha)
    }
}

fn setup() -> (Painter, SoftwareBackend) {
    let backend = SoftwareBackend::default();
    (Painter::new(Box::new(backend.clone())), backend)
}

fn persistent(painter: &mut Painter, w: f32, h: f32) -> RenderTexture {
    RenderTexture::new(painter, w, h, RenderTextureConfig::default()).unwrap()
}

fn pixels(backend: &SoftwareBackend, rt: &RenderTexture) -> Pixmap {
    backend.pixels(rt.texture().id).unwrap()
}

fn assert_painter_idle(painter: &mut Painter) {
    assert_eq!(painter.render_target(), None);
    assert_eq!(painter.clip_rect(), None);
    assert_eq!(painter.pending_quads(), 0);
    assert_eq!(painter.projection(), PainterConfig::default().initial_projection);
    assert!(matches!(painter.pop_state(), Err(RenderError::StackUnderflow("state"))));
}

#[test]
fn test_bundle_swaps_clears_and_composites_once() {
    let (mut painter, backend) = setup();
    let mut rt = persistent(&mut painter, 64.0, 32.0);
    let first = rt.texture().id;
    let renders = Rc::new(Cell::new(0));
    let mut probes: Vec<Probe> = (0..3)
        .map(|i| Probe::new(Rect::new(i as f32 * 10.0, 0.0, 5.0, 5.0), 0xFF0000, &renders))
        .collect();
    backend.reset_stats();

    rt.draw_bundled(&mut painter, 0, |session| {
        for probe in probes.iter_mut() {
            session.draw(probe, None, 1.0)?;
        }
        Ok(())
    })
    .unwrap();

    let stats = backend.stats();
    assert_eq!(renders.get(), 3);
    assert_eq!(stats.render_target_binds, 1);
    assert_eq!(stats.clears, 1);
    // Nothing to composite yet; the three probes share one batch.
    assert_eq!(stats.draw_calls, 1);
    assert_ne!(rt.texture().id, first);
    assert!(rt.is_buffer_ready());
    assert!(!rt.is_drawing());

    backend.reset_stats();
    rt.draw_bundled(&mut painter, 0, |session| {
        for probe in probes.iter_mut() {
            session.draw(probe, None, 1.0)?;
        }
        Ok(())
    })
    .unwrap();

    let stats = backend.stats();
    assert_eq!(renders.get(), 6);
    assert_eq!(stats.render_target_binds, 1);
    assert_eq!(stats.clears, 1);
    // Composite of the previous frame, then the probes.
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(rt.texture().id, first);
    assert_painter_idle(&mut painter);
}

#[test]
fn test_persistent_texture_accumulates() {
    let (mut painter, backend) = setup();
    let mut rt = persistent(&mut painter, 32.0, 16.0);
    let renders = Rc::new(Cell::new(0));
    let mut a = Probe::new(Rect::new(0.0, 0.0, 10.0, 10.0), 0xFF0000, &renders);
    let mut b = Probe::new(Rect::new(20.0, 0.0, 10.0, 10.0), 0x0000FF, &renders);

    rt.draw(&mut painter, &mut a, None, 1.0, 0).unwrap();
    rt.draw(&mut painter, &mut b, None, 1.0, 0).unwrap();

    let content = pixels(&backend, &rt);
    assert_eq!(content.pixel(5, 5), Some(RED));
    assert_eq!(content.pixel(25, 5), Some(BLUE));
    assert_eq!(content.covered_pixels(), 200);
}

#[test]
fn test_non_persistent_texture_keeps_only_last_draw() {
    let (mut painter, backend) = setup();
    let config = RenderTextureConfig {
        persistent: false,
        ..RenderTextureConfig::default()
    };
    let mut rt = RenderTexture::new(&mut painter, 32.0, 16.0, config).unwrap();
    let id = rt.texture().id;
    let renders = Rc::new(Cell::new(0));
    let mut a = Probe::new(Rect::new(0.0, 0.0, 10.0, 10.0), 0xFF0000, &renders);
    let mut b = Probe::new(Rect::new(20.0, 0.0, 10.0, 10.0), 0x0000FF, &renders);

    rt.draw(&mut painter, &mut a, None, 1.0, 0).unwrap();
    rt.draw(&mut painter, &mut b, None, 1.0, 0).unwrap();

    assert_eq!(rt.texture().id, id);
    let content = pixels(&backend, &rt);
    assert_eq!(content.pixel(5, 5), Some(CLEAR));
    assert_eq!(content.pixel(25, 5), Some(BLUE));
}

#[test]
fn test_explicit_matrix_replaces_object_transform() {
    let (mut painter, backend) = setup();
    let mut rt = persistent(&mut painter, 32.0, 32.0);
    let renders = Rc::new(Cell::new(0));
    let mut probe = Probe::new(Rect::new(0.0, 0.0, 4.0, 4.0), 0xFF0000, &renders);
    probe.transform = Transform2D::at(20.0, 0.0);

    rt.draw(&mut painter, &mut probe, Some(&Matrix::new(1.0, 0.0, 0.0, 1.0, 10.0, 10.0)), 1.0, 0)
        .unwrap();
    let content = pixels(&backend, &rt);
    assert_eq!(content.pixel(11, 11), Some(RED));
    assert_eq!(content.pixel(21, 1), Some(CLEAR));

    rt.clear(&mut painter, 0, 0.0).unwrap();
    rt.draw(&mut painter, &mut probe, None, 1.0, 0).unwrap();
    let content = pixels(&backend, &rt);
    assert_eq!(content.pixel(21, 1), Some(RED));
    assert_eq!(content.pixel(11, 11), Some(CLEAR));
}

#[test]
fn test_alpha_is_passed_to_render() {
    let (mut painter, backend) = setup();
    let mut rt = persistent(&mut painter, 8.0, 8.0);
    let renders = Rc::new(Cell::new(0));
    let mut probe = Probe::new(Rect::new(0.0, 0.0, 8.0, 8.0), 0xFFFFFF, &renders);
    rt.draw(&mut painter, &mut probe, None, 0.5, 0).unwrap();
    let [r, _, _, a] = pixels(&backend, &rt).pixel(0, 0).unwrap();
    assert!((127..=128).contains(&a));
    assert_eq!(r, a);
}

#[test]
fn test_missing_context_is_an_error() {
    let (mut painter, backend) = setup();
    let mut rt = persistent(&mut painter, 16.0, 16.0);
    let renders = Rc::new(Cell::new(0));
    let mut probe = Probe::new(Rect::new(0.0, 0.0, 4.0, 4.0), 0xFF0000, &renders);
    backend.set_available(false);

    let result = rt.draw(&mut painter, &mut probe, None, 1.0, 0);
    assert!(matches!(result, Err(RenderError::MissingContext)));
    assert_eq!(renders.get(), 0);
    assert!(!rt.is_buffer_ready());

    let result = rt.clear(&mut painter, 0xFF0000, 1.0);
    assert!(matches!(result, Err(RenderError::MissingContext)));
    let result = rt.restore(&mut painter);
    assert!(matches!(result, Err(RenderError::MissingContext)));
}

#[test]
fn test_lost_context_is_a_silent_no_op() {
    let (mut painter, backend) = setup();
    let mut rt = persistent(&mut painter, 16.0, 16.0);
    let id = rt.texture().id;
    let renders = Rc::new(Cell::new(0));
    let mut probe = Probe::new(Rect::new(0.0, 0.0, 4.0, 4.0), 0xFF0000, &renders);
    backend.lose_context();
    backend.reset_stats();

    rt.draw(&mut painter, &mut probe, None, 1.0, 0).unwrap();
    rt.draw_bundled(&mut painter, 0, |_| panic!("block must not run")).unwrap();
    rt.clear(&mut painter, 0xFFFFFF, 1.0).unwrap();

    assert_eq!(renders.get(), 0);
    assert_eq!(backend.stats(), Default::default());
    assert_eq!(rt.texture().id, id);
}

#[test]
fn test_power_of_two_workaround() {
    let backend = SoftwareBackend::new(SoftwareBackendConfig {
        non_power_of_two: false,
        ..SoftwareBackendConfig::default()
    });
    let mut painter = Painter::new(Box::new(backend.clone()));
    let mut rt = persistent(&mut painter, 100.0, 50.0);

    assert_eq!(rt.width(), 100.0);
    assert_eq!(rt.height(), 50.0);
    assert_eq!(rt.texture().width, 128.0);
    assert_eq!(rt.texture().height, 64.0);

    // Drawing is clipped to the requested size, not the texture size.
    let renders = Rc::new(Cell::new(0));
    let mut probe = Probe::new(Rect::new(0.0, 0.0, 200.0, 200.0), 0xFF0000, &renders);
    rt.draw(&mut painter, &mut probe, None, 1.0, 0).unwrap();
    let content = pixels(&backend, &rt);
    assert_eq!((content.width(), content.height()), (128, 64));
    assert_eq!(content.covered_pixels(), 5000);
}

#[test]
fn test_error_in_block_still_finalizes() {
    let (mut painter, backend) = setup();
    let mut rt = persistent(&mut painter, 16.0, 16.0);
    let renders = Rc::new(Cell::new(0));
    let mut probe = Probe::new(Rect::new(0.0, 0.0, 4.0, 4.0), 0xFF0000, &renders);
    let frame = painter.frame_id();

    let result = rt.draw_bundled(&mut painter, 0, |session| {
        session.draw(&mut probe, None, 1.0)?;
        Err(RenderError::Backend("client failure".into()))
    });

    assert!(matches!(result, Err(RenderError::Backend(_))));
    assert!(!rt.is_drawing());
    assert_eq!(painter.frame_id(), frame + 1);
    // Draws issued before the failure are kept.
    assert_eq!(pixels(&backend, &rt).covered_pixels(), 16);
    assert_painter_idle(&mut painter);

    rt.draw(&mut painter, &mut probe, None, 1.0, 0).unwrap();
    assert_eq!(renders.get(), 2);
}

#[test]
fn test_panic_in_block_still_finalizes() {
    let (mut painter, _backend) = setup();
    let mut rt = persistent(&mut painter, 16.0, 16.0);

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        rt.draw_bundled(&mut painter, 0, |_| panic!("client panic"))
    }));

    assert!(outcome.is_err());
    assert!(!rt.is_drawing());
    assert_painter_idle(&mut painter);
}

#[test]
fn test_nested_target_is_restored() {
    let (mut painter, backend) = setup();
    let outer = painter.create_texture(&TextureDescriptor::new(32.0, 32.0, 1.0)).unwrap();
    painter.set_render_target(Some(&outer), 0).unwrap();
    painter.set_projection(32.0, 32.0).unwrap();

    let mut rt = persistent(&mut painter, 16.0, 16.0);
    let renders = Rc::new(Cell::new(0));
    let mut probe = Probe::new(Rect::new(0.0, 0.0, 4.0, 4.0), 0xFF0000, &renders);
    rt.draw(&mut painter, &mut probe, None, 1.0, 0).unwrap();

    assert_eq!(painter.render_target(), Some(outer.id));
    assert_eq!(painter.projection(), [32.0, 32.0]);
    assert_eq!(backend.pixels(outer.id).unwrap().covered_pixels(), 0);
}

#[test]
fn test_clear_leaves_buffer_alone() {
    let (mut painter, backend) = setup();
    let mut rt = persistent(&mut painter, 32.0, 16.0);
    let renders = Rc::new(Cell::new(0));
    let mut a = Probe::new(Rect::new(0.0, 0.0, 10.0, 10.0), 0xFF0000, &renders);
    rt.draw(&mut painter, &mut a, None, 1.0, 0).unwrap();
    rt.draw(&mut painter, &mut a, None, 1.0, 0).unwrap();
    // Both textures now hold the red square.
    let other = rt.texture().id;

    rt.clear(&mut painter, 0x00FF00, 1.0).unwrap();
    assert_eq!(pixels(&backend, &rt).pixel(25, 5), Some([0, 255, 0, 255]));
    assert!(rt.is_buffer_ready());

    let mut b = Probe::new(Rect::new(20.0, 0.0, 10.0, 10.0), 0x0000FF, &renders);
    rt.draw(&mut painter, &mut b, None, 1.0, 0).unwrap();
    assert_ne!(rt.texture().id, other);
    // The composite came from the cleared texture.
    let content = pixels(&backend, &rt);
    assert_eq!(content.pixel(5, 5), Some([0, 255, 0, 255]));
    assert_eq!(content.pixel(25, 5), Some(BLUE));
}

#[test]
fn test_restore_clears_both_textures() {
    let (mut painter, backend) = setup();
    let mut rt = persistent(&mut painter, 16.0, 16.0);
    let renders = Rc::new(Cell::new(0));
    let mut probe = Probe::new(Rect::new(0.0, 0.0, 4.0, 4.0), 0xFF0000, &renders);
    rt.draw(&mut painter, &mut probe, None, 1.0, 0).unwrap();
    rt.draw(&mut painter, &mut probe, None, 1.0, 0).unwrap();

    backend.lose_context();
    assert!(rt.restore(&mut painter).is_ok());
    backend.restore_context();
    backend.reset_stats();

    rt.restore(&mut painter).unwrap();
    assert_eq!(backend.stats().clears, 2);
    assert_eq!(pixels(&backend, &rt).covered_pixels(), 0);
    assert_eq!(painter.render_target(), None);
}

#[test]
fn test_dispose_releases_both_textures_once() {
    let (mut painter, backend) = setup();
    let mut rt = persistent(&mut painter, 16.0, 16.0);
    backend.reset_stats();
    rt.dispose(&mut painter);
    rt.dispose(&mut painter);
    assert_eq!(backend.stats().textures_disposed, 2);
    assert_eq!(backend.texture_count(), 0);

    let renders = Rc::new(Cell::new(0));
    let mut probe = Probe::new(Rect::new(0.0, 0.0, 4.0, 4.0), 0xFF0000, &renders);
    assert!(matches!(
        rt.draw(&mut painter, &mut probe, None, 1.0, 0),
        Err(RenderError::UnknownTexture(_))
    ));
}

#[test]
fn test_non_persistent_dispose_releases_one_texture() {
    let (mut painter, backend) = setup();
    let config = RenderTextureConfig {
        persistent: false,
        ..RenderTextureConfig::default()
    };
    let mut rt = RenderTexture::new(&mut painter, 16.0, 16.0, config).unwrap();
    assert!(!rt.is_persistent());
    rt.dispose(&mut painter);
    assert_eq!(backend.stats().textures_disposed, 1);
}

#[test]
fn test_text_field_into_persistent_texture() {
    let (mut painter, backend) = setup();
    let font_texture = painter.create_texture(&TextureDescriptor::new(100.0, 30.0, 1.0)).unwrap();
    let mut glyphs = Pixmap::new(100, 30);
    glyphs.fill(0xFFFFFF, 1.0);
    painter.upload_pixels(&font_texture, &glyphs).unwrap();

    let context = TextContext::new(Box::new(CosmicRasterizer::new()), TextConfig::default()).shared();
    let font = BitmapFont::from_grid("grid", font_texture, 10.0, 10.0, "abcdefghijklmnopqrstuvwxyz ");
    context.borrow_mut().fonts.register(font, None);

    let format = TextFormat {
        font_name: "grid".into(),
        font_size: 10.0,
        color: 0xFFFFFF,
        ..TextFormat::default()
    };
    let mut field = TextField::with_format(context, 64.0, 32.0, "ab", &format);
    let mut rt = persistent(&mut painter, 64.0, 32.0);

    rt.draw(&mut painter, &mut field, None, 1.0, 0).unwrap();
    assert_eq!(pixels(&backend, &rt).covered_pixels(), 200);

    // Same glyphs again on top of the composited frame.
    rt.draw(&mut painter, &mut field, None, 1.0, 0).unwrap();
    assert_eq!(pixels(&backend, &rt).covered_pixels(), 200);
}

/// Fills the whole text box; every glyph is half the font size wide.
struct BlockRasterizer;

impl TextRasterizer for BlockRasterizer {
    fn measure(&mut self, request: &RasterRequest<'_>) -> TextMetrics {
        TextMetrics {
            width: request.text.chars().count() as f32 * request.font.size / 2.0,
            height: request.font.size,
        }
    }

    fn draw(&mut self, request: &RasterRequest<'_>, _origin: (f32, f32), target: &mut Pixmap) {
        target.fill(request.font.color, 1.0);
    }
}

#[test]
fn test_text_change_inside_bundle_keeps_earlier_draw() {
    let (mut painter, backend) = setup();
    let context = TextContext::new(Box::new(BlockRasterizer), TextConfig::default()).shared();
    let format = TextFormat {
        font_name: "Block".into(),
        font_size: 10.0,
        color: 0xFFFFFF,
        ..TextFormat::default()
    };
    let mut field = TextField::with_format(context, 20.0, 10.0, "abcd", &format);
    let mut rt = persistent(&mut painter, 64.0, 64.0);

    rt.draw_bundled(&mut painter, 0, |session| {
        session.draw(&mut field, None, 1.0)?;
        // Regenerating disposes the texture the first draw sampled.
        field.set_text("wxyz");
        field.transform = Transform2D::at(0.0, 30.0);
        session.draw(&mut field, None, 1.0)
    })
    .unwrap();

    let content = pixels(&backend, &rt);
    assert_eq!(content.pixel(5, 5), Some([255, 255, 255, 255]));
    assert_eq!(content.pixel(5, 35), Some([255, 255, 255, 255]));
    assert_eq!(content.covered_pixels(), 400);
    assert_painter_idle(&mut painter);
}

#[test]
fn test_image_follows_swapped_texture() {
    let (mut painter, backend) = setup();
    let mut rt = persistent(&mut painter, 16.0, 16.0);
    let renders = Rc::new(Cell::new(0));
    let mut probe = Probe::new(Rect::new(0.0, 0.0, 4.0, 4.0), 0xFF0000, &renders);

    for _ in 0..3 {
        rt.draw(&mut painter, &mut probe, None, 1.0, 0).unwrap();
        assert_eq!(rt.image().texture().id, rt.texture().id);
    }

    let target = painter.create_texture(&TextureDescriptor::new(16.0, 16.0, 1.0)).unwrap();
    painter.set_projection(16.0, 16.0).unwrap();
    painter.set_render_target(Some(&target), 0).unwrap();
    rt.image_mut().render(&mut painter, 1.0).unwrap();
    painter.set_render_target(None, 0).unwrap();

    let shown = backend.pixels(target.id).unwrap();
    assert_eq!(shown.pixel(1, 1), Some(RED));
    assert_eq!(shown.covered_pixels(), 16);
}

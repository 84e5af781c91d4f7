//! Glint demo: draws a text field into a persistent render texture on the
//! GPU (software fallback) and reports what landed in it.
//!
//! Usage: `glint-demo [config.json]`

use std::error::Error;
use std::fs;

use glint_core::{Painter, Pixmap, SoftwareBackend, TextureDescriptor, Transform2D};
use glint_render::{RenderTexture, RenderTextureConfig, WgpuBackend, WgpuBackendConfig};
use glint_text::{BitmapFont, HAlign, TextContext, TextField, TextFormat, VAlign};
use log::{info, warn};
use serde::Deserialize;

const GRID_CHARS: &str = " abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DemoConfig {
    width: f32,
    height: f32,
    text: String,
    /// `"grid"` uses the built-in block font; anything else goes through
    /// the text engine.
    font_name: String,
    font_size: f32,
    color: u32,
    /// Force the software backend.
    software: bool,
    passes: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            width: 256.0,
            height: 64.0,
            text: "hello glint".to_string(),
            font_name: "grid".to_string(),
            font_size: 12.0,
            color: 0xFFFFFF,
            software: false,
            passes: 2,
        }
    }
}

fn load_config() -> Result<DemoConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = fs::read_to_string(&path)?;
            info!("Loaded config from {path}");
            Ok(serde_json::from_str(&json)?)
        }
        None => Ok(DemoConfig::default()),
    }
}

fn create_painter(config: &DemoConfig) -> Painter {
    if !config.software {
        match WgpuBackend::headless(WgpuBackendConfig::default()) {
            Ok(backend) => {
                info!("Using wgpu backend");
                return Painter::new(Box::new(backend));
            }
            Err(e) => warn!("GPU unavailable ({e}), falling back to software"),
        }
    }
    Painter::new(Box::new(SoftwareBackend::default()))
}

/// Solid cells: every glyph renders as a filled block.
fn grid_font(painter: &mut Painter, cell: f32) -> Result<BitmapFont, Box<dyn Error>> {
    let columns = 8u32;
    let rows = (GRID_CHARS.len() as u32).div_ceil(columns);
    let side = cell as u32;
    let mut pixels = Pixmap::new(columns * side, rows * side);
    pixels.fill(0xFFFFFF, 1.0);
    let desc = TextureDescriptor::new(pixels.width() as f32, pixels.height() as f32, 1.0).with_label("grid_font");
    let texture = painter.texture_from_pixmap(&pixels, &desc)?;
    Ok(BitmapFont::from_grid("grid", texture, cell, cell, GRID_CHARS))
}

fn run(config: DemoConfig) -> Result<(), Box<dyn Error>> {
    let mut painter = create_painter(&config);
    let context = TextContext::with_cosmic().shared();
    if config.font_name == "grid" {
        let font = grid_font(&mut painter, config.font_size)?;
        context.borrow_mut().fonts.register(font, None);
    }

    let format = TextFormat {
        font_name: config.font_name.clone(),
        font_size: config.font_size,
        color: config.color,
        h_align: HAlign::Left,
        v_align: VAlign::Top,
        ..TextFormat::default()
    };
    let mut field = TextField::with_format(context, config.width, config.height / 2.0, config.text.as_str(), &format);
    let mut rt = RenderTexture::new(&mut painter, config.width, config.height, RenderTextureConfig::default())?;

    for pass in 0..config.passes {
        field.transform = Transform2D::at(0.0, (pass % 2) as f32 * config.height / 2.0);
        rt.draw(&mut painter, &mut field, None, 1.0, 4)?;
        let texture = rt.texture().clone();
        let content = painter.read_pixels(Some(&texture))?;
        info!(
            "Pass {}: {} covered pixels in {}×{} texture",
            pass + 1,
            content.covered_pixels(),
            content.width(),
            content.height()
        );
    }

    rt.dispose(&mut painter);
    field.dispose(&mut painter);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Glint demo...");
    let result = load_config().and_then(run);
    if let Err(e) = result {
        log::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

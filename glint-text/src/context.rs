//! Text state shared by every text field of one render context.

use std::cell::RefCell;
use std::rc::Rc;

use glint_core::TextureFormat;
use serde::{Deserialize, Serialize};

use crate::rasterizer::{CosmicRasterizer, TextRasterizer};
use crate::registry::BitmapFontRegistry;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub default_font_name: String,
    pub default_font_size: f32,
    /// Format of textures holding rasterized text.
    pub texture_format: TextureFormat,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            default_font_name: "Verdana".to_string(),
            default_font_size: 12.0,
            texture_format: TextureFormat::Rgba8,
        }
    }
}

/// Bitmap fonts plus the engine for rasterized text.
pub struct TextContext {
    pub fonts: BitmapFontRegistry,
    pub rasterizer: Box<dyn TextRasterizer>,
    pub config: TextConfig,
}

/// Single-threaded shared handle held by each text field.
pub type SharedTextContext = Rc<RefCell<TextContext>>;

impl TextContext {
    pub fn new(rasterizer: Box<dyn TextRasterizer>, config: TextConfig) -> Self {
        Self {
            fonts: BitmapFontRegistry::new(),
            rasterizer,
            config,
        }
    }

    /// cosmic-text engine with default configuration.
    pub fn with_cosmic() -> Self {
        Self::new(Box::new(CosmicRasterizer::new()), TextConfig::default())
    }

    pub fn shared(self) -> SharedTextContext {
        Rc::new(RefCell::new(self))
    }
}

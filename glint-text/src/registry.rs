//! Registered bitmap fonts, keyed case-insensitively by name.
//!
//! The registry belongs to one render context. After a context loss its
//! font textures are gone; callers `clear` it and register the fonts again.

use std::collections::HashMap;

use glint_core::Painter;
use log::debug;

use crate::bitmap_font::BitmapFont;

#[derive(Debug, Default)]
pub struct BitmapFontRegistry {
    fonts: HashMap<String, BitmapFont>,
}

impl BitmapFontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `font` under `name`, or under its own name when `None`.
    /// Returns that name as given; lookups ignore case. Replaces any
    /// previous entry.
    pub fn register(&mut self, font: BitmapFont, name: Option<&str>) -> String {
        let name = name.unwrap_or(font.name()).to_string();
        let key = name.to_lowercase();
        debug!("Registering bitmap font '{name}'");
        if self.fonts.insert(key, font).is_some() {
            debug!("Bitmap font '{name}' replaced");
        }
        name
    }

    /// Remove a font; with `dispose` its texture is released.
    pub fn unregister(&mut self, name: &str, painter: &mut Painter, dispose: bool) -> Option<BitmapFont> {
        let key = name.to_lowercase();
        let mut font = self.fonts.remove(&key)?;
        if dispose {
            font.dispose(painter);
        }
        debug!("Unregistered bitmap font '{key}' (disposed: {dispose})");
        Some(font)
    }

    pub fn lookup(&self, name: &str) -> Option<&BitmapFont> {
        self.fonts.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fonts.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Forget every font without touching textures (they died with the
    /// context).
    pub fn clear(&mut self) {
        self.fonts.clear();
    }
}

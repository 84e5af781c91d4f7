//! # glint-text
//!
//! Text fields for Glint: rasterized text through a native text engine, or
//! bitmap-font glyphs composed into quad batches.
//!
//! ## Architecture
//!
//! ```text
//!  TextField (setters mark Dirty)
//!       │  redraw()
//!       ├──────────────────────────────┐
//!       ▼                              ▼
//!  TextRasterizer (cosmic-text)   BitmapFontRegistry → BitmapFont
//!       │  Pixmap                      │  QuadBatch
//!       ▼                              ▼
//!  Image + texture                glyph quads on the font texture
//! ```
//!
//! ## Crate modules
//!
//! - [`layout`]: alignment enums, box arithmetic, auto-scale
//! - [`filter`]: native filters and their layout offset
//! - [`rasterizer`]: the text engine contract and cosmic-text engine
//! - [`bitmap_font`]: bitmap glyph layout
//! - [`registry`]: registered bitmap fonts
//! - [`context`]: per-render-context text state
//! - [`text_field`]: the text field display object

pub mod error;
pub mod layout;
pub mod filter;
pub mod rasterizer;
pub mod bitmap_font;
pub mod registry;
pub mod context;
pub mod text_field;

// Re-exports for convenience
pub use bitmap_font::{BitmapChar, BitmapFont, MAX_GLYPHS};
pub use context::{SharedTextContext, TextConfig, TextContext};
pub use error::TextError;
pub use filter::Filter;
pub use layout::{AutoSize, HAlign, TextMetrics, VAlign};
pub use rasterizer::{CosmicRasterizer, FontSpec, RasterRequest, TextRasterizer};
pub use registry::BitmapFontRegistry;
pub use text_field::{Border, ContentState, TextField, TextFormat, VisualChild};

//! # glint-core
//!
//! Rendering primitives shared by the Glint crates.
//!
//! ## Architecture
//!
//! ```text
//!  DisplayObject::render(painter)        ◀─── Image, QuadBatch, TextField, …
//!       │
//!       ▼
//!  Painter                               ◀─── matrices, state/clip stacks,
//!       │                                     pending quad batch
//!       ▼
//!  dyn RenderBackend                     ◀─── SoftwareBackend (CPU)
//!                                             WgpuBackend (glint-render)
//! ```
//!
//! ## Crate modules
//!
//! - [`geom`]: points, rectangles, affine matrices
//! - [`color`]: packed RGB helpers
//! - [`texture`]: texture handles and descriptors
//! - [`pixmap`]: CPU pixel buffers
//! - [`quad`]: quads and quad batches
//! - [`display`]: the display-object contract, blend modes, transforms
//! - [`backend`]: the GPU abstraction and `RenderError`
//! - [`painter`]: render state and batching
//! - [`image`]: single-texture display object
//! - [`software`]: CPU reference backend

pub mod geom;
pub mod color;
pub mod texture;
pub mod pixmap;
pub mod quad;
pub mod display;
pub mod backend;
pub mod painter;
pub mod image;
pub mod software;

// Re-exports for convenience
pub use backend::{BackendCaps, DrawCall, PreparedQuad, RenderBackend, RenderError};
pub use display::{BlendMode, DisplayObject, Transform2D};
pub use geom::{Matrix, Point, Rect};
pub use image::Image;
pub use painter::{Painter, PainterConfig, RenderState};
pub use pixmap::Pixmap;
pub use quad::{BatchId, Quad, QuadBatch, Smoothing};
pub use software::{BackendStats, SoftwareBackend, SoftwareBackendConfig};
pub use texture::{Texture, TextureDescriptor, TextureFormat, TextureId};

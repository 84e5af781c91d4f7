//! # glint-render
//!
//! Offscreen rendering for Glint: persistent render textures and a GPU
//! backend built on `wgpu`.
//!
//! ## Architecture
//!
//! ```text
//!  RenderTexture.draw_bundled(painter, aa, |session| …)
//!       │
//!       ▼
//!  DrawSession.draw(object)          ◀─── object.render(painter)
//!       │
//!       ▼
//!  Painter (glint-core)              ◀─── batching, state, clip stacks
//!       │
//!       ▼
//!  WgpuBackend.draw_quads()          ◀─── one instanced draw per call
//! ```
//!
//! ## Crate modules
//!
//! - [`render_texture`]: double-buffered render-to-texture
//! - [`context`]: headless GPU device/queue initialisation
//! - [`vertex`]: vertex, instance, and camera data types
//! - [`pipelines`]: wgpu render pipelines
//! - [`backend`]: `RenderBackend` implementation on wgpu

pub mod render_texture;
pub mod context;
pub mod vertex;
pub mod pipelines;
pub mod backend;

// Re-exports for convenience
pub use backend::{WgpuBackend, WgpuBackendConfig};
pub use context::{GpuContext, GpuError};
pub use render_texture::{DrawSession, RenderTexture, RenderTextureConfig};
pub use vertex::{CameraUniform, QuadInstance, QuadVertex};

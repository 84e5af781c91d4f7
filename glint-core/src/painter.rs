//! The painter: render state, state stacks and quad batching on top of a
//! [`RenderBackend`].
//!
//! ## Batching
//!
//! ```text
//! QuadBatch::render ──► Painter::batch_quads ──► pending (PreparedQuad[])
//!                                                    │  state change, capacity,
//!                                                    ▼  target switch, clear
//!                                     Painter::finish_quad_batch ──► backend.draw_quads
//! ```
//!
//! Quads are transformed by the current model-view matrix when they are
//! batched, so the pending batch is always in render-target space.

use log::{debug, trace, warn};

use crate::backend::{BackendCaps, DrawCall, PreparedQuad, RenderBackend, RenderError};
use crate::color;
use crate::display::{BlendMode, DisplayObject};
use crate::geom::{Matrix, Rect};
use crate::pixmap::Pixmap;
use crate::quad::{BatchId, Quad, Smoothing};
use crate::texture::{Texture, TextureDescriptor, TextureId};

/// Painter tuning.
#[derive(Clone, Debug)]
pub struct PainterConfig {
    /// Quads per draw call before the pending batch is flushed.
    pub max_quads_per_batch: usize,
    /// Projection size (points) used while rendering to the default target.
    pub initial_projection: [f32; 2],
}

impl Default for PainterConfig {
    fn default() -> Self {
        Self {
            max_quads_per_batch: 8192,
            initial_projection: [800.0, 600.0],
        }
    }
}

/// Everything `push_state` / `pop_state` saves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderState {
    pub model_view: Matrix,
    /// Never `Auto`.
    pub blend_mode: BlendMode,
    pub render_target: Option<TextureId>,
    pub anti_alias: u32,
    pub projection: [f32; 2],
}

#[derive(Default)]
struct PendingBatch {
    quads: Vec<PreparedQuad>,
    texture: Option<TextureId>,
    smoothing: Smoothing,
    blend_mode: BlendMode,
}

pub struct Painter {
    backend: Box<dyn RenderBackend>,
    config: PainterConfig,
    state: RenderState,
    matrix_stack: Vec<Matrix>,
    state_stack: Vec<RenderState>,
    clip_stack: Vec<Rect>,
    pending: PendingBatch,
    frame_id: u64,
    draw_count: u32,
}

impl Painter {
    pub fn new(backend: Box<dyn RenderBackend>) -> Self {
        Self::with_config(backend, PainterConfig::default())
    }

    pub fn with_config(backend: Box<dyn RenderBackend>, config: PainterConfig) -> Self {
        let state = RenderState {
            model_view: Matrix::IDENTITY,
            blend_mode: BlendMode::Normal,
            render_target: None,
            anti_alias: 0,
            projection: config.initial_projection,
        };
        Self {
            backend,
            config,
            state,
            matrix_stack: Vec::new(),
            state_stack: Vec::new(),
            clip_stack: Vec::new(),
            pending: PendingBatch::default(),
            frame_id: 0,
            draw_count: 0,
        }
    }

    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn RenderBackend {
        self.backend.as_mut()
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    // ---------------------------------------------------------------
    // Context
    // ---------------------------------------------------------------

    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    pub fn is_context_valid(&self) -> bool {
        self.backend.is_context_valid()
    }

    pub fn capabilities(&self) -> BackendCaps {
        self.backend.capabilities()
    }

    pub fn content_scale_factor(&self) -> f32 {
        self.backend.content_scale_factor()
    }

    fn ensure_context(&self) -> Result<(), RenderError> {
        if self.backend.is_available() {
            Ok(())
        } else {
            Err(RenderError::MissingContext)
        }
    }

    // ---------------------------------------------------------------
    // Resources
    // ---------------------------------------------------------------

    pub fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<Texture, RenderError> {
        self.ensure_context()?;
        let (w, h) = desc.native_size();
        let max = self.backend.capabilities().max_texture_size;
        if w > max || h > max {
            return Err(RenderError::TextureSize { width: w, height: h });
        }
        let id = self.backend.create_texture(desc)?;
        debug!("Created texture {id} ({w}×{h}px, {:?})", desc.label);
        Ok(Texture::from_descriptor(id, desc))
    }

    pub fn upload_pixels(&mut self, texture: &Texture, pixels: &Pixmap) -> Result<(), RenderError> {
        self.ensure_context()?;
        if self.pending.texture == Some(texture.id) {
            self.finish_quad_batch()?;
        }
        self.backend.upload_pixels(texture.id, pixels)
    }

    /// Create a texture sized to `pixels` and upload them.
    pub fn texture_from_pixmap(&mut self, pixels: &Pixmap, desc: &TextureDescriptor) -> Result<Texture, RenderError> {
        let texture = self.create_texture(desc)?;
        self.upload_pixels(&texture, pixels)?;
        Ok(texture)
    }

    /// Pending quads that sample `texture` are drawn before it goes away.
    pub fn dispose_texture(&mut self, texture: &Texture) {
        if self.pending.texture == Some(texture.id) {
            if let Err(e) = self.finish_quad_batch() {
                warn!("Flushing quads before disposing texture {} failed: {e}", texture.id);
            }
        }
        self.backend.dispose_texture(texture.id);
        debug!("Disposed texture {}", texture.id);
    }

    pub fn release_quad_batch(&mut self, id: BatchId) {
        self.backend.release_buffers(id);
    }

    /// Read back a texture, or the default target for `None`. Pending quads
    /// are drawn first.
    pub fn read_pixels(&mut self, texture: Option<&Texture>) -> Result<Pixmap, RenderError> {
        self.ensure_context()?;
        self.finish_quad_batch()?;
        self.backend.read_pixels(texture.map(|t| t.id))
    }

    // ---------------------------------------------------------------
    // Matrices and blend mode
    // ---------------------------------------------------------------

    pub fn model_view(&self) -> Matrix {
        self.state.model_view
    }

    pub fn load_identity(&mut self) {
        self.state.model_view = Matrix::IDENTITY;
    }

    pub fn prepend_matrix(&mut self, matrix: &Matrix) {
        self.state.model_view = self.state.model_view.prepend(matrix);
    }

    /// Prepend the object's own transformation matrix.
    pub fn transform_matrix(&mut self, object: &dyn DisplayObject) {
        self.prepend_matrix(&object.transformation_matrix());
    }

    pub fn push_matrix(&mut self) {
        self.matrix_stack.push(self.state.model_view);
    }

    pub fn pop_matrix(&mut self) -> Result<(), RenderError> {
        self.state.model_view = self
            .matrix_stack
            .pop()
            .ok_or(RenderError::StackUnderflow("matrix"))?;
        Ok(())
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.state.blend_mode
    }

    /// `Auto` keeps the current mode.
    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        if mode != BlendMode::Auto {
            self.state.blend_mode = mode;
        }
    }

    pub(crate) fn restore_blend_mode(&mut self, mode: BlendMode) {
        self.state.blend_mode = mode;
    }

    // ---------------------------------------------------------------
    // State stack, projection, clipping
    // ---------------------------------------------------------------

    pub fn push_state(&mut self) {
        self.state_stack.push(self.state);
    }

    pub fn pop_state(&mut self) -> Result<(), RenderError> {
        let previous = self
            .state_stack
            .pop()
            .ok_or(RenderError::StackUnderflow("state"))?;
        if previous.render_target != self.state.render_target {
            self.finish_quad_batch()?;
            self.backend.set_render_target(previous.render_target, previous.anti_alias)?;
        } else if previous.projection != self.state.projection {
            self.finish_quad_batch()?;
        }
        self.state = previous;
        Ok(())
    }

    pub fn projection(&self) -> [f32; 2] {
        self.state.projection
    }

    pub fn set_projection(&mut self, width: f32, height: f32) -> Result<(), RenderError> {
        if self.state.projection != [width, height] {
            self.finish_quad_batch()?;
            self.state.projection = [width, height];
        }
        Ok(())
    }

    /// Push a clip rectangle (projection space), intersected with the
    /// enclosing one. Returns the effective clip.
    pub fn push_clip_rect(&mut self, rect: Rect) -> Result<Rect, RenderError> {
        self.finish_quad_batch()?;
        let effective = match self.clip_stack.last() {
            Some(top) => top.intersection(&rect),
            None => rect,
        };
        self.clip_stack.push(effective);
        Ok(effective)
    }

    pub fn pop_clip_rect(&mut self) -> Result<(), RenderError> {
        self.finish_quad_batch()?;
        self.clip_stack
            .pop()
            .map(|_| ())
            .ok_or(RenderError::StackUnderflow("clip rect"))
    }

    pub fn clip_rect(&self) -> Option<Rect> {
        self.clip_stack.last().copied()
    }

    // ---------------------------------------------------------------
    // Render target
    // ---------------------------------------------------------------

    pub fn render_target(&self) -> Option<TextureId> {
        self.state.render_target
    }

    pub fn set_render_target(&mut self, target: Option<&Texture>, anti_alias: u32) -> Result<(), RenderError> {
        self.finish_quad_batch()?;
        let id = target.map(|t| t.id);
        self.backend.set_render_target(id, anti_alias)?;
        self.state.render_target = id;
        self.state.anti_alias = anti_alias;
        Ok(())
    }

    /// Clear the current render target to `rgb` at `alpha`.
    pub fn clear(&mut self, rgb: u32, alpha: f32) -> Result<(), RenderError> {
        self.ensure_context()?;
        self.finish_quad_batch()?;
        self.backend.clear(rgb, alpha)
    }

    // ---------------------------------------------------------------
    // Drawing
    // ---------------------------------------------------------------

    fn prepare(&self, quad: &Quad, alpha: f32) -> PreparedQuad {
        let mv = &self.state.model_view;
        let origin = mv.transform_point(crate::geom::Point::new(quad.x, quad.y));
        let [r, g, b, a] = quad.color;
        PreparedQuad {
            origin: [origin.x, origin.y],
            axis_x: [mv.a * quad.width, mv.b * quad.width],
            axis_y: [mv.c * quad.height, mv.d * quad.height],
            uv_min: [quad.uv[0], quad.uv[1]],
            uv_max: [quad.uv[2], quad.uv[3]],
            color: color::premultiply([r, g, b, a * alpha]),
        }
    }

    /// Add quads to the pending batch, flushing first when the state differs
    /// or the batch would overflow.
    pub fn batch_quads(
        &mut self,
        quads: &[Quad],
        texture: Option<TextureId>,
        smoothing: Smoothing,
        alpha: f32,
    ) -> Result<(), RenderError> {
        let incompatible = self.pending.texture != texture
            || self.pending.smoothing != smoothing
            || self.pending.blend_mode != self.state.blend_mode;
        let overflow = self.pending.quads.len() + quads.len() > self.config.max_quads_per_batch;
        if !self.pending.quads.is_empty() && (incompatible || overflow) {
            self.finish_quad_batch()?;
        }
        self.pending.texture = texture;
        self.pending.smoothing = smoothing;
        self.pending.blend_mode = self.state.blend_mode;
        for quad in quads {
            let prepared = self.prepare(quad, alpha);
            self.pending.quads.push(prepared);
        }
        Ok(())
    }

    /// Draw immediately as one call whose buffer the backend may cache
    /// under `id`.
    pub fn draw_quads_direct(
        &mut self,
        id: BatchId,
        quads: &[Quad],
        texture: Option<TextureId>,
        smoothing: Smoothing,
        alpha: f32,
    ) -> Result<(), RenderError> {
        self.finish_quad_batch()?;
        let prepared: Vec<PreparedQuad> = quads.iter().map(|q| self.prepare(q, alpha)).collect();
        let call = DrawCall {
            quads: &prepared,
            texture,
            blend_mode: self.state.blend_mode,
            smoothing,
            projection: self.state.projection,
            clip: self.clip_rect(),
            cache_key: Some(id),
        };
        self.backend.draw_quads(&call)?;
        self.draw_count += 1;
        Ok(())
    }

    /// Submit the pending batch, if any.
    pub fn finish_quad_batch(&mut self) -> Result<(), RenderError> {
        if self.pending.quads.is_empty() {
            return Ok(());
        }
        let quads = std::mem::take(&mut self.pending.quads);
        let call = DrawCall {
            quads: &quads,
            texture: self.pending.texture,
            blend_mode: self.pending.blend_mode,
            smoothing: self.pending.smoothing,
            projection: self.state.projection,
            clip: self.clip_rect(),
            cache_key: None,
        };
        let result = self.backend.draw_quads(&call);
        trace!("Flushed {} quads (draw #{})", quads.len(), self.draw_count);
        self.draw_count += 1;
        // Keep the allocation for the next batch.
        self.pending.quads = quads;
        self.pending.quads.clear();
        result
    }

    pub fn pending_quads(&self) -> usize {
        self.pending.quads.len()
    }

    /// Advance the batching epoch.
    pub fn next_frame(&mut self) {
        self.frame_id += 1;
        self.draw_count = 0;
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Draw calls submitted since the last `next_frame`.
    pub fn draw_count(&self) -> u32 {
        self.draw_count
    }
}

// ===================================================================
// Tests
// ===================================================================

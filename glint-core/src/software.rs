//! CPU reference backend.
//!
//! Rasterizes prepared quads into one [`Pixmap`] per texture (plus a back
//! buffer for the default target) with nearest-neighbour sampling and
//! premultiplied blending. It records call statistics and can simulate a
//! missing or lost context, which makes it the backend for tests and for
//! machines without a GPU.
//!
//! `SoftwareBackend` is a shared handle: clone it before boxing it into a
//! [`Painter`](crate::painter::Painter) to keep inspecting pixels and stats.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::{debug, warn};

use crate::backend::{BackendCaps, DrawCall, PreparedQuad, RenderBackend, RenderError};
use crate::display::BlendMode;
use crate::geom::Point;
use crate::pixmap::Pixmap;
use crate::quad::BatchId;
use crate::texture::{TextureDescriptor, TextureId};

#[derive(Clone, Debug)]
pub struct SoftwareBackendConfig {
    pub content_scale_factor: f32,
    /// When false, creating a texture with a non-power-of-two edge fails.
    pub non_power_of_two: bool,
    /// Back buffer size in device pixels.
    pub back_buffer_size: [u32; 2],
}

impl Default for SoftwareBackendConfig {
    fn default() -> Self {
        Self {
            content_scale_factor: 1.0,
            non_power_of_two: true,
            back_buffer_size: [800, 600],
        }
    }
}

/// Counters of backend calls since creation or the last `reset_stats`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BackendStats {
    pub textures_created: u32,
    pub textures_disposed: u32,
    pub disposed_ids: Vec<TextureId>,
    pub uploads: u32,
    pub render_target_binds: u32,
    pub clears: u32,
    pub draw_calls: u32,
    pub quads_drawn: u32,
    pub buffers_released: u32,
}

struct SoftwareState {
    config: SoftwareBackendConfig,
    available: bool,
    context_valid: bool,
    textures: HashMap<TextureId, Pixmap>,
    back_buffer: Pixmap,
    target: Option<TextureId>,
    cached_buffers: HashSet<BatchId>,
    stats: BackendStats,
}

#[derive(Clone)]
pub struct SoftwareBackend {
    inner: Rc<RefCell<SoftwareState>>,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new(SoftwareBackendConfig::default())
    }
}

impl SoftwareBackend {
    pub fn new(config: SoftwareBackendConfig) -> Self {
        let [w, h] = config.back_buffer_size;
        let state = SoftwareState {
            config,
            available: true,
            context_valid: true,
            textures: HashMap::new(),
            back_buffer: Pixmap::new(w, h),
            target: None,
            cached_buffers: HashSet::new(),
            stats: BackendStats::default(),
        };
        Self { inner: Rc::new(RefCell::new(state)) }
    }

    pub fn stats(&self) -> BackendStats {
        self.inner.borrow().stats.clone()
    }

    pub fn reset_stats(&self) {
        self.inner.borrow_mut().stats = BackendStats::default();
    }

    /// Simulate the presence or absence of a GPU context.
    pub fn set_available(&self, available: bool) {
        self.inner.borrow_mut().available = available;
    }

    /// Simulate a device loss: every texture's content becomes undefined
    /// (transparent here) and the context reports itself invalid.
    pub fn lose_context(&self) {
        let mut state = self.inner.borrow_mut();
        state.context_valid = false;
        for pixmap in state.textures.values_mut() {
            pixmap.fill(0, 0.0);
        }
        state.cached_buffers.clear();
        warn!("Software context lost ({} textures)", state.textures.len());
    }

    pub fn restore_context(&self) {
        self.inner.borrow_mut().context_valid = true;
    }

    /// Copy of a texture's pixels.
    pub fn pixels(&self, texture: TextureId) -> Option<Pixmap> {
        self.inner.borrow().textures.get(&texture).cloned()
    }

    pub fn back_buffer(&self) -> Pixmap {
        self.inner.borrow().back_buffer.clone()
    }

    pub fn texture_count(&self) -> usize {
        self.inner.borrow().textures.len()
    }

    pub fn has_cached_buffer(&self, key: BatchId) -> bool {
        self.inner.borrow().cached_buffers.contains(&key)
    }
}

impl SoftwareState {
    fn ensure_available(&self) -> Result<(), RenderError> {
        if self.available {
            Ok(())
        } else {
            Err(RenderError::MissingContext)
        }
    }

    fn target_mut(&mut self) -> Result<&mut Pixmap, RenderError> {
        match self.target {
            Some(id) => self.textures.get_mut(&id).ok_or(RenderError::UnknownTexture(id)),
            None => Ok(&mut self.back_buffer),
        }
    }
}

impl RenderBackend for SoftwareBackend {
    fn is_available(&self) -> bool {
        self.inner.borrow().available
    }

    fn is_context_valid(&self) -> bool {
        let state = self.inner.borrow();
        state.available && state.context_valid
    }

    fn capabilities(&self) -> BackendCaps {
        BackendCaps {
            non_power_of_two: self.inner.borrow().config.non_power_of_two,
            ..BackendCaps::default()
        }
    }

    fn content_scale_factor(&self) -> f32 {
        self.inner.borrow().config.content_scale_factor
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureId, RenderError> {
        let mut state = self.inner.borrow_mut();
        state.ensure_available()?;
        let (width, height) = desc.native_size();
        let pot_ok = state.config.non_power_of_two || (width.is_power_of_two() && height.is_power_of_two());
        if width == 0 || height == 0 || !pot_ok {
            return Err(RenderError::TextureSize { width, height });
        }
        let id = TextureId::new();
        state.textures.insert(id, Pixmap::new(width, height));
        state.stats.textures_created += 1;
        Ok(id)
    }

    fn upload_pixels(&mut self, texture: TextureId, pixels: &Pixmap) -> Result<(), RenderError> {
        let mut state = self.inner.borrow_mut();
        state.ensure_available()?;
        let slot = state
            .textures
            .get_mut(&texture)
            .ok_or(RenderError::UnknownTexture(texture))?;
        if (slot.width(), slot.height()) != (pixels.width(), pixels.height()) {
            return Err(RenderError::PixmapSize {
                texture,
                expected: (slot.width(), slot.height()),
                got: (pixels.width(), pixels.height()),
            });
        }
        slot.data_mut().copy_from_slice(pixels.data());
        state.stats.uploads += 1;
        Ok(())
    }

    fn dispose_texture(&mut self, texture: TextureId) {
        let mut state = self.inner.borrow_mut();
        if state.textures.remove(&texture).is_none() {
            debug!("Dispose of unknown texture {texture} ignored");
            return;
        }
        if state.target == Some(texture) {
            state.target = None;
        }
        state.stats.textures_disposed += 1;
        state.stats.disposed_ids.push(texture);
    }

    fn set_render_target(&mut self, target: Option<TextureId>, _anti_alias: u32) -> Result<(), RenderError> {
        let mut state = self.inner.borrow_mut();
        state.ensure_available()?;
        if let Some(id) = target {
            if !state.textures.contains_key(&id) {
                return Err(RenderError::UnknownTexture(id));
            }
            state.stats.render_target_binds += 1;
        }
        state.target = target;
        Ok(())
    }

    fn clear(&mut self, rgb: u32, alpha: f32) -> Result<(), RenderError> {
        let mut state = self.inner.borrow_mut();
        state.ensure_available()?;
        state.target_mut()?.fill(rgb, alpha);
        state.stats.clears += 1;
        Ok(())
    }

    fn draw_quads(&mut self, call: &DrawCall<'_>) -> Result<(), RenderError> {
        let mut state = self.inner.borrow_mut();
        state.ensure_available()?;
        // Cloned so a texture may be drawn into itself.
        let source = match call.texture {
            Some(id) => Some(
                state
                    .textures
                    .get(&id)
                    .cloned()
                    .ok_or(RenderError::UnknownTexture(id))?,
            ),
            None => None,
        };
        let target = state.target_mut()?;
        for quad in call.quads {
            rasterize(target, quad, source.as_ref(), call);
        }
        if let Some(key) = call.cache_key {
            state.cached_buffers.insert(key);
        }
        state.stats.draw_calls += 1;
        state.stats.quads_drawn += call.quads.len() as u32;
        Ok(())
    }

    fn release_buffers(&mut self, key: BatchId) {
        let mut state = self.inner.borrow_mut();
        state.cached_buffers.remove(&key);
        state.stats.buffers_released += 1;
    }

    fn read_pixels(&self, texture: Option<TextureId>) -> Result<Pixmap, RenderError> {
        let state = self.inner.borrow();
        state.ensure_available()?;
        match texture {
            Some(id) => state.textures.get(&id).cloned().ok_or(RenderError::UnknownTexture(id)),
            None => Ok(state.back_buffer.clone()),
        }
    }
}

// ===================================================================
// Rasterization
// ===================================================================

fn rasterize(target: &mut Pixmap, quad: &PreparedQuad, source: Option<&Pixmap>, call: &DrawCall<'_>) {
    let [proj_w, proj_h] = call.projection;
    if proj_w <= 0.0 || proj_h <= 0.0 {
        return;
    }
    let sx = target.width() as f32 / proj_w;
    let sy = target.height() as f32 / proj_h;

    let [ox, oy] = quad.origin;
    let [ax, ay] = quad.axis_x;
    let [bx, by] = quad.axis_y;
    let det = ax * by - ay * bx;
    if det.abs() < f32::EPSILON {
        return;
    }

    // Bounding box of the parallelogram in device pixels.
    let corners = [(ox, oy), (ox + ax, oy + ay), (ox + bx, oy + by), (ox + ax + bx, oy + ay + by)];
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
    for (cx, cy) in corners {
        min_x = min_x.min(cx * sx);
        min_y = min_y.min(cy * sy);
        max_x = max_x.max(cx * sx);
        max_y = max_y.max(cy * sy);
    }
    let x0 = min_x.floor().max(0.0) as i32;
    let y0 = min_y.floor().max(0.0) as i32;
    let x1 = (max_x.ceil() as i32).min(target.width() as i32);
    let y1 = (max_y.ceil() as i32).min(target.height() as i32);

    for py in y0..y1 {
        for px in x0..x1 {
            let p = Point::new((px as f32 + 0.5) / sx, (py as f32 + 0.5) / sy);
            if let Some(clip) = call.clip {
                if !clip.contains_point(p) {
                    continue;
                }
            }
            let dx = p.x - ox;
            let dy = p.y - oy;
            let u = (dx * by - dy * bx) / det;
            let v = (ax * dy - ay * dx) / det;
            if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                continue;
            }
            let src = shade(quad, source, u, v);
            if let Some(dst) = target.pixel(px, py) {
                target.set_pixel(px, py, blend(call.blend_mode, src, to_unit(dst)));
            }
        }
    }
}

fn shade(quad: &PreparedQuad, source: Option<&Pixmap>, u: f32, v: f32) -> [f32; 4] {
    let Some(tex) = source else { return quad.color };
    let tu = quad.uv_min[0] + (quad.uv_max[0] - quad.uv_min[0]) * u;
    let tv = quad.uv_min[1] + (quad.uv_max[1] - quad.uv_min[1]) * v;
    let tx = ((tu * tex.width() as f32) as i32).clamp(0, tex.width() as i32 - 1);
    let ty = ((tv * tex.height() as f32) as i32).clamp(0, tex.height() as i32 - 1);
    let texel = to_unit(tex.pixel(tx, ty).unwrap_or([0; 4]));
    [
        texel[0] * quad.color[0],
        texel[1] * quad.color[1],
        texel[2] * quad.color[2],
        texel[3] * quad.color[3],
    ]
}

fn to_unit(px: [u8; 4]) -> [f32; 4] {
    px.map(|c| c as f32 / 255.0)
}

/// Premultiplied blend equations per mode.
fn blend(mode: BlendMode, s: [f32; 4], d: [f32; 4]) -> [u8; 4] {
    let sa = s[3];
    let mut out = [0.0f32; 4];
    for c in 0..4 {
        out[c] = match mode {
            BlendMode::None => s[c],
            BlendMode::Auto | BlendMode::Normal => s[c] + d[c] * (1.0 - sa),
            BlendMode::Add => s[c] + d[c],
            BlendMode::Multiply => s[c] * d[c] + d[c] * (1.0 - sa),
            BlendMode::Screen => s[c] + d[c] * (1.0 - s[c]),
            BlendMode::Erase => d[c] * (1.0 - sa),
        };
    }
    out.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

// ===================================================================
// Tests
// ===================================================================

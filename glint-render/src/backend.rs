//! [`RenderBackend`] on top of wgpu.
//!
//! Every draw call records its own render pass with `LoadOp::Load` and is
//! submitted right away; GPU work is never awaited except by
//! [`WgpuBackend::read_texture`]. The default render target is a backend
//! owned "back buffer" texture, since the context is headless.

use std::collections::HashMap;

use glint_core::color;
use glint_core::{
    BackendCaps, BatchId, DrawCall, Pixmap, Rect, RenderBackend, RenderError, Smoothing, TextureDescriptor,
    TextureFormat, TextureId,
};
use log::{debug, trace};
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroup, Buffer, BufferDescriptor, BufferUsages, Color, CommandEncoderDescriptor, Extent3d, LoadOp, MapMode,
    Operations, Origin3d, RenderPassColorAttachment, RenderPassDescriptor, StoreOp, TexelCopyBufferInfo,
    TexelCopyBufferLayout, TexelCopyTextureInfo, TextureAspect, TextureDimension, TextureUsages, TextureView,
};

use crate::context::{GpuContext, GpuError};
use crate::pipelines::QuadPipeline;
use crate::vertex::{CameraUniform, QuadInstance};

#[derive(Clone, Debug)]
pub struct WgpuBackendConfig {
    pub content_scale_factor: f32,
    /// Report (and enforce) power-of-two-only textures.
    pub force_power_of_two: bool,
    /// Debug label prefix for GPU objects.
    pub label: String,
    /// Default render target size in device pixels.
    pub back_buffer_size: [u32; 2],
}

impl Default for WgpuBackendConfig {
    fn default() -> Self {
        Self {
            content_scale_factor: 1.0,
            force_power_of_two: false,
            label: "glint".to_string(),
            back_buffer_size: [800, 600],
        }
    }
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: TextureView,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    repeat: bool,
}

impl GpuTexture {
    fn new(device: &wgpu::Device, width: u32, height: u32, format: wgpu::TextureFormat, repeat: bool, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsages::TEXTURE_BINDING
                | TextureUsages::RENDER_ATTACHMENT
                | TextureUsages::COPY_DST
                | TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
            format,
            repeat,
        }
    }

    fn extent(&self) -> Extent3d {
        Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    fn copy_info(&self) -> TexelCopyTextureInfo<'_> {
        TexelCopyTextureInfo {
            texture: &self.texture,
            mip_level: 0,
            origin: Origin3d::ZERO,
            aspect: TextureAspect::All,
        }
    }
}

struct CachedBuffer {
    buffer: Buffer,
    capacity: u64,
}

pub struct WgpuBackend {
    gpu: GpuContext,
    config: WgpuBackendConfig,
    pipeline: QuadPipeline,
    textures: HashMap<TextureId, GpuTexture>,
    bind_groups: HashMap<(Option<TextureId>, Smoothing), BindGroup>,
    back_buffer: GpuTexture,
    target: Option<TextureId>,
    anti_alias: u32,
    cached: HashMap<BatchId, CachedBuffer>,
}

impl WgpuBackend {
    pub fn new(gpu: GpuContext, config: WgpuBackendConfig) -> Self {
        let pipeline = QuadPipeline::new(&gpu.device, &gpu.queue);
        let [w, h] = config.back_buffer_size;
        let label = format!("{}_back_buffer", config.label);
        let back_buffer = GpuTexture::new(&gpu.device, w.max(1), h.max(1), wgpu::TextureFormat::Rgba8Unorm, false, &label);
        Self {
            gpu,
            config,
            pipeline,
            textures: HashMap::new(),
            bind_groups: HashMap::new(),
            back_buffer,
            target: None,
            anti_alias: 0,
            cached: HashMap::new(),
        }
    }

    /// Create a headless GPU context and a backend on it.
    pub fn headless(config: WgpuBackendConfig) -> Result<Self, GpuError> {
        let gpu = pollster::block_on(GpuContext::new_headless_with_label(&config.label))?;
        Ok(Self::new(gpu, config))
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn has_cached_buffer(&self, key: BatchId) -> bool {
        self.cached.contains_key(&key)
    }

    /// Anti-alias level requested by the last `set_render_target`.
    pub fn anti_alias(&self) -> u32 {
        self.anti_alias
    }

    fn ensure_valid(&self) -> Result<(), RenderError> {
        if self.gpu.is_lost() {
            Err(RenderError::Backend("GPU device lost".into()))
        } else {
            Ok(())
        }
    }

    fn target_texture(&self) -> Result<&GpuTexture, RenderError> {
        match self.target {
            Some(id) => self.textures.get(&id).ok_or(RenderError::UnknownTexture(id)),
            None => Ok(&self.back_buffer),
        }
    }

    fn ensure_bind_group(&mut self, texture: Option<TextureId>, smoothing: Smoothing) -> Result<(), RenderError> {
        if self.bind_groups.contains_key(&(texture, smoothing)) {
            return Ok(());
        }
        let source = match texture {
            Some(id) => Some(self.textures.get(&id).ok_or(RenderError::UnknownTexture(id))?),
            None => None,
        };
        let bind_group = self.pipeline.texture_bind_group(
            &self.gpu.device,
            source.map(|t| &t.view),
            smoothing,
            source.is_some_and(|t| t.repeat),
        );
        self.bind_groups.insert((texture, smoothing), bind_group);
        Ok(())
    }

    /// Copy of a texture that is about to be drawn into itself.
    fn snapshot(&self, id: TextureId, smoothing: Smoothing) -> Result<(GpuTexture, BindGroup), RenderError> {
        let source = self.textures.get(&id).ok_or(RenderError::UnknownTexture(id))?;
        let copy = GpuTexture::new(
            &self.gpu.device,
            source.width,
            source.height,
            source.format,
            source.repeat,
            "glint_feedback_copy",
        );
        let mut encoder = self.gpu.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("glint_feedback_encoder"),
        });
        encoder.copy_texture_to_texture(source.copy_info(), copy.copy_info(), source.extent());
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        let bind_group = self
            .pipeline
            .texture_bind_group(&self.gpu.device, Some(&copy.view), smoothing, copy.repeat);
        Ok((copy, bind_group))
    }

    fn upload_cached(&mut self, key: BatchId, bytes: &[u8]) {
        let size = bytes.len() as u64;
        match self.cached.get(&key) {
            Some(cached) if cached.capacity >= size => {
                self.gpu.queue.write_buffer(&cached.buffer, 0, bytes);
            }
            _ => {
                let buffer = self.gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("glint_cached_instances"),
                    contents: bytes,
                    usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
                });
                self.cached.insert(key, CachedBuffer { buffer, capacity: size });
            }
        }
    }

    /// Read a texture (or the back buffer for `None`) back into a pixmap.
    /// Blocks until the GPU is done.
    pub fn read_texture(&self, texture: Option<TextureId>) -> Result<Pixmap, GpuError> {
        let source = match texture {
            Some(id) => self
                .textures
                .get(&id)
                .ok_or_else(|| GpuError::Readback(format!("unknown texture {id}")))?,
            None => &self.back_buffer,
        };
        let unpadded = 4 * source.width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = self.gpu.device.create_buffer(&BufferDescriptor {
            label: Some("glint_readback"),
            size: u64::from(padded) * u64::from(source.height),
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self.gpu.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("glint_readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            source.copy_info(),
            TexelCopyBufferInfo {
                buffer: &buffer,
                layout: TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(source.height),
                },
            },
            source.extent(),
        );
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.gpu.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GpuError::Readback(e.to_string()))?
            .map_err(|e| GpuError::Readback(e.to_string()))?;

        let mut data = Vec::with_capacity((unpadded * source.height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded as usize) {
                data.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        buffer.unmap();

        if source.format == wgpu::TextureFormat::Bgra8Unorm {
            for px in data.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }
        Pixmap::from_rgba(source.width, source.height, data)
            .ok_or_else(|| GpuError::Readback("pixel buffer size mismatch".into()))
    }
}

fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
    }
}

/// Scissor rectangle in pixels for a clip in projection space; `None` when
/// nothing is visible.
pub(crate) fn scissor(clip: Option<Rect>, projection: [f32; 2], width: u32, height: u32) -> Option<[u32; 4]> {
    let Some(clip) = clip else {
        return Some([0, 0, width, height]);
    };
    let sx = width as f32 / projection[0];
    let sy = height as f32 / projection[1];
    let x0 = (clip.x * sx).round().clamp(0.0, width as f32) as u32;
    let y0 = (clip.y * sy).round().clamp(0.0, height as f32) as u32;
    let x1 = (clip.right() * sx).round().clamp(0.0, width as f32) as u32;
    let y1 = (clip.bottom() * sy).round().clamp(0.0, height as f32) as u32;
    if x1 <= x0 || y1 <= y0 {
        None
    } else {
        Some([x0, y0, x1 - x0, y1 - y0])
    }
}

impl RenderBackend for WgpuBackend {
    fn is_available(&self) -> bool {
        true
    }

    fn is_context_valid(&self) -> bool {
        !self.gpu.is_lost()
    }

    fn capabilities(&self) -> BackendCaps {
        BackendCaps {
            non_power_of_two: !self.config.force_power_of_two,
            max_texture_size: self.gpu.max_texture_size(),
        }
    }

    fn content_scale_factor(&self) -> f32 {
        self.config.content_scale_factor
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureId, RenderError> {
        self.ensure_valid()?;
        let (width, height) = desc.native_size();
        let pot_ok = !self.config.force_power_of_two || (width.is_power_of_two() && height.is_power_of_two());
        if width == 0 || height == 0 || !pot_ok {
            return Err(RenderError::TextureSize { width, height });
        }
        let id = TextureId::new();
        let label = desc.label.clone().unwrap_or_else(|| format!("{}_texture", self.config.label));
        let texture = GpuTexture::new(&self.gpu.device, width, height, wgpu_format(desc.format), desc.repeat, &label);
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn upload_pixels(&mut self, texture: TextureId, pixels: &Pixmap) -> Result<(), RenderError> {
        self.ensure_valid()?;
        let slot = self.textures.get(&texture).ok_or(RenderError::UnknownTexture(texture))?;
        if (slot.width, slot.height) != (pixels.width(), pixels.height()) {
            return Err(RenderError::PixmapSize {
                texture,
                expected: (slot.width, slot.height),
                got: (pixels.width(), pixels.height()),
            });
        }
        let swizzled;
        let data = if slot.format == wgpu::TextureFormat::Bgra8Unorm {
            let mut bytes = pixels.data().to_vec();
            for px in bytes.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
            swizzled = bytes;
            &swizzled[..]
        } else {
            pixels.data()
        };
        self.gpu.queue.write_texture(
            slot.copy_info(),
            data,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * slot.width),
                rows_per_image: Some(slot.height),
            },
            slot.extent(),
        );
        Ok(())
    }

    fn dispose_texture(&mut self, texture: TextureId) {
        let Some(slot) = self.textures.remove(&texture) else {
            debug!("Dispose of unknown texture {texture} ignored");
            return;
        };
        self.bind_groups.retain(|(id, _), _| *id != Some(texture));
        if self.target == Some(texture) {
            self.target = None;
        }
        slot.texture.destroy();
    }

    fn set_render_target(&mut self, target: Option<TextureId>, anti_alias: u32) -> Result<(), RenderError> {
        if let Some(id) = target {
            if !self.textures.contains_key(&id) {
                return Err(RenderError::UnknownTexture(id));
            }
            if anti_alias > 0 {
                trace!("Render target {id} requested {anti_alias}x anti-aliasing; rendering single-sampled");
            }
        }
        self.target = target;
        self.anti_alias = anti_alias;
        Ok(())
    }

    fn clear(&mut self, rgb: u32, alpha: f32) -> Result<(), RenderError> {
        self.ensure_valid()?;
        let [r, g, b, a] = color::premultiply(color::to_rgba(rgb, alpha));
        let target = self.target_texture()?;
        let mut encoder = self.gpu.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("glint_clear_encoder"),
        });
        {
            let _pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("glint_clear_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn draw_quads(&mut self, call: &DrawCall<'_>) -> Result<(), RenderError> {
        self.ensure_valid()?;
        if call.quads.is_empty() {
            return Ok(());
        }
        let (format, width, height) = {
            let target = self.target_texture()?;
            (target.format, target.width, target.height)
        };
        let Some([sx, sy, sw, sh]) = scissor(call.clip, call.projection, width, height) else {
            trace!("Draw call fully clipped");
            return Ok(());
        };

        let instances: Vec<QuadInstance> = call.quads.iter().map(QuadInstance::from).collect();
        let bytes: &[u8] = bytemuck::cast_slice(&instances);

        self.pipeline.prepare(&self.gpu.device, call.blend_mode, format);
        let feedback = match call.texture {
            Some(id) if self.target == Some(id) => Some(self.snapshot(id, call.smoothing)?),
            _ => {
                self.ensure_bind_group(call.texture, call.smoothing)?;
                None
            }
        };
        if let Some(key) = call.cache_key {
            self.upload_cached(key, bytes);
        }

        let temp_buffer;
        let instance_buffer = match call.cache_key.and_then(|key| self.cached.get(&key)) {
            Some(cached) => &cached.buffer,
            None => {
                temp_buffer = self.gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("glint_instances"),
                    contents: bytes,
                    usage: BufferUsages::VERTEX,
                });
                &temp_buffer
            }
        };
        let texture_bind_group = match &feedback {
            Some((_, bind_group)) => bind_group,
            None => self
                .bind_groups
                .get(&(call.texture, call.smoothing))
                .ok_or_else(|| RenderError::Backend("missing texture bind group".into()))?,
        };
        let camera = self
            .pipeline
            .camera_bind_group(&self.gpu.device, &CameraUniform::orthographic(call.projection[0], call.projection[1]));
        let target = self.target_texture()?;

        let mut encoder = self.gpu.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("glint_draw_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("glint_draw_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Load,
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_scissor_rect(sx, sy, sw, sh);
            self.pipeline.draw(
                &mut pass,
                call.blend_mode,
                format,
                &camera,
                texture_bind_group,
                instance_buffer,
                instances.len() as u32,
            );
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn release_buffers(&mut self, key: BatchId) {
        if let Some(cached) = self.cached.remove(&key) {
            cached.buffer.destroy();
        } else {
            debug!("No cached buffers for batch {key:?}");
        }
    }

    fn read_pixels(&self, texture: Option<TextureId>) -> Result<Pixmap, RenderError> {
        self.ensure_valid()?;
        self.read_texture(texture).map_err(|e| RenderError::Backend(e.to_string()))
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scissor_without_clip_covers_target() {
        assert_eq!(scissor(None, [100.0, 50.0], 200, 100), Some([0, 0, 200, 100]));
    }

    #[test]
    fn test_scissor_scales_to_pixels() {
        let clip = Rect::new(10.0, 5.0, 20.0, 10.0);
        assert_eq!(scissor(Some(clip), [100.0, 50.0], 200, 100), Some([20, 10, 40, 20]));
    }

    #[test]
    fn test_scissor_outside_target_is_empty() {
        let clip = Rect::new(150.0, 0.0, 20.0, 10.0);
        assert_eq!(scissor(Some(clip), [100.0, 100.0], 100, 100), None);
    }

    #[test]
    fn test_force_power_of_two_rejects_odd_sizes() {
        let config = WgpuBackendConfig {
            force_power_of_two: true,
            ..Default::default()
        };
        // May fail in CI without GPU; skip gracefully.
        let Ok(mut backend) = WgpuBackend::headless(config) else {
            return;
        };
        assert!(!backend.capabilities().non_power_of_two);
        assert!(matches!(
            backend.create_texture(&TextureDescriptor::new(100.0, 64.0, 1.0)),
            Err(RenderError::TextureSize { width: 100, height: 64 })
        ));
        assert!(backend.create_texture(&TextureDescriptor::new(128.0, 64.0, 1.0)).is_ok());
    }
}

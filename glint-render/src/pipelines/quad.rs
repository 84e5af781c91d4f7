//! Quad render pipeline: instanced rendering of textured, premultiplied
//! quads.
//!
//! One `wgpu::RenderPipeline` exists per (blend mode, target format) pair,
//! created on first use. Untextured quads sample a 1×1 white texture so a
//! single shader covers both cases.

use std::collections::HashMap;

use glint_core::{BlendMode, Smoothing};
use wgpu::util::DeviceExt;
use wgpu::{
    AddressMode, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, BlendComponent, BlendFactor, BlendOperation, BlendState,
    Buffer, BufferBindingType, BufferUsages, ColorTargetState, ColorWrites, Device, Extent3d, FilterMode,
    FragmentState, FrontFace, IndexFormat, MultisampleState, PipelineCompilationOptions, PipelineLayout,
    PipelineLayoutDescriptor, PolygonMode, PrimitiveState, PrimitiveTopology, Queue, RenderPass, RenderPipeline,
    RenderPipelineDescriptor, Sampler, SamplerBindingType, SamplerDescriptor, ShaderModule, ShaderModuleDescriptor,
    ShaderStages, TextureDimension, TextureFormat, TextureSampleType, TextureUsages, TextureView,
    TextureViewDimension, VertexState,
};

use crate::vertex::{CameraUniform, QuadVertex};

/// Owns the shader, layouts, samplers and shared geometry.
pub struct QuadPipeline {
    shader: ShaderModule,
    layout: PipelineLayout,
    camera_bgl: BindGroupLayout,
    texture_bgl: BindGroupLayout,
    pipelines: HashMap<(BlendMode, TextureFormat), RenderPipeline>,

    // Geometry (shared unit quad).
    vertex_buffer: Buffer,
    index_buffer: Buffer,

    /// Indexed by `[smoothing][repeat]`.
    samplers: [[Sampler; 2]; 2],
    white_view: TextureView,
}

impl QuadPipeline {
    pub fn new(device: &Device, queue: &Queue) -> Self {
        // ── Shader ──────────────────────────────────────────────
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("quad_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/quad.wgsl").into()),
        });

        // ── Camera bind group layout (group 0) ──────────────────
        let camera_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("quad_camera_bgl"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        // ── Texture bind group layout (group 1) ─────────────────
        let texture_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("quad_texture_bgl"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("quad_pipeline_layout"),
            bind_group_layouts: &[&camera_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_vb"),
            contents: bytemuck::cast_slice(&QuadVertex::VERTICES),
            usage: BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_ib"),
            contents: bytemuck::cast_slice(&QuadVertex::INDICES),
            usage: BufferUsages::INDEX,
        });

        let sampler = |filter: FilterMode, address: AddressMode| {
            device.create_sampler(&SamplerDescriptor {
                label: Some("quad_sampler"),
                address_mode_u: address,
                address_mode_v: address,
                mag_filter: filter,
                min_filter: filter,
                ..Default::default()
            })
        };
        let samplers = [
            [sampler(FilterMode::Nearest, AddressMode::ClampToEdge), sampler(FilterMode::Nearest, AddressMode::Repeat)],
            [sampler(FilterMode::Linear, AddressMode::ClampToEdge), sampler(FilterMode::Linear, AddressMode::Repeat)],
        ];

        // ── 1×1 white texture for untextured quads ──────────────
        let white = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("quad_white"),
                size: Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: TextureFormat::Rgba8Unorm,
                usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255, 255, 255, 255],
        );
        let white_view = white.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            shader,
            layout,
            camera_bgl,
            texture_bgl,
            pipelines: HashMap::new(),
            vertex_buffer,
            index_buffer,
            samplers,
            white_view,
        }
    }

    fn create_pipeline(&self, device: &Device, blend_mode: BlendMode, format: TextureFormat) -> RenderPipeline {
        device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("quad_pipeline"),
            layout: Some(&self.layout),
            vertex: VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                compilation_options: PipelineCompilationOptions::default(),
                buffers: &[QuadVertex::layout(), crate::vertex::QuadInstance::layout()],
            },
            fragment: Some(FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                compilation_options: PipelineCompilationOptions::default(),
                targets: &[Some(ColorTargetState {
                    format,
                    blend: blend_state(blend_mode),
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: None, // 2D, no backface culling
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            // Anti-alias levels are recorded, not rendered.
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    /// Create the pipeline for this pair if it doesn't exist yet.
    pub fn prepare(&mut self, device: &Device, blend_mode: BlendMode, format: TextureFormat) {
        if !self.pipelines.contains_key(&(blend_mode, format)) {
            let pipeline = self.create_pipeline(device, blend_mode, format);
            self.pipelines.insert((blend_mode, format), pipeline);
        }
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn camera_bind_group(&self, device: &Device, camera: &CameraUniform) -> BindGroup {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_camera_ub"),
            contents: bytemuck::bytes_of(camera),
            usage: BufferUsages::UNIFORM,
        });
        device.create_bind_group(&BindGroupDescriptor {
            label: Some("quad_camera_bg"),
            layout: &self.camera_bgl,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    /// Bind group sampling `view`, or the white texture when `None`.
    pub fn texture_bind_group(
        &self,
        device: &Device,
        view: Option<&TextureView>,
        smoothing: Smoothing,
        repeat: bool,
    ) -> BindGroup {
        let filter = match smoothing {
            Smoothing::None => 0,
            Smoothing::Bilinear => 1,
        };
        device.create_bind_group(&BindGroupDescriptor {
            label: Some("quad_texture_bg"),
            layout: &self.texture_bgl,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(view.unwrap_or(&self.white_view)),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&self.samplers[filter][repeat as usize]),
                },
            ],
        })
    }

    /// Record one instanced draw. The pipeline must have been `prepare`d.
    pub fn draw(
        &self,
        pass: &mut RenderPass<'_>,
        blend_mode: BlendMode,
        format: TextureFormat,
        camera: &BindGroup,
        texture: &BindGroup,
        instances: &Buffer,
        instance_count: u32,
    ) {
        let Some(pipeline) = self.pipelines.get(&(blend_mode, format)) else {
            return;
        };
        if instance_count == 0 {
            return;
        }
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, texture, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, instances.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), IndexFormat::Uint16);
        pass.draw_indexed(0..6, 0, 0..instance_count);
    }
}

/// Premultiplied-alpha blend equations.
pub fn blend_state(mode: BlendMode) -> Option<BlendState> {
    let (src, dst) = match mode {
        BlendMode::None => return None,
        BlendMode::Auto | BlendMode::Normal => (BlendFactor::One, BlendFactor::OneMinusSrcAlpha),
        BlendMode::Add => (BlendFactor::One, BlendFactor::One),
        BlendMode::Multiply => (BlendFactor::Dst, BlendFactor::OneMinusSrcAlpha),
        BlendMode::Screen => (BlendFactor::One, BlendFactor::OneMinusSrc),
        BlendMode::Erase => (BlendFactor::Zero, BlendFactor::OneMinusSrcAlpha),
    };
    let component = BlendComponent {
        src_factor: src,
        dst_factor: dst,
        operation: BlendOperation::Add,
    };
    Some(BlendState {
        color: component,
        alpha: component,
    })
}

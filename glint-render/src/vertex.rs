//! GPU vertex and instance data types for the quad pipeline.
//!
//! All types derive `bytemuck::Pod` + `Zeroable` for zero-copy upload
//! to GPU buffers.

use bytemuck::{Pod, Zeroable};
use glint_core::PreparedQuad;
use wgpu::{BufferAddress, VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

// ───────────────────────────────────────────────────────────────────
// Vertex (unit quad)
// ───────────────────────────────────────────────────────────────────

/// A single vertex of the unit quad (0,0)→(1,1).
///
/// The quad is shared across all instances; each instance stretches it
/// into its own parallelogram.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct QuadVertex {
    /// Position in [0, 1] space.
    pub position: [f32; 2],
}

impl QuadVertex {
    pub const VERTICES: [QuadVertex; 4] = [
        QuadVertex { position: [0.0, 0.0] }, // top-left
        QuadVertex { position: [1.0, 0.0] }, // top-right
        QuadVertex { position: [0.0, 1.0] }, // bottom-left
        QuadVertex { position: [1.0, 1.0] }, // bottom-right
    ];

    pub const INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

    pub fn layout() -> VertexBufferLayout<'static> {
        static ATTRS: &[VertexAttribute] = &[
            // location(0) = position
            VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: VertexFormat::Float32x2,
            },
        ];
        VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as BufferAddress,
            step_mode: VertexStepMode::Vertex,
            attributes: ATTRS,
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Instance data
// ───────────────────────────────────────────────────────────────────

/// One textured quad: a parallelogram from `origin` spanned by the two
/// axes, with premultiplied color.
///
/// 64 bytes per instance.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct QuadInstance {
    pub origin: [f32; 2],
    pub axis_x: [f32; 2],
    pub axis_y: [f32; 2],
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
    pub color: [f32; 4],
    /// Padding for 16-byte alignment.
    pub _pad: [f32; 2],
}

impl From<&PreparedQuad> for QuadInstance {
    fn from(quad: &PreparedQuad) -> Self {
        Self {
            origin: quad.origin,
            axis_x: quad.axis_x,
            axis_y: quad.axis_y,
            uv_min: quad.uv_min,
            uv_max: quad.uv_max,
            color: quad.color,
            _pad: [0.0; 2],
        }
    }
}

impl QuadInstance {
    pub fn layout() -> VertexBufferLayout<'static> {
        static ATTRS: &[VertexAttribute] = &[
            // location(1) = origin
            VertexAttribute {
                offset: 0,
                shader_location: 1,
                format: VertexFormat::Float32x2,
            },
            // location(2) = axis_x
            VertexAttribute {
                offset: 8,
                shader_location: 2,
                format: VertexFormat::Float32x2,
            },
            // location(3) = axis_y
            VertexAttribute {
                offset: 16,
                shader_location: 3,
                format: VertexFormat::Float32x2,
            },
            // location(4) = uv_min
            VertexAttribute {
                offset: 24,
                shader_location: 4,
                format: VertexFormat::Float32x2,
            },
            // location(5) = uv_max
            VertexAttribute {
                offset: 32,
                shader_location: 5,
                format: VertexFormat::Float32x2,
            },
            // location(6) = color
            VertexAttribute {
                offset: 40,
                shader_location: 6,
                format: VertexFormat::Float32x4,
            },
        ];
        VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadInstance>() as BufferAddress,
            step_mode: VertexStepMode::Instance,
            attributes: ATTRS,
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Camera uniform
// ───────────────────────────────────────────────────────────────────

/// Projection uniform, written once per draw call.
///
/// 64 bytes, fits in a single uniform buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    /// 4×4 orthographic projection matrix (column-major).
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    /// Map `(0,0)..(width,height)` onto the whole render target, Y down.
    pub fn orthographic(width: f32, height: f32) -> Self {
        let sx = 2.0 / width;
        let sy = -2.0 / height; // flip Y for top-left origin

        Self {
            view_proj: [
                [sx,   0.0, 0.0, 0.0],
                [0.0,  sy,  0.0, 0.0],
                [0.0,  0.0, 1.0, 0.0],
                [-1.0, 1.0, 0.0, 1.0],
            ],
        }
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ndc(cam: &CameraUniform, x: f32, y: f32) -> (f32, f32) {
        let vp = cam.view_proj;
        (
            x * vp[0][0] + y * vp[1][0] + vp[3][0],
            x * vp[0][1] + y * vp[1][1] + vp[3][1],
        )
    }

    #[test]
    fn test_instance_size() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 8);
        assert_eq!(std::mem::size_of::<QuadInstance>(), 64);
        assert_eq!(std::mem::size_of::<CameraUniform>(), 64);
    }

    #[test]
    fn test_camera_corners() {
        let cam = CameraUniform::orthographic(256.0, 128.0);
        let (x, y) = ndc(&cam, 0.0, 0.0);
        assert!((x + 1.0).abs() < 1e-5 && (y - 1.0).abs() < 1e-5);
        let (x, y) = ndc(&cam, 256.0, 128.0);
        assert!((x - 1.0).abs() < 1e-5 && (y + 1.0).abs() < 1e-5);
        let (x, y) = ndc(&cam, 128.0, 64.0);
        assert!(x.abs() < 1e-5 && y.abs() < 1e-5);
    }

    #[test]
    fn test_instance_from_prepared_quad() {
        let quad = PreparedQuad {
            origin: [1.0, 2.0],
            axis_x: [3.0, 0.0],
            axis_y: [0.0, 4.0],
            uv_min: [0.0, 0.0],
            uv_max: [0.5, 1.0],
            color: [0.5, 0.0, 0.0, 0.5],
        };
        let inst = QuadInstance::from(&quad);
        assert_eq!(inst.origin, [1.0, 2.0]);
        assert_eq!(inst.uv_max, [0.5, 1.0]);
        let bytes = bytemuck::bytes_of(&inst);
        assert_eq!(bytes.len(), 64);
    }

    #[test]
    fn test_instance_layout_locations() {
        let layout = QuadInstance::layout();
        assert_eq!(layout.attributes.len(), 6);
        assert_eq!(layout.attributes[0].shader_location, 1); // origin
        assert_eq!(layout.attributes[5].shader_location, 6); // color
        assert_eq!(layout.attributes[5].offset, 40);
        assert_eq!(layout.step_mode, VertexStepMode::Instance);
    }
}

//! Built-in 2D primitives.
//!
//! The renderer draws three fixed shapes. Their vertex data is built
//! once at init, uploaded, and reused for every draw; placement and
//! sizing happen in the model matrix.

use crate::device::{BufferId, RenderDevice, VertexAttribute, VertexFormat};
use crate::error::DeviceError;

/// Interleaved vertex layout shared by every pipeline.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

    pub const ATTRIBUTES: &'static [VertexAttribute] = &[
        VertexAttribute {
            location: 0,
            offset: 0,
            format: VertexFormat::Float32x3,
        },
        VertexAttribute {
            location: 1,
            offset: 12,
            format: VertexFormat::Float32x3,
        },
    ];

    const fn flat(x: f32, y: f32) -> Self {
        Self {
            position: [x, y, 0.0],
            normal: [0.0, 0.0, 1.0],
        }
    }
}

/// Unit triangle in the XY plane, counter-clockwise, facing +Z.
pub fn triangle() -> Vec<Vertex> {
    vec![
        Vertex::flat(-0.5, -0.5),
        Vertex::flat(0.5, -0.5),
        Vertex::flat(0.0, 0.5),
    ]
}

/// Unit square as two counter-clockwise triangles.
pub fn rectangle() -> Vec<Vertex> {
    vec![
        Vertex::flat(-0.5, -0.5),
        Vertex::flat(0.5, -0.5),
        Vertex::flat(0.5, 0.5),
        Vertex::flat(0.5, 0.5),
        Vertex::flat(-0.5, 0.5),
        Vertex::flat(-0.5, -0.5),
    ]
}

/// Unit-diameter circle as a fan of `segments` triangles expanded into
/// a triangle list: `(center, rim[i], rim[i + 1])` in slot order, so
/// the output is fully determined by `segments`.
pub fn circle(segments: u32) -> Vec<Vertex> {
    let segments = segments.max(3);
    let step = std::f32::consts::TAU / segments as f32;
    let rim = |i: u32| {
        let angle = step * (i % segments) as f32;
        Vertex::flat(0.5 * angle.cos(), 0.5 * angle.sin())
    };

    let mut vertices = Vec::with_capacity(segments as usize * 3);
    for i in 0..segments {
        vertices.push(Vertex::flat(0.0, 0.0));
        vertices.push(rim(i));
        vertices.push(rim(i + 1));
    }
    vertices
}

/// A primitive uploaded to the device.
#[derive(Debug, Clone, Copy)]
pub struct GpuMesh {
    pub buffer: BufferId,
    pub vertex_count: u32,
}

impl GpuMesh {
    pub fn upload<D: RenderDevice + ?Sized>(
        device: &mut D,
        label: &str,
        vertices: &[Vertex],
    ) -> Result<Self, DeviceError> {
        let buffer = device.create_vertex_buffer(label, bytemuck::cast_slice(vertices))?;
        Ok(Self {
            buffer,
            vertex_count: vertices.len() as u32,
        })
    }

    pub fn triangle_count(&self) -> u32 {
        self.vertex_count / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Signed double-area of the 2D projection; positive means
    // counter-clockwise.
    fn winding(a: &Vertex, b: &Vertex, c: &Vertex) -> f32 {
        let ab = [b.position[0] - a.position[0], b.position[1] - a.position[1]];
        let ac = [c.position[0] - a.position[0], c.position[1] - a.position[1]];
        ab[0] * ac[1] - ab[1] * ac[0]
    }

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        assert_eq!(Vertex::STRIDE, 24);
        assert_eq!(Vertex::ATTRIBUTES.len(), 2);
        assert_eq!(Vertex::ATTRIBUTES[1].offset, 12);
    }

    #[test]
    fn test_triangle_winding() {
        let tri = triangle();
        assert_eq!(tri.len(), 3);
        assert!(winding(&tri[0], &tri[1], &tri[2]) > 0.0);
    }

    #[test]
    fn test_rectangle_covers_unit_square() {
        let rect = rectangle();
        assert_eq!(rect.len(), 6);
        for chunk in rect.chunks(3) {
            assert!(winding(&chunk[0], &chunk[1], &chunk[2]) > 0.0);
        }
        let xs: Vec<f32> = rect.iter().map(|v| v.position[0]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), -0.5);
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 0.5);
    }

    #[test]
    fn test_circle_fan_order() {
        let segments = 8;
        let verts = circle(segments);
        assert_eq!(verts.len(), segments as usize * 3);

        for (i, chunk) in verts.chunks(3).enumerate() {
            // Every triangle starts at the center and winds CCW.
            assert_eq!(chunk[0].position, [0.0, 0.0, 0.0]);
            assert!(winding(&chunk[0], &chunk[1], &chunk[2]) > 0.0, "triangle {i}");
        }

        // Adjacent triangles share their rim edge.
        for pair in verts.chunks(3).collect::<Vec<_>>().windows(2) {
            assert_eq!(pair[0][2].position, pair[1][1].position);
        }

        // The fan closes: the last triangle's trailing rim vertex
        // wraps back to rim vertex 0.
        assert_eq!(verts[verts.len() - 1].position, verts[1].position);
    }

    #[test]
    fn test_circle_is_deterministic() {
        assert_eq!(circle(32), circle(32));
    }

    #[test]
    fn test_circle_clamps_segment_count() {
        assert_eq!(circle(0).len(), 9);
        assert_eq!(circle(2).len(), 9);
    }

    #[test]
    fn test_mesh_upload() {
        use crate::device::NullDevice;

        let mut device = NullDevice::new();
        let mesh = GpuMesh::upload(&mut device, "triangle", &triangle()).unwrap();
        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(device.live_resource_count(), 1);
    }
}

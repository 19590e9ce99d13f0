use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::primitives::{Geometry, Topology};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12, // [f32; 3] is 12 bytes
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Interleave a geometry's attributes for upload.
pub fn vertices(geometry: &Geometry) -> Vec<Vertex> {
    geometry
        .positions()
        .iter()
        .zip(geometry.normals())
        .map(|(&position, &normal)| Vertex { position, normal })
        .collect()
}

pub fn primitive_topology(topology: Topology) -> wgpu::PrimitiveTopology {
    match topology {
        Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
        Topology::Lines => wgpu::PrimitiveTopology::LineList,
        Topology::Points => wgpu::PrimitiveTopology::PointList,
    }
}

/// GPU buffers for one uploaded geometry.
pub struct GpuGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl GpuGeometry {
    /// Upload a geometry. Returns `None` for geometry with nothing to draw.
    pub fn upload(device: &wgpu::Device, geometry: &Geometry) -> Option<Self> {
        if geometry.indices().is_empty() || geometry.vertex_count() == 0 {
            return None;
        }
        let vertices = vertices(geometry);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Element Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Element Index Buffer"),
            contents: bytemuck::cast_slice(geometry.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        Some(Self {
            vertex_buffer,
            index_buffer,
            num_indices: geometry.indices().len() as u32,
        })
    }

    pub fn destroy(&self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{box_mesh, point_cloud};
    use crate::resource::{Releasable, ResourceLedger};

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        assert_eq!(Vertex::desc().attributes.len(), 2);
    }

    #[test]
    fn test_vertices_interleave() {
        let ledger = ResourceLedger::new();
        let mut cube = Geometry::new(&ledger, Topology::Triangles, box_mesh(1.0));
        let interleaved = vertices(&cube);
        assert_eq!(interleaved.len(), 24);
        assert_eq!(interleaved[0].normal, [0.0, 0.0, 1.0]);
        cube.release();

        let mut cloud = Geometry::new(&ledger, Topology::Points, point_cloud(&[[1.0, 2.0, 3.0]]));
        assert_eq!(vertices(&cloud)[0].position, [1.0, 2.0, 3.0]);
        cloud.release();
    }
}

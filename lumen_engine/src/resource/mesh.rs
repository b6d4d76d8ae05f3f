/// Mesh - indexed triangle geometry in device-local vertex and index buffers

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::allocator::{BufferAllocation, DeviceAllocator};
use crate::error::{Error, Result};
use crate::graphics_device::{BufferUsage, Format, IndexType, VertexAttribute, VertexInput};
use crate::{engine_debug, engine_error};

/// Interleaved vertex: position, normal, texture coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub const fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self { position, normal, uv }
    }

    /// Vertex input state matching the layout of `Vertex`
    ///
    /// Locations: 0 = position, 1 = normal, 2 = uv.
    pub fn vertex_input() -> VertexInput {
        VertexInput {
            stride: std::mem::size_of::<Vertex>() as u32,
            attributes: vec![
                VertexAttribute { location: 0, format: Format::R32G32B32_SFLOAT, offset: 0 },
                VertexAttribute { location: 1, format: Format::R32G32B32_SFLOAT, offset: 12 },
                VertexAttribute { location: 2, format: Format::R32G32_SFLOAT, offset: 24 },
            ],
        }
    }
}

/// CPU-side geometry (32-bit indices, counter-clockwise front faces)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Unit quad in the XY plane facing +Z
    pub fn quad() -> Self {
        let normal = Vec3::Z;
        let vertices = vec![
            Vertex::new(Vec3::new(-0.5, -0.5, 0.0), normal, Vec2::new(0.0, 1.0)),
            Vertex::new(Vec3::new(0.5, -0.5, 0.0), normal, Vec2::new(1.0, 1.0)),
            Vertex::new(Vec3::new(0.5, 0.5, 0.0), normal, Vec2::new(1.0, 0.0)),
            Vertex::new(Vec3::new(-0.5, 0.5, 0.0), normal, Vec2::new(0.0, 0.0)),
        ];
        Self::new(vertices, vec![0, 1, 2, 2, 3, 0])
    }

    /// Unit cube centered on the origin, 4 vertices per face
    pub fn cube() -> Self {
        // (normal, tangent u, tangent v) per face
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];
        let corners = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];

        let mut data = Self::default();
        for (normal, u, v) in faces {
            let base = data.vertices.len() as u32;
            for (x, y) in corners {
                let position = normal * 0.5 + u * x + v * y;
                data.vertices.push(Vertex::new(position, normal, Vec2::new(x + 0.5, 0.5 - y)));
            }
            data.indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        data
    }

    /// Reject empty geometry and out-of-range indices
    pub fn validate(&self) -> Result<()> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(Error::InvalidResource("mesh has no vertices or no indices".to_string()));
        }
        if self.indices.len() % 3 != 0 {
            return Err(Error::InvalidResource(format!(
                "mesh index count {} is not a multiple of 3", self.indices.len()
            )));
        }
        let vertex_count = self.vertices.len() as u32;
        if let Some(index) = self.indices.iter().find(|i| **i >= vertex_count) {
            return Err(Error::InvalidResource(format!(
                "mesh index {} out of range ({} vertices)", index, vertex_count
            )));
        }
        Ok(())
    }
}

/// Uploaded mesh, drawn with one indexed draw call
#[derive(Debug)]
pub struct Mesh {
    vertices: BufferAllocation,
    indices: BufferAllocation,
    index_count: u32,
}

impl Mesh {
    pub fn upload(allocator: &DeviceAllocator, data: &MeshData) -> Result<Self> {
        if let Err(e) = data.validate() {
            engine_error!("lumen::Mesh", "Rejected mesh: {}", e);
            return Err(e);
        }
        let vertices = allocator.allocate_device_local_buffer_and_transfer(
            bytemuck::cast_slice(&data.vertices),
            BufferUsage::VERTEX,
        )?;
        let indices = allocator.allocate_device_local_buffer_and_transfer(
            bytemuck::cast_slice(&data.indices),
            BufferUsage::INDEX,
        )?;
        engine_debug!("lumen::Mesh", "Uploaded mesh: {} vertices, {} indices", data.vertices.len(), data.indices.len());
        Ok(Self { vertices, indices, index_count: data.indices.len() as u32 })
    }

    pub fn vertex_buffer(&self) -> &BufferAllocation {
        &self.vertices
    }

    pub fn index_buffer(&self) -> &BufferAllocation {
        &self.indices
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn index_type(&self) -> IndexType {
        IndexType::U32
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;

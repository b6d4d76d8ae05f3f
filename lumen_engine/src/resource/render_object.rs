/// Render objects - what gets drawn each frame

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use slotmap::new_key_type;

use crate::resource::MaterialId;

new_key_type! {
    /// Key of an uploaded mesh in the application registry
    pub struct MeshKey;
    /// Key of a render object in the application registry
    pub struct RenderObjectKey;
}

/// Per-draw vertex-stage push constants (two column-major matrices)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PushConstants {
    pub model: Mat4,
    pub view_projection: Mat4,
}

/// A material + mesh pair placed in the world
///
/// Material and mesh are referenced by key; the application owns both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderObject {
    pub material: MaterialId,
    pub mesh: MeshKey,
    pub transform: Mat4,
}

impl RenderObject {
    pub fn new(material: MaterialId, mesh: MeshKey, transform: Mat4) -> Self {
        Self { material, mesh, transform }
    }

    pub fn push_constants(&self, view_projection: Mat4) -> PushConstants {
        PushConstants { model: self.transform, view_projection }
    }
}

#[cfg(test)]
#[path = "render_object_tests.rs"]
mod tests;

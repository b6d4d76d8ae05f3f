//! GPU resources: shaders, textures, materials, meshes, pipelines and render objects

pub mod material;
pub mod mesh;
pub mod pipeline;
pub mod render_object;
pub mod shader;
pub mod texture;

pub use material::*;
pub use mesh::*;
pub use pipeline::*;
pub use render_object::*;
pub use shader::*;
pub use texture::*;

/// Material - shading parameters, textures and shaders of a surface
///
/// A material owns its GPU-side state: a uniform parameter buffer, one
/// sampled texture per image, a single sampler, and a descriptor set layout
/// whose bindings are fixed at construction. Shader resources are shared,
/// not owned. Binding 0 is the parameter buffer (vertex + fragment), the
/// textures follow at bindings 1..=n (fragment only).

use std::collections::BTreeMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

use crate::allocator::{BufferAllocation, DeviceAllocator};
use crate::descriptor::DescriptorSetLayout;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BufferBinding, BufferUsage, DescriptorSetLayoutBinding, DescriptorType, GraphicsDevice,
    ImageBinding, ImageLayout, SamplerDesc, SamplerHandle, ShaderStage, ShaderStageFlags,
};
use crate::resource::{ImageResource, ShaderResource, Texture};
use crate::{engine_error, engine_info};

/// Binding index of the parameter buffer
pub const PARAMETER_BINDING: u32 = 0;

/// Binding index of the first texture
pub const FIRST_TEXTURE_BINDING: u32 = 1;

// ===== PARAMETERS =====

/// GPU layout of the material parameter block (std140)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialParameters {
    pub ambient: Vec3,
    _pad0: f32,
    pub diffuse: Vec3,
    _pad1: f32,
    /// rgb = specular color, w = shininess
    pub specular_and_shininess: Vec4,
}

impl MaterialParameters {
    pub fn new(ambient: Vec3, diffuse: Vec3, specular: Vec3, shininess: f32) -> Self {
        Self {
            ambient,
            _pad0: 0.0,
            diffuse,
            _pad1: 0.0,
            specular_and_shininess: specular.extend(shininess),
        }
    }

    pub fn shininess(&self) -> f32 {
        self.specular_and_shininess.w
    }
}

impl Default for MaterialParameters {
    fn default() -> Self {
        Self::new(Vec3::splat(0.1), Vec3::ONE, Vec3::splat(0.5), 32.0)
    }
}

// ===== MATERIAL RESOURCE =====

/// Role of a texture inside a `MaterialResource`
///
/// Textures are bound in role order: ambient, diffuse, specular, normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureRole {
    Ambient,
    Diffuse,
    Specular,
    Normal,
}

/// Loaded description of a material (colors, textures by role, shaders)
#[derive(Debug, Clone)]
pub struct MaterialResource {
    pub name: String,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub textures: BTreeMap<TextureRole, Arc<ImageResource>>,
    pub vertex_shader: Option<Arc<ShaderResource>>,
    pub fragment_shader: Option<Arc<ShaderResource>>,
}

impl MaterialResource {
    pub fn new(name: impl Into<String>) -> Self {
        let defaults = MaterialParameters::default();
        Self {
            name: name.into(),
            ambient: defaults.ambient,
            diffuse: defaults.diffuse,
            specular: defaults.specular_and_shininess.truncate(),
            shininess: defaults.shininess(),
            textures: BTreeMap::new(),
            vertex_shader: None,
            fragment_shader: None,
        }
    }

    pub fn parameters(&self) -> MaterialParameters {
        MaterialParameters::new(self.ambient, self.diffuse, self.specular, self.shininess)
    }
}

// ===== MATERIAL =====

/// Application-assigned material identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

pub struct Material {
    id: MaterialId,
    name: String,
    device: Arc<dyn GraphicsDevice>,
    vertex_shader: Arc<ShaderResource>,
    fragment_shader: Arc<ShaderResource>,
    sampler: SamplerHandle,
    layout: DescriptorSetLayout,
    textures: Vec<Texture>,
    parameters: BufferAllocation,
    buffer_infos: BTreeMap<u32, BufferBinding>,
    image_infos: BTreeMap<u32, ImageBinding>,
}

impl Material {
    /// Build a material from explicit parameters, shaders and images
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier used by render objects and pipelines
    /// * `allocator` - Uploads the parameter buffer and the textures
    /// * `vertex_shader` / `fragment_shader` - Must be compiled for their stage
    /// * `images` - One texture binding per image, in order
    /// * `parameters` - Content of the parameter buffer
    /// * `name` - Debug name
    pub fn new(
        id: MaterialId,
        allocator: &DeviceAllocator,
        vertex_shader: Arc<ShaderResource>,
        fragment_shader: Arc<ShaderResource>,
        images: &[Arc<ImageResource>],
        parameters: &MaterialParameters,
        name: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        check_stage(&name, &vertex_shader, ShaderStage::Vertex)?;
        check_stage(&name, &fragment_shader, ShaderStage::Fragment)?;

        let device = Arc::clone(allocator.device());
        let parameters = allocator.allocate_device_local_buffer_and_transfer(
            bytemuck::bytes_of(parameters),
            BufferUsage::UNIFORM,
        )?;
        let textures = images
            .iter()
            .map(|image| Texture::upload(allocator, image))
            .collect::<Result<Vec<_>>>()?;

        let layout = DescriptorSetLayout::new(Arc::clone(&device), layout_bindings(textures.len()))?;
        let sampler = device.create_sampler(&SamplerDesc::default())?;

        let buffer_infos = BTreeMap::from([(PARAMETER_BINDING, parameters.binding())]);
        let image_infos = textures
            .iter()
            .enumerate()
            .map(|(i, texture)| {
                (FIRST_TEXTURE_BINDING + i as u32, ImageBinding {
                    sampler,
                    view: texture.view(),
                    layout: ImageLayout::ShaderReadOnlyOptimal,
                })
            })
            .collect();

        engine_info!("lumen::Material", "Material {} '{}' created with {} textures", id.0, name, textures.len());

        Ok(Self {
            id,
            name,
            device,
            vertex_shader,
            fragment_shader,
            sampler,
            layout,
            textures,
            parameters,
            buffer_infos,
            image_infos,
        })
    }

    /// Build a material from a loaded `MaterialResource`
    ///
    /// Both shaders are required; textures are bound in `TextureRole` order.
    pub fn from_resource(id: MaterialId, allocator: &DeviceAllocator, resource: &MaterialResource) -> Result<Self> {
        let vertex_shader = required_shader(&resource.name, &resource.vertex_shader, "vertex")?;
        let fragment_shader = required_shader(&resource.name, &resource.fragment_shader, "fragment")?;
        let images: Vec<Arc<ImageResource>> = resource.textures.values().cloned().collect();

        Self::new(
            id,
            allocator,
            vertex_shader,
            fragment_shader,
            &images,
            &resource.parameters(),
            resource.name.clone(),
        )
    }

    pub fn id(&self) -> MaterialId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_shader(&self) -> &ShaderResource {
        &self.vertex_shader
    }

    pub fn fragment_shader(&self) -> &ShaderResource {
        &self.fragment_shader
    }

    pub fn sampler(&self) -> SamplerHandle {
        self.sampler
    }

    pub fn layout(&self) -> &DescriptorSetLayout {
        &self.layout
    }

    pub fn layout_bindings(&self) -> &[DescriptorSetLayoutBinding] {
        self.layout.signature()
    }

    /// Binding index -> parameter buffer range
    pub fn buffer_infos(&self) -> &BTreeMap<u32, BufferBinding> {
        &self.buffer_infos
    }

    /// Binding index -> texture view + sampler
    pub fn image_infos(&self) -> &BTreeMap<u32, ImageBinding> {
        &self.image_infos
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn parameter_buffer(&self) -> &BufferAllocation {
        &self.parameters
    }
}

impl Drop for Material {
    fn drop(&mut self) {
        self.device.destroy_sampler(self.sampler);
    }
}

// ===== INTERNAL =====

fn layout_bindings(texture_count: usize) -> Vec<DescriptorSetLayoutBinding> {
    let parameters = DescriptorSetLayoutBinding {
        binding: PARAMETER_BINDING,
        descriptor_type: DescriptorType::UniformBuffer,
        descriptor_count: 1,
        stage_flags: ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
    };
    let textures = (0..texture_count as u32).map(|i| DescriptorSetLayoutBinding {
        binding: FIRST_TEXTURE_BINDING + i,
        descriptor_type: DescriptorType::CombinedImageSampler,
        descriptor_count: 1,
        stage_flags: ShaderStageFlags::FRAGMENT,
    });
    std::iter::once(parameters).chain(textures).collect()
}

fn check_stage(material: &str, shader: &ShaderResource, expected: ShaderStage) -> Result<()> {
    if shader.stage() != expected {
        engine_error!("lumen::Material",
            "Material '{}': shader '{}' is a {:?} shader, expected {:?}", material, shader.name(), shader.stage(), expected);
        return Err(Error::ContractViolation(format!(
            "material '{}': shader '{}' has stage {:?}, expected {:?}", material, shader.name(), shader.stage(), expected
        )));
    }
    Ok(())
}

fn required_shader(material: &str, shader: &Option<Arc<ShaderResource>>, stage: &str) -> Result<Arc<ShaderResource>> {
    shader.clone().ok_or_else(|| {
        engine_error!("lumen::Material", "Material '{}' has no {} shader", material, stage);
        Error::ContractViolation(format!("material '{}' has no {} shader", material, stage))
    })
}

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;

/// Conversions between engine types and their Vulkan counterparts
///
/// Pure functions, no device access.

use ash::vk;
use gpu_allocator::MemoryLocation;
use lumen_engine::lumen::device::{
    AddressMode, BufferUsage, ColorSpace, CullMode, DescriptorType, Filter, Format, ImageLayout,
    ImageUsage, IndexType, MemoryProperties, PresentMode, ShaderStage, ShaderStageFlags,
};

// ===== FORMATS =====

pub fn format_to_vk(format: Format) -> vk::Format {
    match format {
        Format::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        Format::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        Format::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        Format::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        Format::D32_FLOAT => vk::Format::D32_SFLOAT,
        Format::D32_FLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
        Format::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        Format::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        Format::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
        Format::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        Format::Other(raw) => vk::Format::from_raw(raw),
    }
}

pub fn format_from_vk(format: vk::Format) -> Format {
    match format {
        vk::Format::R8G8B8A8_UNORM => Format::R8G8B8A8_UNORM,
        vk::Format::R8G8B8A8_SRGB => Format::R8G8B8A8_SRGB,
        vk::Format::B8G8R8A8_UNORM => Format::B8G8R8A8_UNORM,
        vk::Format::B8G8R8A8_SRGB => Format::B8G8R8A8_SRGB,
        vk::Format::D32_SFLOAT => Format::D32_FLOAT,
        vk::Format::D32_SFLOAT_S8_UINT => Format::D32_FLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT => Format::D24_UNORM_S8_UINT,
        vk::Format::R32G32_SFLOAT => Format::R32G32_SFLOAT,
        vk::Format::R32G32B32_SFLOAT => Format::R32G32B32_SFLOAT,
        vk::Format::R32G32B32A32_SFLOAT => Format::R32G32B32A32_SFLOAT,
        other => Format::Other(other.as_raw()),
    }
}

pub fn color_space_to_vk(color_space: ColorSpace) -> vk::ColorSpaceKHR {
    match color_space {
        ColorSpace::SrgbNonlinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ColorSpace::Other(raw) => vk::ColorSpaceKHR::from_raw(raw),
    }
}

pub fn color_space_from_vk(color_space: vk::ColorSpaceKHR) -> ColorSpace {
    match color_space {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => ColorSpace::SrgbNonlinear,
        other => ColorSpace::Other(other.as_raw()),
    }
}

pub fn present_mode_to_vk(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

/// None for present modes the engine does not use (shared refresh modes)
pub fn present_mode_from_vk(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

// ===== LAYOUTS AND ACCESS =====

pub fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::TransferDstOptimal => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::ShaderReadOnlyOptimal => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::ColorAttachmentOptimal => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachmentOptimal => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

/// Access mask and pipeline stage a layout is used with (barrier source or destination)
pub fn layout_access_and_stage(layout: ImageLayout) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        ImageLayout::Undefined => (vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE),
        ImageLayout::TransferDstOptimal => (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER),
        ImageLayout::ShaderReadOnlyOptimal => (vk::AccessFlags::SHADER_READ, vk::PipelineStageFlags::FRAGMENT_SHADER),
        ImageLayout::ColorAttachmentOptimal => (
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ),
        ImageLayout::DepthStencilAttachmentOptimal => (
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        ),
        ImageLayout::PresentSrc => (vk::AccessFlags::empty(), vk::PipelineStageFlags::BOTTOM_OF_PIPE),
    }
}

// ===== USAGE AND MEMORY =====

pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    for (engine, native) in [
        (BufferUsage::TRANSFER_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
        (BufferUsage::TRANSFER_DST, vk::BufferUsageFlags::TRANSFER_DST),
        (BufferUsage::UNIFORM, vk::BufferUsageFlags::UNIFORM_BUFFER),
        (BufferUsage::STORAGE, vk::BufferUsageFlags::STORAGE_BUFFER),
        (BufferUsage::INDEX, vk::BufferUsageFlags::INDEX_BUFFER),
        (BufferUsage::VERTEX, vk::BufferUsageFlags::VERTEX_BUFFER),
    ] {
        if usage.contains(engine) {
            flags |= native;
        }
    }
    flags
}

pub fn image_usage_to_vk(usage: ImageUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    for (engine, native) in [
        (ImageUsage::TRANSFER_SRC, vk::ImageUsageFlags::TRANSFER_SRC),
        (ImageUsage::TRANSFER_DST, vk::ImageUsageFlags::TRANSFER_DST),
        (ImageUsage::SAMPLED, vk::ImageUsageFlags::SAMPLED),
        (ImageUsage::COLOR_ATTACHMENT, vk::ImageUsageFlags::COLOR_ATTACHMENT),
        (ImageUsage::DEPTH_STENCIL_ATTACHMENT, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
    ] {
        if usage.contains(engine) {
            flags |= native;
        }
    }
    flags
}

/// gpu-allocator location for the requested memory properties
///
/// Host-visible memory the host reads back maps to GpuToCpu, any other
/// host-visible memory to CpuToGpu, everything else to GpuOnly.
pub fn memory_location(properties: MemoryProperties, host_reads: bool) -> MemoryLocation {
    if !properties.contains(MemoryProperties::HOST_VISIBLE) {
        MemoryLocation::GpuOnly
    } else if host_reads {
        MemoryLocation::GpuToCpu
    } else {
        MemoryLocation::CpuToGpu
    }
}

// ===== SHADERS AND DESCRIPTORS =====

pub fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
    }
}

pub fn stage_flags_to_vk(flags: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut vk_flags = vk::ShaderStageFlags::empty();
    if flags.contains(ShaderStageFlags::VERTEX) {
        vk_flags |= vk::ShaderStageFlags::VERTEX;
    }
    if flags.contains(ShaderStageFlags::FRAGMENT) {
        vk_flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    vk_flags
}

pub fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

// ===== FIXED FUNCTION =====

pub fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

pub fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;

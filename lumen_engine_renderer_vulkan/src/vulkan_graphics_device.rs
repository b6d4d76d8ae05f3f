/// VulkanGraphicsDevice - GraphicsDevice implementation on ash + gpu-allocator
///
/// Engine handles are the raw 64-bit Vulkan handles, except allocations which
/// are keys into the table of live gpu-allocator allocations.
/// Queue access (submit, present, wait idle) is serialized by one mutex.

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use lumen_engine::lumen::device::*;
use lumen_engine::lumen::{Config, Error, Result};
use lumen_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::vulkan_context::VulkanContext;
use crate::vulkan_format::*;

const SOURCE: &str = "lumen::vulkan";
const ENTRY_POINT: &std::ffi::CStr = c"main";

/// Depth formats tried in order by `find_depth_format`
const DEPTH_CANDIDATES: [Format; 3] = [Format::D32_FLOAT, Format::D32_FLOAT_S8_UINT, Format::D24_UNORM_S8_UINT];

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| engine_err!(SOURCE, "{} lock poisoned", what))
}

/// Vulkan implementation of the engine's device seam
pub struct VulkanGraphicsDevice {
    /// Taken in Drop so every memory block is freed before the device goes away
    allocator: Mutex<Option<Allocator>>,
    allocations: Mutex<FxHashMap<u64, Allocation>>,
    next_allocation: AtomicU64,
    queue_lock: Mutex<()>,
    context: VulkanContext,
}

impl VulkanGraphicsDevice {
    /// Create instance, surface, device and allocator for a window
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        let context = VulkanContext::new(window, config)?;

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: context.instance.clone(),
            device: context.device.clone(),
            physical_device: context.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| {
            engine_error!(SOURCE, "Failed to create GPU allocator: {:?}", e);
            Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
        })?;

        engine_info!(SOURCE, "Vulkan graphics device created");
        Ok(Self {
            allocator: Mutex::new(Some(allocator)),
            allocations: Mutex::new(FxHashMap::default()),
            next_allocation: AtomicU64::new(1),
            queue_lock: Mutex::new(()),
            context,
        })
    }

    fn device(&self) -> &ash::Device {
        &self.context.device
    }

    fn allocate(&self, desc: &AllocationCreateDesc<'_>) -> Result<AllocationHandle> {
        let mut allocator = lock(&self.allocator, "allocator")?;
        let allocator = allocator
            .as_mut()
            .ok_or_else(|| engine_err!(SOURCE, "Allocator already shut down"))?;
        let allocation = allocator.allocate(desc).map_err(|e| {
            engine_error!(SOURCE, "GPU allocation '{}' failed: {:?}", desc.name, e);
            Error::OutOfMemory
        })?;

        let key = self.next_allocation.fetch_add(1, Ordering::Relaxed);
        lock(&self.allocations, "allocation table")?.insert(key, allocation);
        Ok(AllocationHandle(key))
    }

    fn free(&self, allocation: AllocationHandle) {
        let removed = match self.allocations.lock() {
            Ok(mut allocations) => allocations.remove(&allocation.0),
            Err(_) => None,
        };
        let Some(removed) = removed else {
            engine_warn!(SOURCE, "Free of unknown allocation {}", allocation.0);
            return;
        };
        if let Ok(mut allocator) = self.allocator.lock() {
            if let Some(allocator) = allocator.as_mut() {
                if let Err(e) = allocator.free(removed) {
                    engine_error!(SOURCE, "Failed to free allocation {}: {:?}", allocation.0, e);
                }
            }
        }
    }

    fn allocation_request(
        name: &str,
        requirements: vk::MemoryRequirements,
        memory: MemoryProperties,
        flags: AllocationFlags,
        linear: bool,
        dedicated: AllocationScheme,
    ) -> AllocationCreateDesc<'_> {
        AllocationCreateDesc {
            name,
            requirements,
            location: memory_location(memory, flags.contains(AllocationFlags::HOST_ACCESS_RANDOM)),
            linear,
            allocation_scheme: if flags.contains(AllocationFlags::DEDICATED) {
                dedicated
            } else {
                AllocationScheme::GpuAllocatorManaged
            },
        }
    }

    /// Run `f` on the mapped bytes of an allocation
    fn with_mapped<R>(
        &self,
        allocation: AllocationHandle,
        offset: u64,
        len: usize,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R> {
        let mut allocations = lock(&self.allocations, "allocation table")?;
        let entry = allocations
            .get_mut(&allocation.0)
            .ok_or_else(|| Error::InvalidResource(format!("Unknown allocation {}", allocation.0)))?;
        let mapped = entry
            .mapped_slice_mut()
            .ok_or_else(|| Error::InvalidResource(format!("Allocation {} is not host visible", allocation.0)))?;

        let start = offset as usize;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= mapped.len())
            .ok_or_else(|| {
                Error::ContractViolation(format!(
                    "Mapped access {}..{} outside allocation of {} bytes",
                    start,
                    start + len,
                    mapped.len()
                ))
            })?;
        Ok(f(&mut mapped[start..end]))
    }
}

fn cb(handle: CommandBufferHandle) -> vk::CommandBuffer {
    vk::CommandBuffer::from_raw(handle.0)
}

fn extent_to_vk(extent: Extent2D) -> vk::Extent2D {
    vk::Extent2D { width: extent.width, height: extent.height }
}

fn extent_from_vk(extent: vk::Extent2D) -> Extent2D {
    Extent2D::new(extent.width, extent.height)
}

fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    // ===== BUFFERS AND IMAGES =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<(BufferHandle, AllocationHandle)> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = self.device()
                .create_buffer(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create buffer '{}': {:?}", desc.name, e))?;

            let requirements = self.device().get_buffer_memory_requirements(buffer);
            let request = Self::allocation_request(
                &desc.name,
                requirements,
                desc.memory,
                desc.flags,
                true,
                AllocationScheme::DedicatedBuffer(buffer),
            );
            let allocation = match self.allocate(&request) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device().destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            let bound = {
                let allocations = lock(&self.allocations, "allocation table")?;
                match allocations.get(&allocation.0) {
                    Some(memory) => self.device().bind_buffer_memory(buffer, memory.memory(), memory.offset()),
                    None => Err(vk::Result::ERROR_UNKNOWN),
                }
            };
            if let Err(e) = bound {
                self.free(allocation);
                self.device().destroy_buffer(buffer, None);
                engine_bail!(SOURCE, "Failed to bind buffer memory for '{}': {:?}", desc.name, e);
            }

            engine_debug!(SOURCE, "Created buffer '{}' ({} bytes)", desc.name, desc.size);
            Ok((BufferHandle(buffer.as_raw()), allocation))
        }
    }

    fn destroy_buffer(&self, buffer: BufferHandle, allocation: AllocationHandle) {
        unsafe {
            self.device().destroy_buffer(vk::Buffer::from_raw(buffer.0), None);
        }
        self.free(allocation);
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<(ImageHandle, AllocationHandle)> {
        unsafe {
            let create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format_to_vk(desc.format))
                .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(image_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = self.device()
                .create_image(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create image '{}': {:?}", desc.name, e))?;

            let requirements = self.device().get_image_memory_requirements(image);
            let request = Self::allocation_request(
                &desc.name,
                requirements,
                desc.memory,
                desc.flags,
                false,
                AllocationScheme::DedicatedImage(image),
            );
            let allocation = match self.allocate(&request) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device().destroy_image(image, None);
                    return Err(e);
                }
            };

            let bound = {
                let allocations = lock(&self.allocations, "allocation table")?;
                match allocations.get(&allocation.0) {
                    Some(memory) => self.device().bind_image_memory(image, memory.memory(), memory.offset()),
                    None => Err(vk::Result::ERROR_UNKNOWN),
                }
            };
            if let Err(e) = bound {
                self.free(allocation);
                self.device().destroy_image(image, None);
                engine_bail!(SOURCE, "Failed to bind image memory for '{}': {:?}", desc.name, e);
            }

            engine_debug!(SOURCE, "Created image '{}' ({}x{} {:?})", desc.name, desc.width, desc.height, desc.format);
            Ok((ImageHandle(image.as_raw()), allocation))
        }
    }

    fn destroy_image(&self, image: ImageHandle, allocation: AllocationHandle) {
        unsafe {
            self.device().destroy_image(vk::Image::from_raw(image.0), None);
        }
        self.free(allocation);
    }

    fn write_mapped(&self, allocation: AllocationHandle, offset: u64, data: &[u8]) -> Result<()> {
        self.with_mapped(allocation, offset, data.len(), |mapped| mapped.copy_from_slice(data))
    }

    fn read_mapped(&self, allocation: AllocationHandle, offset: u64, out: &mut [u8]) -> Result<()> {
        self.with_mapped(allocation, offset, out.len(), |mapped| out.copy_from_slice(mapped))
    }

    fn create_image_view(&self, desc: &ImageViewDesc) -> Result<ImageViewHandle> {
        let aspect_mask = match desc.aspect {
            ImageAspect::Color => vk::ImageAspectFlags::COLOR,
            ImageAspect::Depth => vk::ImageAspectFlags::DEPTH,
        };
        let create_info = vk::ImageViewCreateInfo::default()
            .image(vk::Image::from_raw(desc.image.0))
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format_to_vk(desc.format))
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange { aspect_mask, ..color_subresource_range() });

        let view = unsafe { self.device().create_image_view(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create image view: {:?}", e))?;
        Ok(ImageViewHandle(view.as_raw()))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        unsafe { self.device().destroy_image_view(vk::ImageView::from_raw(view.0), None) }
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        let address_mode = address_mode_to_vk(desc.address_mode);
        let anisotropy = desc.max_anisotropy.filter(|_| self.context.sampler_anisotropy);
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(anisotropy.is_some())
            .max_anisotropy(anisotropy.unwrap_or(1.0))
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .compare_op(vk::CompareOp::ALWAYS)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = unsafe { self.device().create_sampler(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create sampler: {:?}", e))?;
        Ok(SamplerHandle(sampler.as_raw()))
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        unsafe { self.device().destroy_sampler(vk::Sampler::from_raw(sampler.0), None) }
    }

    fn find_depth_format(&self) -> Result<Format> {
        for candidate in DEPTH_CANDIDATES {
            let properties = unsafe {
                self.context.instance.get_physical_device_format_properties(
                    self.context.physical_device,
                    format_to_vk(candidate),
                )
            };
            if properties
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
            {
                engine_debug!(SOURCE, "Depth format: {:?}", candidate);
                return Ok(candidate);
            }
        }
        engine_error!(SOURCE, "No supported depth format");
        Err(Error::InitializationFailed("No supported depth format".to_string()))
    }

    // ===== COMMAND BUFFERS =====

    fn create_command_pool(&self, flags: CommandPoolFlags) -> Result<CommandPoolHandle> {
        let mut vk_flags = vk::CommandPoolCreateFlags::empty();
        if flags.contains(CommandPoolFlags::TRANSIENT) {
            vk_flags |= vk::CommandPoolCreateFlags::TRANSIENT;
        }
        if flags.contains(CommandPoolFlags::RESET_COMMAND_BUFFER) {
            vk_flags |= vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER;
        }
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.context.queue_families.graphics)
            .flags(vk_flags);

        let pool = unsafe { self.device().create_command_pool(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create command pool: {:?}", e))?;
        Ok(CommandPoolHandle(pool.as_raw()))
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        unsafe { self.device().destroy_command_pool(vk::CommandPool::from_raw(pool.0), None) }
    }

    fn allocate_command_buffer(&self, pool: CommandPoolHandle) -> Result<CommandBufferHandle> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(vk::CommandPool::from_raw(pool.0))
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { self.device().allocate_command_buffers(&allocate_info) }
            .map_err(|e| engine_err!(SOURCE, "Failed to allocate command buffer: {:?}", e))?;
        buffers
            .into_iter()
            .next()
            .map(|buffer| CommandBufferHandle(buffer.as_raw()))
            .ok_or_else(|| engine_err!(SOURCE, "Driver returned no command buffer"))
    }

    fn free_command_buffer(&self, pool: CommandPoolHandle, command_buffer: CommandBufferHandle) {
        unsafe {
            self.device()
                .free_command_buffers(vk::CommandPool::from_raw(pool.0), &[cb(command_buffer)])
        }
    }

    fn begin_command_buffer(&self, command_buffer: CommandBufferHandle, one_time_submit: bool) -> Result<()> {
        let flags = if one_time_submit {
            vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT
        } else {
            vk::CommandBufferUsageFlags::empty()
        };
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
        unsafe { self.device().begin_command_buffer(cb(command_buffer), &begin_info) }
            .map_err(|e| engine_err!(SOURCE, "Failed to begin command buffer: {:?}", e))
    }

    fn end_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        unsafe { self.device().end_command_buffer(cb(command_buffer)) }
            .map_err(|e| engine_err!(SOURCE, "Failed to end command buffer: {:?}", e))
    }

    fn reset_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        unsafe {
            self.device()
                .reset_command_buffer(cb(command_buffer), vk::CommandBufferResetFlags::empty())
        }
        .map_err(|e| engine_err!(SOURCE, "Failed to reset command buffer: {:?}", e))
    }

    // ===== COMMAND RECORDING =====

    fn cmd_copy_buffer(&self, command_buffer: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, region: BufferCopy) {
        let region = vk::BufferCopy {
            src_offset: region.src_offset,
            dst_offset: region.dst_offset,
            size: region.size,
        };
        unsafe {
            self.device().cmd_copy_buffer(
                cb(command_buffer),
                vk::Buffer::from_raw(src.0),
                vk::Buffer::from_raw(dst.0),
                &[region],
            )
        }
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: CommandBufferHandle,
        src: BufferHandle,
        dst: ImageHandle,
        extent: Extent2D,
    ) {
        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D::default())
            .image_extent(vk::Extent3D { width: extent.width, height: extent.height, depth: 1 });
        unsafe {
            self.device().cmd_copy_buffer_to_image(
                cb(command_buffer),
                vk::Buffer::from_raw(src.0),
                vk::Image::from_raw(dst.0),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            )
        }
    }

    fn cmd_transition_image_layout(
        &self,
        command_buffer: CommandBufferHandle,
        image: ImageHandle,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) {
        let (src_access, src_stage) = layout_access_and_stage(old_layout);
        let (dst_access, dst_stage) = layout_access_and_stage(new_layout);
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(image_layout_to_vk(old_layout))
            .new_layout(image_layout_to_vk(new_layout))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(vk::Image::from_raw(image.0))
            .subresource_range(color_subresource_range())
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);
        unsafe {
            self.device().cmd_pipeline_barrier(
                cb(command_buffer),
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            )
        }
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: CommandBufferHandle,
        render_pass: RenderPassHandle,
        framebuffer: FramebufferHandle,
        extent: Extent2D,
        clear_values: &[ClearValue],
    ) {
        let clear_values: Vec<vk::ClearValue> = clear_values
            .iter()
            .map(|value| match *value {
                ClearValue::Color(float32) => vk::ClearValue {
                    color: vk::ClearColorValue { float32 },
                },
                ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
                },
            })
            .collect();

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk::RenderPass::from_raw(render_pass.0))
            .framebuffer(vk::Framebuffer::from_raw(framebuffer.0))
            .render_area(vk::Rect2D { offset: vk::Offset2D::default(), extent: extent_to_vk(extent) })
            .clear_values(&clear_values);
        unsafe {
            self.device()
                .cmd_begin_render_pass(cb(command_buffer), &begin_info, vk::SubpassContents::INLINE)
        }
    }

    fn cmd_end_render_pass(&self, command_buffer: CommandBufferHandle) {
        unsafe { self.device().cmd_end_render_pass(cb(command_buffer)) }
    }

    fn cmd_set_viewport(&self, command_buffer: CommandBufferHandle, viewport: Viewport) {
        let viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe { self.device().cmd_set_viewport(cb(command_buffer), 0, &[viewport]) }
    }

    fn cmd_set_scissor(&self, command_buffer: CommandBufferHandle, scissor: Rect2D) {
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe { self.device().cmd_set_scissor(cb(command_buffer), 0, &[scissor]) }
    }

    fn cmd_bind_pipeline(&self, command_buffer: CommandBufferHandle, pipeline: PipelineHandle) {
        unsafe {
            self.device().cmd_bind_pipeline(
                cb(command_buffer),
                vk::PipelineBindPoint::GRAPHICS,
                vk::Pipeline::from_raw(pipeline.0),
            )
        }
    }

    fn cmd_bind_descriptor_set(
        &self,
        command_buffer: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
    ) {
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                cb(command_buffer),
                vk::PipelineBindPoint::GRAPHICS,
                vk::PipelineLayout::from_raw(layout.0),
                set_index,
                &[vk::DescriptorSet::from_raw(set.0)],
                &[],
            )
        }
    }

    fn cmd_bind_vertex_buffer(&self, command_buffer: CommandBufferHandle, buffer: BufferHandle, offset: u64) {
        unsafe {
            self.device()
                .cmd_bind_vertex_buffers(cb(command_buffer), 0, &[vk::Buffer::from_raw(buffer.0)], &[offset])
        }
    }

    fn cmd_bind_index_buffer(&self, command_buffer: CommandBufferHandle, buffer: BufferHandle, offset: u64, index_type: IndexType) {
        unsafe {
            self.device().cmd_bind_index_buffer(
                cb(command_buffer),
                vk::Buffer::from_raw(buffer.0),
                offset,
                index_type_to_vk(index_type),
            )
        }
    }

    fn cmd_push_constants(
        &self,
        command_buffer: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device().cmd_push_constants(
                cb(command_buffer),
                vk::PipelineLayout::from_raw(layout.0),
                stage_flags_to_vk(stages),
                offset,
                data,
            )
        }
    }

    fn cmd_draw_indexed(&self, command_buffer: CommandBufferHandle, index_count: u32, instance_count: u32) {
        unsafe {
            self.device()
                .cmd_draw_indexed(cb(command_buffer), index_count, instance_count, 0, 0, 0)
        }
    }

    // ===== QUEUE AND SYNCHRONIZATION =====

    fn queue_submit(&self, submit: &SubmitDesc<'_>) -> Result<()> {
        let command_buffers: Vec<vk::CommandBuffer> = submit.command_buffers.iter().map(|&c| cb(c)).collect();
        let wait_semaphores: Vec<vk::Semaphore> =
            submit.wait_semaphores.iter().map(|s| vk::Semaphore::from_raw(s.0)).collect();
        let wait_stages = vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; wait_semaphores.len()];
        let signal_semaphores: Vec<vk::Semaphore> =
            submit.signal_semaphores.iter().map(|s| vk::Semaphore::from_raw(s.0)).collect();
        let fence = submit
            .fence
            .map(|f| vk::Fence::from_raw(f.0))
            .unwrap_or(vk::Fence::null());

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let _queue = lock(&self.queue_lock, "queue")?;
        unsafe { self.device().queue_submit(self.context.graphics_queue, &[submit_info], fence) }
            .map_err(|e| engine_err!(SOURCE, "Failed to submit command buffers: {:?}", e))
    }

    fn queue_wait_idle(&self) -> Result<()> {
        let _queue = lock(&self.queue_lock, "queue")?;
        unsafe { self.device().queue_wait_idle(self.context.graphics_queue) }
            .map_err(|e| engine_err!(SOURCE, "Failed to wait for graphics queue: {:?}", e))
    }

    fn device_wait_idle(&self) -> Result<()> {
        let _queue = lock(&self.queue_lock, "queue")?;
        unsafe { self.device().device_wait_idle() }
            .map_err(|e| engine_err!(SOURCE, "Failed to wait idle: {:?}", e))
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let semaphore = unsafe { self.device().create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create semaphore: {:?}", e))?;
        Ok(SemaphoreHandle(semaphore.as_raw()))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        unsafe { self.device().destroy_semaphore(vk::Semaphore::from_raw(semaphore.0), None) }
    }

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { self.device().create_fence(&vk::FenceCreateInfo::default().flags(flags), None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create fence: {:?}", e))?;
        Ok(FenceHandle(fence.as_raw()))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        unsafe { self.device().destroy_fence(vk::Fence::from_raw(fence.0), None) }
    }

    fn wait_for_fence(&self, fence: FenceHandle) -> Result<()> {
        unsafe {
            self.device()
                .wait_for_fences(&[vk::Fence::from_raw(fence.0)], true, u64::MAX)
        }
        .map_err(|e| engine_err!(SOURCE, "Failed to wait for fence: {:?}", e))
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        unsafe { self.device().reset_fences(&[vk::Fence::from_raw(fence.0)]) }
            .map_err(|e| engine_err!(SOURCE, "Failed to reset fence: {:?}", e))
    }

    fn fence_signaled(&self, fence: FenceHandle) -> Result<bool> {
        unsafe { self.device().get_fence_status(vk::Fence::from_raw(fence.0)) }
            .map_err(|e| engine_err!(SOURCE, "Failed to query fence: {:?}", e))
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorSetLayoutBinding]) -> Result<DescriptorSetLayoutHandle> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(descriptor_type_to_vk(binding.descriptor_type))
                    .descriptor_count(binding.descriptor_count)
                    .stage_flags(stage_flags_to_vk(binding.stage_flags))
            })
            .collect();
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);

        let layout = unsafe { self.device().create_descriptor_set_layout(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create descriptor set layout: {:?}", e))?;
        Ok(DescriptorSetLayoutHandle(layout.as_raw()))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        unsafe {
            self.device()
                .destroy_descriptor_set_layout(vk::DescriptorSetLayout::from_raw(layout.0), None)
        }
    }

    fn create_descriptor_pool(&self, max_sets: u32, sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .map(|size| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(size.descriptor_type),
                descriptor_count: size.count,
            })
            .collect();
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { self.device().create_descriptor_pool(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create descriptor pool: {:?}", e))?;
        Ok(DescriptorPoolHandle(pool.as_raw()))
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        unsafe {
            self.device()
                .destroy_descriptor_pool(vk::DescriptorPool::from_raw(pool.0), None)
        }
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<Option<DescriptorSetHandle>> {
        let layouts = [vk::DescriptorSetLayout::from_raw(layout.0)];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(vk::DescriptorPool::from_raw(pool.0))
            .set_layouts(&layouts);

        match unsafe { self.device().allocate_descriptor_sets(&allocate_info) } {
            Ok(sets) => Ok(sets.first().map(|set| DescriptorSetHandle(set.as_raw()))),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => Ok(None),
            Err(e) => Err(engine_err!(SOURCE, "Failed to allocate descriptor set: {:?}", e)),
        }
    }

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) {
        let buffer_infos: Vec<vk::DescriptorBufferInfo> = writes
            .iter()
            .filter_map(|write| match write.resource {
                DescriptorResource::Buffer(binding) => Some(vk::DescriptorBufferInfo {
                    buffer: vk::Buffer::from_raw(binding.buffer.0),
                    offset: binding.offset,
                    range: binding.range,
                }),
                DescriptorResource::Image(_) => None,
            })
            .collect();
        let image_infos: Vec<vk::DescriptorImageInfo> = writes
            .iter()
            .filter_map(|write| match write.resource {
                DescriptorResource::Image(binding) => Some(vk::DescriptorImageInfo {
                    sampler: vk::Sampler::from_raw(binding.sampler.0),
                    image_view: vk::ImageView::from_raw(binding.view.0),
                    image_layout: image_layout_to_vk(binding.layout),
                }),
                DescriptorResource::Buffer(_) => None,
            })
            .collect();

        let dst_set = vk::DescriptorSet::from_raw(set.0);
        let (mut next_buffer, mut next_image) = (0, 0);
        let mut vk_writes = Vec::with_capacity(writes.len());
        for write in writes {
            let base = vk::WriteDescriptorSet::default()
                .dst_set(dst_set)
                .dst_binding(write.binding)
                .dst_array_element(0);
            let vk_write = match write.resource {
                DescriptorResource::Buffer(_) => {
                    next_buffer += 1;
                    base.descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(&buffer_infos[next_buffer - 1..next_buffer])
                }
                DescriptorResource::Image(_) => {
                    next_image += 1;
                    base.descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(&image_infos[next_image - 1..next_image])
                }
            };
            vk_writes.push(vk_write);
        }

        unsafe { self.device().update_descriptor_sets(&vk_writes, &[]) }
    }

    // ===== SHADERS AND PIPELINES =====

    fn create_shader_module(&self, code: &[u32], stage: ShaderStage) -> Result<ShaderModuleHandle> {
        let entry_points = spirq::ReflectConfig::new()
            .spv(code)
            .ref_all_rscs(true)
            .reflect()
            .map_err(|e| {
                engine_error!(SOURCE, "SPIR-V reflection failed for {:?} shader: {:?}", stage, e);
                Error::InvalidResource(format!("Invalid SPIR-V for {:?} shader: {:?}", stage, e))
            })?;

        let Some(entry) = entry_points.iter().find(|entry| entry.name == "main") else {
            engine_error!(SOURCE, "{:?} shader has no 'main' entry point", stage);
            return Err(Error::InvalidResource(format!("{:?} shader has no 'main' entry point", stage)));
        };
        engine_debug!(SOURCE, "{:?} shader 'main' references {} resource(s)", stage, entry.vars.len());

        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe { self.device().create_shader_module(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create shader module: {:?}", e))?;
        Ok(ShaderModuleHandle(module.as_raw()))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        unsafe {
            self.device()
                .destroy_shader_module(vk::ShaderModule::from_raw(module.0), None)
        }
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle> {
        let set_layouts: Vec<vk::DescriptorSetLayout> = desc
            .set_layouts
            .iter()
            .map(|layout| vk::DescriptorSetLayout::from_raw(layout.0))
            .collect();
        let push_constant_ranges: Vec<vk::PushConstantRange> = desc
            .push_constant_ranges
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: stage_flags_to_vk(range.stages),
                offset: range.offset,
                size: range.size,
            })
            .collect();
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        let layout = unsafe { self.device().create_pipeline_layout(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create pipeline layout: {:?}", e))?;
        Ok(PipelineLayoutHandle(layout.as_raw()))
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        unsafe {
            self.device()
                .destroy_pipeline_layout(vk::PipelineLayout::from_raw(layout.0), None)
        }
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle> {
        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(shader_stage_to_vk(ShaderStage::Vertex))
                .module(vk::ShaderModule::from_raw(desc.vertex_shader.0))
                .name(ENTRY_POINT),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(shader_stage_to_vk(ShaderStage::Fragment))
                .module(vk::ShaderModule::from_raw(desc.fragment_shader.0))
                .name(ENTRY_POINT),
        ];

        let bindings = [vk::VertexInputBindingDescription {
            binding: 0,
            stride: desc.vertex_input.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }];
        let attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_input
            .attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: 0,
                format: format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(cull_mode_to_vk(desc.cull_mode))
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_test)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(vk::PipelineLayout::from_raw(desc.layout.0))
            .render_pass(vk::RenderPass::from_raw(desc.render_pass.0))
            .subpass(0);

        let pipelines = unsafe {
            self.device()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        }
        .map_err(|(_, e)| engine_err!(SOURCE, "Failed to create graphics pipeline: {:?}", e))?;

        pipelines
            .into_iter()
            .next()
            .map(|pipeline| PipelineHandle(pipeline.as_raw()))
            .ok_or_else(|| engine_err!(SOURCE, "Driver returned no pipeline"))
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        unsafe { self.device().destroy_pipeline(vk::Pipeline::from_raw(pipeline.0), None) }
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<RenderPassHandle> {
        let attachments = [
            vk::AttachmentDescription::default()
                .format(format_to_vk(desc.color_format))
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            vk::AttachmentDescription::default()
                .format(format_to_vk(desc.depth_format))
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)];

        let attachment_stages =
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(attachment_stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(attachment_stages)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { self.device().create_render_pass(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create render pass: {:?}", e))?;
        Ok(RenderPassHandle(render_pass.as_raw()))
    }

    fn destroy_render_pass(&self, render_pass: RenderPassHandle) {
        unsafe {
            self.device()
                .destroy_render_pass(vk::RenderPass::from_raw(render_pass.0), None)
        }
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<FramebufferHandle> {
        let attachments: Vec<vk::ImageView> = desc
            .attachments
            .iter()
            .map(|view| vk::ImageView::from_raw(view.0))
            .collect();
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(vk::RenderPass::from_raw(desc.render_pass.0))
            .attachments(&attachments)
            .width(desc.extent.width)
            .height(desc.extent.height)
            .layers(1);

        let framebuffer = unsafe { self.device().create_framebuffer(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create framebuffer: {:?}", e))?;
        Ok(FramebufferHandle(framebuffer.as_raw()))
    }

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) {
        unsafe {
            self.device()
                .destroy_framebuffer(vk::Framebuffer::from_raw(framebuffer.0), None)
        }
    }

    // ===== PRESENTATION =====

    fn surface_support(&self) -> Result<SurfaceSupport> {
        let loader = &self.context.surface_loader;
        let (physical_device, surface) = (self.context.physical_device, self.context.surface);
        unsafe {
            let capabilities = loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(|e| engine_err!(SOURCE, "Failed to query surface capabilities: {:?}", e))?;
            let formats = loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(|e| engine_err!(SOURCE, "Failed to query surface formats: {:?}", e))?;
            let present_modes = loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(|e| engine_err!(SOURCE, "Failed to query present modes: {:?}", e))?;

            // u32::MAX means the swapchain decides its own size
            let current_extent = if capabilities.current_extent.width == u32::MAX {
                None
            } else {
                Some(extent_from_vk(capabilities.current_extent))
            };

            Ok(SurfaceSupport {
                capabilities: SurfaceCapabilities {
                    min_image_count: capabilities.min_image_count,
                    max_image_count: capabilities.max_image_count,
                    current_extent,
                    min_image_extent: extent_from_vk(capabilities.min_image_extent),
                    max_image_extent: extent_from_vk(capabilities.max_image_extent),
                },
                formats: formats
                    .iter()
                    .map(|format| SurfaceFormat {
                        format: format_from_vk(format.format),
                        color_space: color_space_from_vk(format.color_space),
                    })
                    .collect(),
                present_modes: present_modes.into_iter().filter_map(present_mode_from_vk).collect(),
            })
        }
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<SwapchainHandle> {
        let capabilities = unsafe {
            self.context
                .surface_loader
                .get_physical_device_surface_capabilities(self.context.physical_device, self.context.surface)
        }
        .map_err(|e| engine_err!(SOURCE, "Failed to query surface capabilities: {:?}", e))?;

        let families = self.context.queue_families;
        let family_indices = families.unique();
        let sharing_mode = if family_indices.len() > 1 {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.context.surface)
            .min_image_count(desc.image_count)
            .image_format(format_to_vk(desc.surface_format.format))
            .image_color_space(color_space_to_vk(desc.surface_format.color_space))
            .image_extent(extent_to_vk(desc.extent))
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode_to_vk(desc.present_mode))
            .clipped(true)
            .old_swapchain(
                desc.old_swapchain
                    .map(|old| vk::SwapchainKHR::from_raw(old.0))
                    .unwrap_or(vk::SwapchainKHR::null()),
            );
        if sharing_mode == vk::SharingMode::CONCURRENT {
            create_info = create_info.queue_family_indices(&family_indices);
        }

        let swapchain = unsafe { self.context.swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create swapchain: {:?}", e))?;
        engine_info!(SOURCE, "Swapchain created: {}x{}, {} images, {:?}",
            desc.extent.width, desc.extent.height, desc.image_count, desc.present_mode);
        Ok(SwapchainHandle(swapchain.as_raw()))
    }

    fn destroy_swapchain(&self, swapchain: SwapchainHandle) {
        unsafe {
            self.context
                .swapchain_loader
                .destroy_swapchain(vk::SwapchainKHR::from_raw(swapchain.0), None)
        }
    }

    fn swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<ImageHandle>> {
        let images = unsafe {
            self.context
                .swapchain_loader
                .get_swapchain_images(vk::SwapchainKHR::from_raw(swapchain.0))
        }
        .map_err(|e| engine_err!(SOURCE, "Failed to get swapchain images: {:?}", e))?;
        Ok(images.into_iter().map(|image| ImageHandle(image.as_raw())).collect())
    }

    fn acquire_next_image(&self, swapchain: SwapchainHandle, signal: SemaphoreHandle) -> Result<AcquireOutcome> {
        let result = unsafe {
            self.context.swapchain_loader.acquire_next_image(
                vk::SwapchainKHR::from_raw(swapchain.0),
                u64::MAX,
                vk::Semaphore::from_raw(signal.0),
                vk::Fence::null(),
            )
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(engine_err!(SOURCE, "Failed to acquire swapchain image: {:?}", e)),
        }
    }

    fn queue_present(
        &self,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait_semaphores: &[SemaphoreHandle],
    ) -> Result<PresentOutcome> {
        let wait_semaphores: Vec<vk::Semaphore> =
            wait_semaphores.iter().map(|s| vk::Semaphore::from_raw(s.0)).collect();
        let swapchains = [vk::SwapchainKHR::from_raw(swapchain.0)];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let _queue = lock(&self.queue_lock, "queue")?;
        let result = unsafe {
            self.context
                .swapchain_loader
                .queue_present(self.context.present_queue, &present_info)
        };
        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(engine_err!(SOURCE, "Failed to present: {:?}", e)),
        }
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.context.device.device_wait_idle().ok();
        }

        // Free leftover memory blocks, then the allocator, while the device is alive
        let leftover: Vec<Allocation> = match self.allocations.get_mut() {
            Ok(allocations) => allocations.drain().map(|(_, allocation)| allocation).collect(),
            Err(_) => Vec::new(),
        };
        if let Ok(allocator) = self.allocator.get_mut() {
            if !leftover.is_empty() {
                engine_warn!(SOURCE, "{} allocation(s) still alive at shutdown", leftover.len());
            }
            if let Some(allocator) = allocator.as_mut() {
                for allocation in leftover {
                    allocator.free(allocation).ok();
                }
            }
            allocator.take();
        }
        engine_info!(SOURCE, "Vulkan graphics device destroyed");
    }
}

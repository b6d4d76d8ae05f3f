/// GraphicsDevice trait - the seam between the engine core and a GPU backend
///
/// Every method takes `&self`: backends synchronize internally, callers own
/// the handles they get back and must destroy them exactly once.
/// `cmd_*` methods record into a command buffer that is in the recording state
/// and cannot fail at record time.

use crate::error::Result;
use crate::graphics_device::types::*;

pub trait GraphicsDevice: Send + Sync {
    // ===== BUFFERS AND IMAGES =====

    /// Create a buffer together with its backing memory
    fn create_buffer(&self, desc: &BufferDesc) -> Result<(BufferHandle, AllocationHandle)>;

    /// Destroy a buffer and release its memory
    fn destroy_buffer(&self, buffer: BufferHandle, allocation: AllocationHandle);

    /// Create a 2D image together with its backing memory
    fn create_image(&self, desc: &ImageDesc) -> Result<(ImageHandle, AllocationHandle)>;

    /// Destroy an image and release its memory
    fn destroy_image(&self, image: ImageHandle, allocation: AllocationHandle);

    /// Copy bytes into host-visible memory
    ///
    /// # Arguments
    ///
    /// * `allocation` - Mapped allocation
    /// * `offset` - Byte offset into the allocation
    /// * `data` - Bytes to write
    fn write_mapped(&self, allocation: AllocationHandle, offset: u64, data: &[u8]) -> Result<()>;

    /// Copy bytes out of host-visible memory
    fn read_mapped(&self, allocation: AllocationHandle, offset: u64, out: &mut [u8]) -> Result<()>;

    fn create_image_view(&self, desc: &ImageViewDesc) -> Result<ImageViewHandle>;
    fn destroy_image_view(&self, view: ImageViewHandle);

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle>;
    fn destroy_sampler(&self, sampler: SamplerHandle);

    /// First depth format usable as an optimal-tiling depth attachment
    fn find_depth_format(&self) -> Result<Format>;

    // ===== COMMAND BUFFERS =====

    fn create_command_pool(&self, flags: CommandPoolFlags) -> Result<CommandPoolHandle>;
    fn destroy_command_pool(&self, pool: CommandPoolHandle);

    /// Allocate one primary command buffer
    fn allocate_command_buffer(&self, pool: CommandPoolHandle) -> Result<CommandBufferHandle>;
    fn free_command_buffer(&self, pool: CommandPoolHandle, command_buffer: CommandBufferHandle);

    fn begin_command_buffer(&self, command_buffer: CommandBufferHandle, one_time_submit: bool) -> Result<()>;
    fn end_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()>;
    fn reset_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()>;

    // ===== COMMAND RECORDING =====

    fn cmd_copy_buffer(&self, command_buffer: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, region: BufferCopy);

    /// Copy tightly packed texels into the whole first mip of a 2D image
    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: CommandBufferHandle,
        src: BufferHandle,
        dst: ImageHandle,
        extent: Extent2D,
    );

    /// Color image layout transition (pipeline barrier)
    fn cmd_transition_image_layout(
        &self,
        command_buffer: CommandBufferHandle,
        image: ImageHandle,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    );

    fn cmd_begin_render_pass(
        &self,
        command_buffer: CommandBufferHandle,
        render_pass: RenderPassHandle,
        framebuffer: FramebufferHandle,
        extent: Extent2D,
        clear_values: &[ClearValue],
    );
    fn cmd_end_render_pass(&self, command_buffer: CommandBufferHandle);
    fn cmd_set_viewport(&self, command_buffer: CommandBufferHandle, viewport: Viewport);
    fn cmd_set_scissor(&self, command_buffer: CommandBufferHandle, scissor: Rect2D);
    fn cmd_bind_pipeline(&self, command_buffer: CommandBufferHandle, pipeline: PipelineHandle);
    fn cmd_bind_descriptor_set(
        &self,
        command_buffer: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
    );
    fn cmd_bind_vertex_buffer(&self, command_buffer: CommandBufferHandle, buffer: BufferHandle, offset: u64);
    fn cmd_bind_index_buffer(&self, command_buffer: CommandBufferHandle, buffer: BufferHandle, offset: u64, index_type: IndexType);
    fn cmd_push_constants(
        &self,
        command_buffer: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );
    fn cmd_draw_indexed(&self, command_buffer: CommandBufferHandle, index_count: u32, instance_count: u32);

    // ===== QUEUE AND SYNCHRONIZATION =====

    /// Submit command buffers to the graphics queue
    fn queue_submit(&self, submit: &SubmitDesc<'_>) -> Result<()>;

    /// Block until the graphics queue is idle
    fn queue_wait_idle(&self) -> Result<()>;

    /// Block until the whole device is idle
    fn device_wait_idle(&self) -> Result<()>;

    fn create_semaphore(&self) -> Result<SemaphoreHandle>;
    fn destroy_semaphore(&self, semaphore: SemaphoreHandle);

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle>;
    fn destroy_fence(&self, fence: FenceHandle);

    /// Block until the fence is signaled (no timeout)
    fn wait_for_fence(&self, fence: FenceHandle) -> Result<()>;

    /// Return the fence to the unsignaled state
    fn reset_fence(&self, fence: FenceHandle) -> Result<()>;

    /// Non-blocking signaled check
    fn fence_signaled(&self, fence: FenceHandle) -> Result<bool>;

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorSetLayoutBinding]) -> Result<DescriptorSetLayoutHandle>;
    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle);

    fn create_descriptor_pool(&self, max_sets: u32, sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle>;

    /// Destroy a pool and every set allocated from it
    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle);

    /// Allocate one set, or `Ok(None)` when the pool has no room left
    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<Option<DescriptorSetHandle>>;

    /// Write binding infos into a set
    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]);

    // ===== SHADERS AND PIPELINES =====

    /// Create a shader module from SPIR-V words (entry point "main")
    fn create_shader_module(&self, code: &[u32], stage: ShaderStage) -> Result<ShaderModuleHandle>;
    fn destroy_shader_module(&self, module: ShaderModuleHandle);

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle>;
    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle);

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle>;
    fn destroy_pipeline(&self, pipeline: PipelineHandle);

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<RenderPassHandle>;
    fn destroy_render_pass(&self, render_pass: RenderPassHandle);

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<FramebufferHandle>;
    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle);

    // ===== PRESENTATION =====

    /// Current capabilities, formats and present modes of the window surface
    fn surface_support(&self) -> Result<SurfaceSupport>;

    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<SwapchainHandle>;
    fn destroy_swapchain(&self, swapchain: SwapchainHandle);

    /// Images owned by the swapchain (never destroyed by the caller)
    fn swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<ImageHandle>>;

    /// Acquire the next presentable image, signaling `signal` when it is ready
    fn acquire_next_image(&self, swapchain: SwapchainHandle, signal: SemaphoreHandle) -> Result<AcquireOutcome>;

    /// Queue an image for presentation once `wait_semaphores` are signaled
    fn queue_present(
        &self,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait_semaphores: &[SemaphoreHandle],
    ) -> Result<PresentOutcome>;
}

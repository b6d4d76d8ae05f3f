/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Keeps a table of live handles, simulates the queue (copies execute at
/// submit time, fences signal when waited on or when the queue drains) and
/// records every misuse a validation layer would report as a violation
/// instead of failing the call.

use std::collections::VecDeque;
use std::sync::Mutex;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::graphics_device::graphics_device::GraphicsDevice;
use crate::graphics_device::types::*;

// ============================================================================
// Recorded commands
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    CopyBuffer { src: BufferHandle, dst: BufferHandle, region: BufferCopy },
    CopyBufferToImage { src: BufferHandle, dst: ImageHandle, extent: Extent2D },
    TransitionImageLayout { image: ImageHandle, old_layout: ImageLayout, new_layout: ImageLayout },
    BeginRenderPass { render_pass: RenderPassHandle, framebuffer: FramebufferHandle, extent: Extent2D },
    EndRenderPass,
    SetViewport(Viewport),
    SetScissor(Rect2D),
    BindPipeline(PipelineHandle),
    BindDescriptorSet { set_index: u32, set: DescriptorSetHandle },
    BindVertexBuffer(BufferHandle),
    BindIndexBuffer(BufferHandle, IndexType),
    PushConstants { size: usize },
    DrawIndexed { index_count: u32, instance_count: u32 },
}

// ============================================================================
// Internal state
// ============================================================================

struct MockBuffer {
    data: Vec<u8>,
    host_visible: bool,
}

struct MockCommandBuffer {
    pool: CommandPoolHandle,
    recording: bool,
    commands: Vec<MockCommand>,
    in_flight: Option<FenceHandle>,
}

struct MockDescriptorPool {
    capacity: u32,
    allocated: u32,
}

struct MockSwapchain {
    desc: SwapchainDesc,
    images: Vec<ImageHandle>,
}

struct MockState {
    next_id: u64,
    live: FxHashMap<u64, &'static str>,
    created: FxHashMap<&'static str, u32>,
    destroyed: FxHashMap<&'static str, u32>,
    buffers: FxHashMap<BufferHandle, MockBuffer>,
    allocation_buffers: FxHashMap<AllocationHandle, BufferHandle>,
    buffer_descs: Vec<BufferDesc>,
    image_descs: Vec<ImageDesc>,
    pipeline_layout_descs: Vec<PipelineLayoutDesc>,
    pipeline_descs: Vec<GraphicsPipelineDesc>,
    fences: FxHashMap<FenceHandle, bool>,
    pending_fences: Vec<FenceHandle>,
    command_buffers: FxHashMap<CommandBufferHandle, MockCommandBuffer>,
    descriptor_pools: FxHashMap<DescriptorPoolHandle, MockDescriptorPool>,
    descriptor_writes: FxHashMap<DescriptorSetHandle, Vec<DescriptorWrite>>,
    descriptor_update_count: u32,
    swapchains: FxHashMap<SwapchainHandle, MockSwapchain>,
    swapchain_descs: Vec<SwapchainDesc>,
    next_image: u32,
    acquire_script: VecDeque<AcquireOutcome>,
    present_script: VecDeque<PresentOutcome>,
    surface: SurfaceSupport,
    depth_format: Format,
    submitted: Vec<Vec<MockCommand>>,
    device_wait_idle_count: u32,
    present_count: u32,
    failures: Vec<&'static str>,
    violations: Vec<String>,
}

impl MockState {
    fn register(&mut self, kind: &'static str) -> u64 {
        self.next_id += 1;
        self.live.insert(self.next_id, kind);
        *self.created.entry(kind).or_insert(0) += 1;
        self.next_id
    }

    fn release(&mut self, kind: &'static str, id: u64) {
        if self.is_live(kind, id) {
            self.live.remove(&id);
            *self.destroyed.entry(kind).or_insert(0) += 1;
        } else {
            self.violations.push(format!("destroy of {} {} that is not alive", kind, id));
        }
    }

    fn is_live(&self, kind: &'static str, id: u64) -> bool {
        self.live.get(&id) == Some(&kind)
    }

    fn fail_point(&mut self, op: &'static str) -> Result<()> {
        if let Some(pos) = self.failures.iter().position(|f| *f == op) {
            self.failures.remove(pos);
            return Err(Error::BackendError(format!("injected failure in {}", op)));
        }
        Ok(())
    }

    fn record(&mut self, command_buffer: CommandBufferHandle, command: MockCommand) {
        match self.command_buffers.get_mut(&command_buffer) {
            Some(cb) if cb.recording => cb.commands.push(command),
            _ => self.violations.push(format!(
                "{:?} recorded into command buffer {} outside the recording state",
                command, command_buffer.0
            )),
        }
    }

    fn complete_fence(&mut self, fence: FenceHandle) {
        self.fences.insert(fence, true);
        self.pending_fences.retain(|f| *f != fence);
        for cb in self.command_buffers.values_mut() {
            if cb.in_flight == Some(fence) {
                cb.in_flight = None;
            }
        }
    }

    fn complete_all(&mut self) {
        for fence in std::mem::take(&mut self.pending_fences) {
            self.fences.insert(fence, true);
        }
        for cb in self.command_buffers.values_mut() {
            cb.in_flight = None;
        }
    }

    fn execute(&mut self, command: &MockCommand) {
        if let MockCommand::CopyBuffer { src, dst, region } = command {
            let (start, end) = (region.src_offset as usize, (region.src_offset + region.size) as usize);
            let bytes = match self.buffers.get(src) {
                Some(buffer) if end <= buffer.data.len() => buffer.data[start..end].to_vec(),
                _ => {
                    self.violations.push(format!("copy reads outside buffer {}", src.0));
                    return;
                }
            };
            match self.buffers.get_mut(dst) {
                Some(buffer) if region.dst_offset as usize + bytes.len() <= buffer.data.len() => {
                    let offset = region.dst_offset as usize;
                    buffer.data[offset..offset + bytes.len()].copy_from_slice(&bytes);
                }
                _ => self.violations.push(format!("copy writes outside buffer {}", dst.0)),
            }
        }
    }
}

// ============================================================================
// Mock device
// ============================================================================

pub struct MockGraphicsDevice {
    state: Mutex<MockState>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: 0,
                live: FxHashMap::default(),
                created: FxHashMap::default(),
                destroyed: FxHashMap::default(),
                buffers: FxHashMap::default(),
                allocation_buffers: FxHashMap::default(),
                buffer_descs: Vec::new(),
                image_descs: Vec::new(),
                pipeline_layout_descs: Vec::new(),
                pipeline_descs: Vec::new(),
                fences: FxHashMap::default(),
                pending_fences: Vec::new(),
                command_buffers: FxHashMap::default(),
                descriptor_pools: FxHashMap::default(),
                descriptor_writes: FxHashMap::default(),
                descriptor_update_count: 0,
                swapchains: FxHashMap::default(),
                swapchain_descs: Vec::new(),
                next_image: 0,
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                surface: Self::default_surface(Extent2D::new(800, 600)),
                depth_format: Format::D32_FLOAT,
                submitted: Vec::new(),
                device_wait_idle_count: 0,
                present_count: 0,
                failures: Vec::new(),
                violations: Vec::new(),
            }),
        }
    }

    /// Surface offering B8G8R8A8_SRGB, FIFO and MAILBOX, 2..=8 images
    pub fn default_surface(extent: Extent2D) -> SurfaceSupport {
        SurfaceSupport {
            capabilities: SurfaceCapabilities {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: Some(extent),
                min_image_extent: Extent2D::new(1, 1),
                max_image_extent: Extent2D::new(4096, 4096),
            },
            formats: vec![
                SurfaceFormat { format: Format::B8G8R8A8_UNORM, color_space: ColorSpace::SrgbNonlinear },
                SurfaceFormat { format: Format::B8G8R8A8_SRGB, color_space: ColorSpace::SrgbNonlinear },
            ],
            present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
        }
    }

    // ===== Test controls =====

    pub fn set_surface_support(&self, support: SurfaceSupport) {
        self.state.lock().unwrap().surface = support;
    }

    /// Resize the simulated window surface
    pub fn set_surface_extent(&self, extent: Extent2D) {
        self.state.lock().unwrap().surface.capabilities.current_extent = Some(extent);
    }

    pub fn push_acquire_outcome(&self, outcome: AcquireOutcome) {
        self.state.lock().unwrap().acquire_script.push_back(outcome);
    }

    pub fn push_present_outcome(&self, outcome: PresentOutcome) {
        self.state.lock().unwrap().present_script.push_back(outcome);
    }

    /// Make the next call of `op` (method name) fail with a BackendError
    pub fn fail_on(&self, op: &'static str) {
        self.state.lock().unwrap().failures.push(op);
    }

    // ===== Inspection =====

    pub fn created(&self, kind: &str) -> u32 {
        self.state.lock().unwrap().created.get(kind).copied().unwrap_or(0)
    }

    pub fn destroyed(&self, kind: &str) -> u32 {
        self.state.lock().unwrap().destroyed.get(kind).copied().unwrap_or(0)
    }

    pub fn live_count(&self, kind: &str) -> usize {
        self.state.lock().unwrap().live.values().filter(|k| **k == kind).count()
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.lock().unwrap().violations.clone()
    }

    /// Every successful buffer creation, in order
    pub fn buffer_descs(&self) -> Vec<BufferDesc> {
        self.state.lock().unwrap().buffer_descs.clone()
    }

    pub fn image_descs(&self) -> Vec<ImageDesc> {
        self.state.lock().unwrap().image_descs.clone()
    }

    pub fn pipeline_layout_descs(&self) -> Vec<PipelineLayoutDesc> {
        self.state.lock().unwrap().pipeline_layout_descs.clone()
    }

    pub fn pipeline_descs(&self) -> Vec<GraphicsPipelineDesc> {
        self.state.lock().unwrap().pipeline_descs.clone()
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state.lock().unwrap().buffers.get(&buffer).map(|b| b.data.clone())
    }

    /// Commands of every submitted command buffer, in submission order
    pub fn submitted_commands(&self) -> Vec<Vec<MockCommand>> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn descriptor_writes(&self, set: DescriptorSetHandle) -> Vec<DescriptorWrite> {
        self.state.lock().unwrap().descriptor_writes.get(&set).cloned().unwrap_or_default()
    }

    pub fn descriptor_update_count(&self) -> u32 {
        self.state.lock().unwrap().descriptor_update_count
    }

    pub fn swapchain_descs(&self) -> Vec<SwapchainDesc> {
        self.state.lock().unwrap().swapchain_descs.clone()
    }

    pub fn device_wait_idle_count(&self) -> u32 {
        self.state.lock().unwrap().device_wait_idle_count
    }

    pub fn present_count(&self) -> u32 {
        self.state.lock().unwrap().present_count
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    // ===== BUFFERS AND IMAGES =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<(BufferHandle, AllocationHandle)> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_buffer")?;
        if desc.size == 0 {
            state.violations.push(format!("zero-sized buffer '{}'", desc.name));
            return Err(Error::BackendError("buffer size must be greater than 0".to_string()));
        }
        let buffer = BufferHandle(state.register("buffer"));
        let allocation = AllocationHandle(state.register("allocation"));
        state.buffers.insert(buffer, MockBuffer {
            data: vec![0; desc.size as usize],
            host_visible: desc.memory.contains(MemoryProperties::HOST_VISIBLE),
        });
        state.allocation_buffers.insert(allocation, buffer);
        state.buffer_descs.push(desc.clone());
        Ok((buffer, allocation))
    }

    fn destroy_buffer(&self, buffer: BufferHandle, allocation: AllocationHandle) {
        let mut state = self.state.lock().unwrap();
        state.release("buffer", buffer.0);
        state.release("allocation", allocation.0);
        state.buffers.remove(&buffer);
        state.allocation_buffers.remove(&allocation);
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<(ImageHandle, AllocationHandle)> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_image")?;
        if desc.width == 0 || desc.height == 0 {
            state.violations.push(format!("zero-sized image '{}'", desc.name));
            return Err(Error::BackendError("image extent must be non-zero".to_string()));
        }
        let image = ImageHandle(state.register("image"));
        let allocation = AllocationHandle(state.register("allocation"));
        state.image_descs.push(desc.clone());
        Ok((image, allocation))
    }

    fn destroy_image(&self, image: ImageHandle, allocation: AllocationHandle) {
        let mut state = self.state.lock().unwrap();
        state.release("image", image.0);
        state.release("allocation", allocation.0);
    }

    fn write_mapped(&self, allocation: AllocationHandle, offset: u64, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let buffer = state.allocation_buffers.get(&allocation).copied()
            .ok_or_else(|| Error::InvalidResource(format!("allocation {} is not a buffer", allocation.0)))?;
        let target = state.buffers.get_mut(&buffer)
            .ok_or_else(|| Error::InvalidResource(format!("buffer {} is gone", buffer.0)))?;
        if !target.host_visible {
            return Err(Error::BackendError("Buffer is not CPU-accessible".to_string()));
        }
        let start = offset as usize;
        if start + data.len() > target.data.len() {
            return Err(Error::BackendError("write past the end of the allocation".to_string()));
        }
        target.data[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_mapped(&self, allocation: AllocationHandle, offset: u64, out: &mut [u8]) -> Result<()> {
        let state = self.state.lock().unwrap();
        let buffer = state.allocation_buffers.get(&allocation)
            .ok_or_else(|| Error::InvalidResource(format!("allocation {} is not a buffer", allocation.0)))?;
        let source = &state.buffers[buffer];
        if !source.host_visible {
            return Err(Error::BackendError("Buffer is not CPU-accessible".to_string()));
        }
        let start = offset as usize;
        if start + out.len() > source.data.len() {
            return Err(Error::BackendError("read past the end of the allocation".to_string()));
        }
        out.copy_from_slice(&source.data[start..start + out.len()]);
        Ok(())
    }

    fn create_image_view(&self, desc: &ImageViewDesc) -> Result<ImageViewHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_image_view")?;
        if !state.is_live("image", desc.image.0) && !state.is_live("swapchain_image", desc.image.0) {
            state.violations.push(format!("view of dead image {}", desc.image.0));
        }
        Ok(ImageViewHandle(state.register("image_view")))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        self.state.lock().unwrap().release("image_view", view.0);
    }

    fn create_sampler(&self, _desc: &SamplerDesc) -> Result<SamplerHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_sampler")?;
        Ok(SamplerHandle(state.register("sampler")))
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        self.state.lock().unwrap().release("sampler", sampler.0);
    }

    fn find_depth_format(&self) -> Result<Format> {
        Ok(self.state.lock().unwrap().depth_format)
    }

    // ===== COMMAND BUFFERS =====

    fn create_command_pool(&self, _flags: CommandPoolFlags) -> Result<CommandPoolHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_command_pool")?;
        Ok(CommandPoolHandle(state.register("command_pool")))
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        let mut state = self.state.lock().unwrap();
        let owned: Vec<CommandBufferHandle> = state.command_buffers.iter()
            .filter(|(_, cb)| cb.pool == pool)
            .map(|(handle, _)| *handle)
            .collect();
        for handle in owned {
            if state.command_buffers[&handle].in_flight.is_some() {
                state.violations.push(format!("command pool destroyed while buffer {} is in flight", handle.0));
            }
            state.command_buffers.remove(&handle);
            state.release("command_buffer", handle.0);
        }
        state.release("command_pool", pool.0);
    }

    fn allocate_command_buffer(&self, pool: CommandPoolHandle) -> Result<CommandBufferHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("allocate_command_buffer")?;
        let handle = CommandBufferHandle(state.register("command_buffer"));
        state.command_buffers.insert(handle, MockCommandBuffer {
            pool,
            recording: false,
            commands: Vec::new(),
            in_flight: None,
        });
        Ok(handle)
    }

    fn free_command_buffer(&self, _pool: CommandPoolHandle, command_buffer: CommandBufferHandle) {
        let mut state = self.state.lock().unwrap();
        if let Some(cb) = state.command_buffers.remove(&command_buffer) {
            if cb.in_flight.is_some() {
                state.violations.push(format!("command buffer {} freed while in flight", command_buffer.0));
            }
        }
        state.release("command_buffer", command_buffer.0);
    }

    fn begin_command_buffer(&self, command_buffer: CommandBufferHandle, _one_time_submit: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("begin_command_buffer")?;
        let MockState { command_buffers, violations, .. } = &mut *state;
        let cb = command_buffers.get_mut(&command_buffer)
            .ok_or_else(|| Error::InvalidResource(format!("unknown command buffer {}", command_buffer.0)))?;
        if cb.in_flight.is_some() {
            violations.push(format!("command buffer {} re-recorded while its fence is unsignaled", command_buffer.0));
        }
        cb.recording = true;
        cb.commands.clear();
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let MockState { command_buffers, violations, .. } = &mut *state;
        let cb = command_buffers.get_mut(&command_buffer)
            .ok_or_else(|| Error::InvalidResource(format!("unknown command buffer {}", command_buffer.0)))?;
        if !cb.recording {
            violations.push(format!("end of command buffer {} that is not recording", command_buffer.0));
        }
        cb.recording = false;
        Ok(())
    }

    fn reset_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let MockState { command_buffers, violations, .. } = &mut *state;
        let cb = command_buffers.get_mut(&command_buffer)
            .ok_or_else(|| Error::InvalidResource(format!("unknown command buffer {}", command_buffer.0)))?;
        if cb.in_flight.is_some() {
            violations.push(format!("command buffer {} reset while its fence is unsignaled", command_buffer.0));
        }
        cb.recording = false;
        cb.commands.clear();
        Ok(())
    }

    // ===== COMMAND RECORDING =====

    fn cmd_copy_buffer(&self, command_buffer: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, region: BufferCopy) {
        self.state.lock().unwrap().record(command_buffer, MockCommand::CopyBuffer { src, dst, region });
    }

    fn cmd_copy_buffer_to_image(&self, command_buffer: CommandBufferHandle, src: BufferHandle, dst: ImageHandle, extent: Extent2D) {
        self.state.lock().unwrap().record(command_buffer, MockCommand::CopyBufferToImage { src, dst, extent });
    }

    fn cmd_transition_image_layout(
        &self,
        command_buffer: CommandBufferHandle,
        image: ImageHandle,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) {
        self.state.lock().unwrap().record(
            command_buffer,
            MockCommand::TransitionImageLayout { image, old_layout, new_layout },
        );
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: CommandBufferHandle,
        render_pass: RenderPassHandle,
        framebuffer: FramebufferHandle,
        extent: Extent2D,
        _clear_values: &[ClearValue],
    ) {
        let mut state = self.state.lock().unwrap();
        if !state.is_live("framebuffer", framebuffer.0) {
            state.violations.push(format!("render pass begun on dead framebuffer {}", framebuffer.0));
        }
        state.record(command_buffer, MockCommand::BeginRenderPass { render_pass, framebuffer, extent });
    }

    fn cmd_end_render_pass(&self, command_buffer: CommandBufferHandle) {
        self.state.lock().unwrap().record(command_buffer, MockCommand::EndRenderPass);
    }

    fn cmd_set_viewport(&self, command_buffer: CommandBufferHandle, viewport: Viewport) {
        self.state.lock().unwrap().record(command_buffer, MockCommand::SetViewport(viewport));
    }

    fn cmd_set_scissor(&self, command_buffer: CommandBufferHandle, scissor: Rect2D) {
        self.state.lock().unwrap().record(command_buffer, MockCommand::SetScissor(scissor));
    }

    fn cmd_bind_pipeline(&self, command_buffer: CommandBufferHandle, pipeline: PipelineHandle) {
        self.state.lock().unwrap().record(command_buffer, MockCommand::BindPipeline(pipeline));
    }

    fn cmd_bind_descriptor_set(
        &self,
        command_buffer: CommandBufferHandle,
        _layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
    ) {
        self.state.lock().unwrap().record(command_buffer, MockCommand::BindDescriptorSet { set_index, set });
    }

    fn cmd_bind_vertex_buffer(&self, command_buffer: CommandBufferHandle, buffer: BufferHandle, _offset: u64) {
        self.state.lock().unwrap().record(command_buffer, MockCommand::BindVertexBuffer(buffer));
    }

    fn cmd_bind_index_buffer(&self, command_buffer: CommandBufferHandle, buffer: BufferHandle, _offset: u64, index_type: IndexType) {
        self.state.lock().unwrap().record(command_buffer, MockCommand::BindIndexBuffer(buffer, index_type));
    }

    fn cmd_push_constants(
        &self,
        command_buffer: CommandBufferHandle,
        _layout: PipelineLayoutHandle,
        _stages: ShaderStageFlags,
        _offset: u32,
        data: &[u8],
    ) {
        self.state.lock().unwrap().record(command_buffer, MockCommand::PushConstants { size: data.len() });
    }

    fn cmd_draw_indexed(&self, command_buffer: CommandBufferHandle, index_count: u32, instance_count: u32) {
        self.state.lock().unwrap().record(command_buffer, MockCommand::DrawIndexed { index_count, instance_count });
    }

    // ===== QUEUE AND SYNCHRONIZATION =====

    fn queue_submit(&self, submit: &SubmitDesc<'_>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("queue_submit")?;
        let st = &mut *state;

        if let Some(fence) = submit.fence {
            if st.fences.get(&fence) != Some(&false) {
                st.violations.push(format!("submit with fence {} that is not unsignaled", fence.0));
            }
            st.pending_fences.push(fence);
        }

        for handle in submit.command_buffers {
            let commands = match st.command_buffers.get_mut(handle) {
                Some(cb) if !cb.recording => {
                    cb.in_flight = submit.fence;
                    cb.commands.clone()
                }
                Some(_) => {
                    st.violations.push(format!("command buffer {} submitted while recording", handle.0));
                    continue;
                }
                None => {
                    st.violations.push(format!("submit of unknown command buffer {}", handle.0));
                    continue;
                }
            };
            for command in &commands {
                st.execute(command);
            }
            st.submitted.push(commands);
        }
        Ok(())
    }

    fn queue_wait_idle(&self) -> Result<()> {
        self.state.lock().unwrap().complete_all();
        Ok(())
    }

    fn device_wait_idle(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("device_wait_idle")?;
        state.device_wait_idle_count += 1;
        state.complete_all();
        Ok(())
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_semaphore")?;
        Ok(SemaphoreHandle(state.register("semaphore")))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        self.state.lock().unwrap().release("semaphore", semaphore.0);
    }

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_fence")?;
        let fence = FenceHandle(state.register("fence"));
        state.fences.insert(fence, signaled);
        Ok(fence)
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        let mut state = self.state.lock().unwrap();
        if state.pending_fences.contains(&fence) {
            state.violations.push(format!("fence {} destroyed while pending", fence.0));
        }
        state.fences.remove(&fence);
        state.release("fence", fence.0);
    }

    fn wait_for_fence(&self, fence: FenceHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("wait_for_fence")?;
        let signaled = state.fences.get(&fence).copied();
        match signaled {
            Some(true) => Ok(()),
            Some(false) if state.pending_fences.contains(&fence) => {
                state.complete_fence(fence);
                Ok(())
            }
            Some(false) => {
                state.violations.push(format!("wait on fence {} that nothing will signal", fence.0));
                Err(Error::ContractViolation("fence would never signal".to_string()))
            }
            None => Err(Error::InvalidResource(format!("unknown fence {}", fence.0))),
        }
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.pending_fences.contains(&fence) {
            state.violations.push(format!("fence {} reset while pending", fence.0));
        }
        state.fences.insert(fence, false);
        Ok(())
    }

    fn fence_signaled(&self, fence: FenceHandle) -> Result<bool> {
        let state = self.state.lock().unwrap();
        state.fences.get(&fence).copied()
            .ok_or_else(|| Error::InvalidResource(format!("unknown fence {}", fence.0)))
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&self, _bindings: &[DescriptorSetLayoutBinding]) -> Result<DescriptorSetLayoutHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_descriptor_set_layout")?;
        Ok(DescriptorSetLayoutHandle(state.register("descriptor_set_layout")))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        self.state.lock().unwrap().release("descriptor_set_layout", layout.0);
    }

    fn create_descriptor_pool(&self, max_sets: u32, _sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_descriptor_pool")?;
        let pool = DescriptorPoolHandle(state.register("descriptor_pool"));
        state.descriptor_pools.insert(pool, MockDescriptorPool { capacity: max_sets, allocated: 0 });
        Ok(pool)
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        let mut state = self.state.lock().unwrap();
        state.descriptor_pools.remove(&pool);
        state.release("descriptor_pool", pool.0);
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<Option<DescriptorSetHandle>> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("allocate_descriptor_set")?;
        if !state.is_live("descriptor_set_layout", layout.0) {
            state.violations.push(format!("set allocated with dead layout {}", layout.0));
        }
        let full = match state.descriptor_pools.get_mut(&pool) {
            Some(p) if p.allocated < p.capacity => {
                p.allocated += 1;
                false
            }
            Some(_) => true,
            None => return Err(Error::InvalidResource(format!("unknown descriptor pool {}", pool.0))),
        };
        if full {
            return Ok(None);
        }
        state.next_id += 1;
        let set = DescriptorSetHandle(state.next_id);
        *state.created.entry("descriptor_set").or_insert(0) += 1;
        Ok(Some(set))
    }

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) {
        let mut state = self.state.lock().unwrap();
        state.descriptor_update_count += 1;
        state.descriptor_writes.insert(set, writes.to_vec());
    }

    // ===== SHADERS AND PIPELINES =====

    fn create_shader_module(&self, code: &[u32], _stage: ShaderStage) -> Result<ShaderModuleHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_shader_module")?;
        if code.is_empty() {
            return Err(Error::InvalidResource("empty SPIR-V".to_string()));
        }
        Ok(ShaderModuleHandle(state.register("shader_module")))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        self.state.lock().unwrap().release("shader_module", module.0);
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_pipeline_layout")?;
        state.pipeline_layout_descs.push(desc.clone());
        Ok(PipelineLayoutHandle(state.register("pipeline_layout")))
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        self.state.lock().unwrap().release("pipeline_layout", layout.0);
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_graphics_pipeline")?;
        if !state.is_live("shader_module", desc.vertex_shader.0) || !state.is_live("shader_module", desc.fragment_shader.0) {
            state.violations.push("pipeline created from dead shader module".to_string());
        }
        state.pipeline_descs.push(desc.clone());
        Ok(PipelineHandle(state.register("pipeline")))
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        self.state.lock().unwrap().release("pipeline", pipeline.0);
    }

    fn create_render_pass(&self, _desc: &RenderPassDesc) -> Result<RenderPassHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_render_pass")?;
        Ok(RenderPassHandle(state.register("render_pass")))
    }

    fn destroy_render_pass(&self, render_pass: RenderPassHandle) {
        self.state.lock().unwrap().release("render_pass", render_pass.0);
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<FramebufferHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_framebuffer")?;
        for view in &desc.attachments {
            if !state.is_live("image_view", view.0) {
                state.violations.push(format!("framebuffer uses dead view {}", view.0));
            }
        }
        Ok(FramebufferHandle(state.register("framebuffer")))
    }

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) {
        self.state.lock().unwrap().release("framebuffer", framebuffer.0);
    }

    // ===== PRESENTATION =====

    fn surface_support(&self) -> Result<SurfaceSupport> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("surface_support")?;
        Ok(state.surface.clone())
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<SwapchainHandle> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("create_swapchain")?;
        if let Some(old) = desc.old_swapchain {
            if !state.is_live("swapchain", old.0) {
                state.violations.push(format!("old swapchain {} is not alive", old.0));
            }
        }
        if desc.extent.is_zero() {
            state.violations.push("swapchain created with a zero extent".to_string());
        }
        let swapchain = SwapchainHandle(state.register("swapchain"));
        let images: Vec<ImageHandle> = (0..desc.image_count)
            .map(|_| ImageHandle(state.register("swapchain_image")))
            .collect();
        state.swapchains.insert(swapchain, MockSwapchain { desc: *desc, images });
        state.swapchain_descs.push(*desc);
        Ok(swapchain)
    }

    fn destroy_swapchain(&self, swapchain: SwapchainHandle) {
        let mut state = self.state.lock().unwrap();
        if let Some(removed) = state.swapchains.remove(&swapchain) {
            for image in removed.images {
                state.live.remove(&image.0);
            }
        }
        state.release("swapchain", swapchain.0);
    }

    fn swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<ImageHandle>> {
        let state = self.state.lock().unwrap();
        state.swapchains.get(&swapchain)
            .map(|s| s.images.clone())
            .ok_or_else(|| Error::InvalidResource(format!("unknown swapchain {}", swapchain.0)))
    }

    fn acquire_next_image(&self, swapchain: SwapchainHandle, _signal: SemaphoreHandle) -> Result<AcquireOutcome> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("acquire_next_image")?;
        let image_count = match state.swapchains.get(&swapchain) {
            Some(s) => s.desc.image_count.max(1),
            None => {
                state.violations.push(format!("acquire on dead swapchain {}", swapchain.0));
                return Err(Error::InvalidResource(format!("unknown swapchain {}", swapchain.0)));
            }
        };
        if let Some(outcome) = state.acquire_script.pop_front() {
            return Ok(outcome);
        }
        let image_index = state.next_image % image_count;
        state.next_image += 1;
        Ok(AcquireOutcome::Acquired { image_index, suboptimal: false })
    }

    fn queue_present(
        &self,
        swapchain: SwapchainHandle,
        _image_index: u32,
        _wait_semaphores: &[SemaphoreHandle],
    ) -> Result<PresentOutcome> {
        let mut state = self.state.lock().unwrap();
        state.fail_point("queue_present")?;
        if !state.is_live("swapchain", swapchain.0) {
            state.violations.push(format!("present on dead swapchain {}", swapchain.0));
        }
        state.present_count += 1;
        Ok(state.present_script.pop_front().unwrap_or(PresentOutcome::Presented))
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;

/// Frame - one in-flight rendering slot
///
/// A slot owns its command pool and primary command buffer, the
/// image-available / render-finished semaphores, the completion fence and a
/// descriptor cache. Slots cycle round-robin:
///
/// 1. `wait()` blocks on the fence (no timeout)
/// 2. `begin_recording()` resets the fence and the command buffer and starts recording
/// 3. `submit()` waits on image-available, signals render-finished and the fence
///
/// The command buffer is never reset while the fence is unsignaled.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::descriptor::{DescriptorCache, DescriptorSetLayout};
use crate::error::{Error, Result};
use crate::graphics_device::{
    BufferBinding, CommandBufferHandle, CommandPoolFlags, CommandPoolHandle, DescriptorPoolHandle,
    DescriptorSetHandle, FenceHandle, GraphicsDevice, ImageBinding, SemaphoreHandle, SubmitDesc,
};
use crate::{engine_error, engine_trace};

/// Where a slot is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Fence observed signaled, command buffer free to re-record
    Available,
    /// Command buffer is recording
    Recording,
    /// Submitted, fence not yet waited on
    Submitted,
}

pub struct Frame {
    device: Arc<dyn GraphicsDevice>,
    index: usize,
    descriptors: DescriptorCache,
    command_pool: CommandPoolHandle,
    command_buffer: CommandBufferHandle,
    image_available: SemaphoreHandle,
    render_finished: SemaphoreHandle,
    fence: FenceHandle,
    state: FrameState,
}

impl Frame {
    /// Create slot `index`: resettable command pool, one primary command
    /// buffer, two semaphores and a fence created signaled
    pub fn new(device: Arc<dyn GraphicsDevice>, index: usize) -> Result<Self> {
        // Handles start null so an early return only destroys what exists
        let mut frame = Self {
            descriptors: DescriptorCache::new(Arc::clone(&device)),
            device,
            index,
            command_pool: CommandPoolHandle::NULL,
            command_buffer: CommandBufferHandle::NULL,
            image_available: SemaphoreHandle::NULL,
            render_finished: SemaphoreHandle::NULL,
            fence: FenceHandle::NULL,
            state: FrameState::Available,
        };

        frame.command_pool = frame.device.create_command_pool(CommandPoolFlags::RESET_COMMAND_BUFFER)?;
        frame.command_buffer = frame.device.allocate_command_buffer(frame.command_pool)?;
        frame.image_available = frame.device.create_semaphore()?;
        frame.render_finished = frame.device.create_semaphore()?;
        frame.fence = frame.device.create_fence(true)?;

        engine_trace!("lumen::Frame", "Frame slot {} created", index);
        Ok(frame)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn command_buffer(&self) -> CommandBufferHandle {
        self.command_buffer
    }

    pub fn image_available(&self) -> SemaphoreHandle {
        self.image_available
    }

    pub fn render_finished(&self) -> SemaphoreHandle {
        self.render_finished
    }

    pub fn fence(&self) -> FenceHandle {
        self.fence
    }

    /// Block until the GPU has finished this slot's previous submission
    pub fn wait(&mut self) -> Result<()> {
        if self.state == FrameState::Recording {
            engine_error!("lumen::Frame", "Wait on frame slot {} while it is recording", self.index);
            return Err(Error::ContractViolation(format!(
                "frame slot {} is still recording", self.index
            )));
        }
        engine_trace!("lumen::Frame", "Waiting on fence of slot {}", self.index);
        self.device.wait_for_fence(self.fence)?;
        self.state = FrameState::Available;
        Ok(())
    }

    /// Reset the fence and the command buffer, then begin recording
    ///
    /// Fails with `ContractViolation` when the slot's fence is not signaled.
    pub fn begin_recording(&mut self) -> Result<CommandBufferHandle> {
        if self.state != FrameState::Available || !self.device.fence_signaled(self.fence)? {
            engine_error!("lumen::Frame",
                "Recording into frame slot {} whose fence is unsignaled", self.index);
            return Err(Error::ContractViolation(format!(
                "frame slot {} recorded before its fence was signaled", self.index
            )));
        }
        self.device.reset_fence(self.fence)?;
        self.device.reset_command_buffer(self.command_buffer)?;
        self.device.begin_command_buffer(self.command_buffer, false)?;
        self.state = FrameState::Recording;
        Ok(self.command_buffer)
    }

    /// End recording and submit to the graphics queue
    ///
    /// The submission waits on image-available at the color attachment output
    /// stage and signals render-finished and the fence.
    pub fn submit(&mut self) -> Result<()> {
        if self.state != FrameState::Recording {
            engine_error!("lumen::Frame", "Submit of frame slot {} that is not recording", self.index);
            return Err(Error::ContractViolation(format!(
                "frame slot {} submitted without recording", self.index
            )));
        }
        self.device.end_command_buffer(self.command_buffer)?;
        self.device.queue_submit(&SubmitDesc {
            command_buffers: &[self.command_buffer],
            wait_semaphores: &[self.image_available],
            signal_semaphores: &[self.render_finished],
            fence: Some(self.fence),
        })?;
        self.state = FrameState::Submitted;
        Ok(())
    }

    // ===== DESCRIPTORS =====

    pub fn descriptor_pool(&mut self, layout: &DescriptorSetLayout) -> Result<DescriptorPoolHandle> {
        self.descriptors.descriptor_pool(layout)
    }

    /// Cached descriptor set of this slot for (layout, buffers, images)
    pub fn descriptor_set(
        &mut self,
        layout: &DescriptorSetLayout,
        buffers: &BTreeMap<u32, BufferBinding>,
        images: &BTreeMap<u32, ImageBinding>,
    ) -> Result<DescriptorSetHandle> {
        self.descriptors.descriptor_set(layout, buffers, images)
    }

    pub fn update_descriptor_sets(&self) {
        self.descriptors.update_descriptor_sets();
    }

    pub fn descriptors(&self) -> &DescriptorCache {
        &self.descriptors
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        // Descriptor pools go first, then the fence, the semaphores and the command pool
        self.descriptors.clear();
        if !self.fence.is_null() {
            self.device.destroy_fence(self.fence);
        }
        if !self.render_finished.is_null() {
            self.device.destroy_semaphore(self.render_finished);
        }
        if !self.image_available.is_null() {
            self.device.destroy_semaphore(self.image_available);
        }
        if !self.command_pool.is_null() {
            self.device.destroy_command_pool(self.command_pool);
        }
    }
}

// ============================================================================
// FrameRing
// ============================================================================

/// Fixed set of frame slots cycled round-robin
pub struct FrameRing {
    frames: Vec<Frame>,
    current: usize,
}

impl FrameRing {
    /// Create `count` slots
    pub fn new(device: Arc<dyn GraphicsDevice>, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::InitializationFailed("at least one frame slot is required".to_string()));
        }
        let frames = (0..count)
            .map(|index| Frame::new(Arc::clone(&device), index))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { frames, current: 0 })
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &Frame {
        &self.frames[self.current]
    }

    pub fn current_mut(&mut self) -> &mut Frame {
        &mut self.frames[self.current]
    }

    /// Move to the next slot
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.frames.len();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;

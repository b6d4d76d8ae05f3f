/// DeviceAllocator - GPU memory allocation and host-to-device transfers
///
/// Buffers and images come back as move-only owners (`BufferAllocation`,
/// `ImageAllocation`) that destroy the resource and its memory together
/// when freed or dropped. Transfers go through a host-visible staging buffer
/// and a blocking one-shot submission on the immediate command pool.

use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::graphics_device::{
    AllocationFlags, AllocationHandle, BufferBinding, BufferCopy, BufferDesc, BufferHandle,
    BufferUsage, CommandBufferHandle, CommandPoolFlags, CommandPoolHandle, Extent2D, Format,
    GraphicsDevice, ImageDesc, ImageHandle, ImageLayout, ImageUsage, MemoryProperties, SubmitDesc,
};
use crate::{engine_debug, engine_err, engine_error, engine_trace};

/// Vulkan rejects zero-sized buffers; empty uploads get this many bytes instead
const EMPTY_BUFFER_CAPACITY: u64 = 4;

// ============================================================================
// Owned allocations
// ============================================================================

/// Resource whose release consumes the owner
pub trait OwnedAllocation: Sized {
    /// Destroy the resource and its backing memory
    fn free(self) {
        drop(self);
    }
}

/// Buffer plus its backing memory, released exactly once
pub struct BufferAllocation {
    device: Arc<dyn GraphicsDevice>,
    buffer: BufferHandle,
    allocation: AllocationHandle,
    /// Bytes requested by the caller
    size: u64,
    /// Bytes actually allocated (>= size)
    capacity: u64,
    host_visible: bool,
}

impl BufferAllocation {
    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Whole-buffer range for a uniform buffer binding
    pub fn binding(&self) -> BufferBinding {
        BufferBinding { buffer: self.buffer, offset: 0, range: self.capacity }
    }

    /// Write into host-visible memory
    ///
    /// # Arguments
    ///
    /// * `offset` - Byte offset into the buffer
    /// * `data` - Bytes to write
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        if !self.host_visible {
            engine_error!("lumen::DeviceAllocator", "Write into device-local buffer {}", self.buffer.0);
            return Err(Error::ContractViolation("buffer is not host-visible".to_string()));
        }
        self.device.write_mapped(self.allocation, offset, data)
    }

    /// Read from host-visible memory
    pub fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        if !self.host_visible {
            engine_error!("lumen::DeviceAllocator", "Read from device-local buffer {}", self.buffer.0);
            return Err(Error::ContractViolation("buffer is not host-visible".to_string()));
        }
        self.device.read_mapped(self.allocation, offset, out)
    }
}

impl OwnedAllocation for BufferAllocation {}

impl Drop for BufferAllocation {
    fn drop(&mut self) {
        engine_trace!("lumen::DeviceAllocator", "Freeing buffer {} ({} bytes)", self.buffer.0, self.capacity);
        self.device.destroy_buffer(self.buffer, self.allocation);
    }
}

impl std::fmt::Debug for BufferAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferAllocation")
            .field("buffer", &self.buffer)
            .field("size", &self.size)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// 2D image plus its backing memory, released exactly once
pub struct ImageAllocation {
    device: Arc<dyn GraphicsDevice>,
    image: ImageHandle,
    allocation: AllocationHandle,
    extent: Extent2D,
    format: Format,
}

impl ImageAllocation {
    pub fn image(&self) -> ImageHandle {
        self.image
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

impl OwnedAllocation for ImageAllocation {}

impl Drop for ImageAllocation {
    fn drop(&mut self) {
        engine_trace!("lumen::DeviceAllocator", "Freeing image {}", self.image.0);
        self.device.destroy_image(self.image, self.allocation);
    }
}

impl std::fmt::Debug for ImageAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAllocation")
            .field("image", &self.image)
            .field("extent", &self.extent)
            .field("format", &self.format)
            .finish()
    }
}

// ============================================================================
// DeviceAllocator
// ============================================================================

pub struct DeviceAllocator {
    device: Arc<dyn GraphicsDevice>,
    /// Pool for one-shot transfer command buffers (TRANSIENT + RESET_COMMAND_BUFFER)
    immediate_pool: Mutex<CommandPoolHandle>,
}

impl DeviceAllocator {
    /// Create the allocator and its immediate-submit command pool
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Result<Self> {
        let pool = device.create_command_pool(
            CommandPoolFlags::TRANSIENT | CommandPoolFlags::RESET_COMMAND_BUFFER,
        )?;
        Ok(Self {
            device,
            immediate_pool: Mutex::new(pool),
        })
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// Upload `data` into a new device-local buffer
    ///
    /// Blocks until the staging copy has completed. An empty `data` yields a
    /// minimal buffer with no transfer.
    ///
    /// # Arguments
    ///
    /// * `data` - Bytes the destination must contain
    /// * `usage` - Usage of the destination (TRANSFER_DST is added)
    pub fn allocate_device_local_buffer_and_transfer(
        &self,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<BufferAllocation> {
        if data.is_empty() {
            engine_debug!("lumen::DeviceAllocator", "Empty upload, allocating a {}-byte placeholder", EMPTY_BUFFER_CAPACITY);
            let mut placeholder = self.allocate_buffer(
                EMPTY_BUFFER_CAPACITY,
                usage,
                MemoryProperties::DEVICE_LOCAL,
                AllocationFlags::empty(),
            )?;
            placeholder.size = 0;
            return Ok(placeholder);
        }

        let size = data.len() as u64;
        let destination = self.allocate_buffer(
            size,
            usage,
            MemoryProperties::DEVICE_LOCAL,
            AllocationFlags::empty(),
        )?;

        let staging = self.create_buffer(&BufferDesc {
            name: "staging".to_string(),
            size,
            usage: BufferUsage::TRANSFER_SRC,
            memory: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
            flags: AllocationFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
        })?;
        staging.write(0, data)?;

        self.copy_buffer(&staging, &destination, size)?;
        staging.free();

        Ok(destination)
    }

    /// Device-local 2D image for depth or color attachments
    ///
    /// Single mip, single layer, optimal tiling, dedicated memory, exclusive
    /// sharing, undefined initial layout.
    pub fn allocate_image_attachment(
        &self,
        width: u32,
        height: u32,
        format: Format,
        usage: ImageUsage,
    ) -> Result<ImageAllocation> {
        self.create_image(&ImageDesc {
            name: "attachment".to_string(),
            width,
            height,
            format,
            usage,
            memory: MemoryProperties::DEVICE_LOCAL,
            flags: AllocationFlags::DEDICATED,
        })
    }

    /// Generic buffer allocation (TRANSFER_DST is always added to `usage`)
    pub fn allocate_buffer(
        &self,
        size: u64,
        usage: BufferUsage,
        properties: MemoryProperties,
        flags: AllocationFlags,
    ) -> Result<BufferAllocation> {
        self.create_buffer(&BufferDesc {
            name: "buffer".to_string(),
            size,
            usage: usage | BufferUsage::TRANSFER_DST,
            memory: properties,
            flags,
        })
    }

    /// Sampled RGBA texture uploaded through a staging buffer
    ///
    /// The image ends in SHADER_READ_ONLY_OPTIMAL.
    pub fn allocate_texture(
        &self,
        width: u32,
        height: u32,
        format: Format,
        pixels: &[u8],
    ) -> Result<ImageAllocation> {
        let texel_size = format.bytes_per_element().ok_or_else(|| {
            Error::InvalidResource(format!("{:?} has no known texel size", format))
        })?;
        let expected = width as u64 * height as u64 * texel_size as u64;
        if pixels.len() as u64 != expected {
            engine_error!("lumen::DeviceAllocator",
                "Texture {}x{} {:?} expects {} bytes, got {}", width, height, format, expected, pixels.len());
            return Err(Error::InvalidResource(format!(
                "texture data is {} bytes, expected {}", pixels.len(), expected
            )));
        }

        let image = self.create_image(&ImageDesc {
            name: "texture".to_string(),
            width,
            height,
            format,
            usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
            memory: MemoryProperties::DEVICE_LOCAL,
            flags: AllocationFlags::empty(),
        })?;

        let staging = self.create_buffer(&BufferDesc {
            name: "texture staging".to_string(),
            size: expected,
            usage: BufferUsage::TRANSFER_SRC,
            memory: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
            flags: AllocationFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
        })?;
        staging.write(0, pixels)?;

        let (src, dst, extent) = (staging.buffer(), image.image(), image.extent());
        self.immediate_submit(|device, cmd| {
            device.cmd_transition_image_layout(cmd, dst, ImageLayout::Undefined, ImageLayout::TransferDstOptimal);
            device.cmd_copy_buffer_to_image(cmd, src, dst, extent);
            device.cmd_transition_image_layout(cmd, dst, ImageLayout::TransferDstOptimal, ImageLayout::ShaderReadOnlyOptimal);
        })?;
        staging.free();

        Ok(image)
    }

    /// Blocking copy of the first `size` bytes of `src` into `dst`
    pub fn copy_buffer(&self, src: &BufferAllocation, dst: &BufferAllocation, size: u64) -> Result<()> {
        if size > src.capacity() || size > dst.capacity() {
            engine_error!("lumen::DeviceAllocator",
                "Copy of {} bytes between buffers of {} and {} bytes", size, src.capacity(), dst.capacity());
            return Err(Error::ContractViolation("copy range exceeds buffer size".to_string()));
        }
        let (src, dst) = (src.buffer(), dst.buffer());
        self.immediate_submit(|device, cmd| {
            device.cmd_copy_buffer(cmd, src, dst, BufferCopy { src_offset: 0, dst_offset: 0, size });
        })
    }

    /// Copy a buffer's contents back to the host (blocking)
    pub fn read_back(&self, buffer: &BufferAllocation) -> Result<Vec<u8>> {
        let size = buffer.size();
        if size == 0 {
            return Ok(Vec::new());
        }
        let readback = self.create_buffer(&BufferDesc {
            name: "readback".to_string(),
            size,
            usage: BufferUsage::TRANSFER_DST,
            memory: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
            flags: AllocationFlags::HOST_ACCESS_RANDOM,
        })?;
        self.copy_buffer(buffer, &readback, size)?;

        let mut bytes = vec![0u8; size as usize];
        readback.read(0, &mut bytes)?;
        Ok(bytes)
    }

    /// Release an allocation (same as dropping it)
    pub fn free<A: OwnedAllocation>(&self, allocation: A) {
        allocation.free();
    }

    // ===== INTERNAL =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferAllocation> {
        let (buffer, allocation) = self.device.create_buffer(desc)?;
        Ok(BufferAllocation {
            device: Arc::clone(&self.device),
            buffer,
            allocation,
            size: desc.size,
            capacity: desc.size,
            host_visible: desc.memory.contains(MemoryProperties::HOST_VISIBLE),
        })
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<ImageAllocation> {
        let (image, allocation) = self.device.create_image(desc)?;
        Ok(ImageAllocation {
            device: Arc::clone(&self.device),
            image,
            allocation,
            extent: Extent2D::new(desc.width, desc.height),
            format: desc.format,
        })
    }

    /// Record with `record`, submit without a fence, wait for the queue, free the command buffer
    fn immediate_submit<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&dyn GraphicsDevice, CommandBufferHandle),
    {
        let pool = self.immediate_pool.lock()
            .map_err(|_| engine_err!("lumen::DeviceAllocator", "Immediate command pool lock poisoned"))?;
        let device = &*self.device;
        let cmd = device.allocate_command_buffer(*pool)?;

        let result: Result<()> = (|| {
            device.begin_command_buffer(cmd, true)?;
            record(device, cmd);
            device.end_command_buffer(cmd)?;
            device.queue_submit(&SubmitDesc {
                command_buffers: &[cmd],
                wait_semaphores: &[],
                signal_semaphores: &[],
                fence: None,
            })?;
            device.queue_wait_idle()
        })();

        device.free_command_buffer(*pool, cmd);
        result
    }
}

impl Drop for DeviceAllocator {
    fn drop(&mut self) {
        let pool = match self.immediate_pool.get_mut() {
            Ok(pool) => *pool,
            Err(poisoned) => *poisoned.into_inner(),
        };
        self.device.destroy_command_pool(pool);
    }
}

#[cfg(test)]
#[path = "device_allocator_tests.rs"]
mod tests;

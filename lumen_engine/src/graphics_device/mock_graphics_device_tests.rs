/// Unit tests for MockGraphicsDevice
///
/// The other test suites trust the mock's bookkeeping, so the bookkeeping
/// itself is checked here.

use crate::graphics_device::mock_graphics_device::*;
use crate::graphics_device::*;

fn host_buffer(device: &MockGraphicsDevice, size: u64) -> (BufferHandle, AllocationHandle) {
    device.create_buffer(&BufferDesc {
        name: "host".to_string(),
        size,
        usage: BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST,
        memory: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
        flags: AllocationFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
    }).unwrap()
}

// ============================================================================
// Handle bookkeeping
// ============================================================================

#[test]
fn test_create_and_destroy_counts() {
    let device = MockGraphicsDevice::new();
    let (buffer, allocation) = host_buffer(&device, 16);
    assert_eq!(device.created("buffer"), 1);
    assert_eq!(device.live_count("buffer"), 1);

    device.destroy_buffer(buffer, allocation);
    assert_eq!(device.destroyed("buffer"), 1);
    assert_eq!(device.live_count("buffer"), 0);
    assert!(device.violations().is_empty());
}

#[test]
fn test_live_count_is_per_kind() {
    let device = MockGraphicsDevice::new();
    let first = device.create_semaphore().unwrap();
    let second = device.create_semaphore().unwrap();
    let fence = device.create_fence(false).unwrap();
    assert_eq!(device.live_count("semaphore"), 2);
    assert_eq!(device.live_count("fence"), 1);
    assert_eq!(device.live_count("buffer"), 0);

    device.destroy_semaphore(first);
    assert_eq!(device.live_count("semaphore"), 1);
    assert_eq!(device.live_count("fence"), 1);

    device.destroy_semaphore(second);
    device.destroy_fence(fence);
    assert_eq!(device.live_count("semaphore"), 0);
    assert_eq!(device.live_count("fence"), 0);
}

#[test]
fn test_double_destroy_is_a_violation() {
    let device = MockGraphicsDevice::new();
    let fence = device.create_fence(true).unwrap();
    device.destroy_fence(fence);
    device.destroy_fence(fence);
    assert_eq!(device.violations().len(), 1);
}

#[test]
fn test_zero_sized_buffer_is_rejected() {
    let device = MockGraphicsDevice::new();
    let result = device.create_buffer(&BufferDesc {
        name: "empty".to_string(),
        size: 0,
        usage: BufferUsage::VERTEX,
        memory: MemoryProperties::DEVICE_LOCAL,
        flags: AllocationFlags::empty(),
    });
    assert!(result.is_err());
}

#[test]
fn test_injected_failure_fires_once() {
    let device = MockGraphicsDevice::new();
    device.fail_on("create_semaphore");
    assert!(device.create_semaphore().is_err());
    assert!(device.create_semaphore().is_ok());
}

// ============================================================================
// Mapped memory and queue simulation
// ============================================================================

#[test]
fn test_mapped_write_then_read() {
    let device = MockGraphicsDevice::new();
    let (_, allocation) = host_buffer(&device, 8);
    device.write_mapped(allocation, 2, &[7, 8, 9]).unwrap();

    let mut out = [0u8; 8];
    device.read_mapped(allocation, 0, &mut out).unwrap();
    assert_eq!(out, [0, 0, 7, 8, 9, 0, 0, 0]);
}

#[test]
fn test_device_local_memory_is_not_mappable() {
    let device = MockGraphicsDevice::new();
    let (_, allocation) = device.create_buffer(&BufferDesc {
        name: "gpu".to_string(),
        size: 4,
        usage: BufferUsage::VERTEX,
        memory: MemoryProperties::DEVICE_LOCAL,
        flags: AllocationFlags::empty(),
    }).unwrap();
    assert!(device.write_mapped(allocation, 0, &[1]).is_err());
}

#[test]
fn test_copy_executes_at_submit() {
    let device = MockGraphicsDevice::new();
    let (src, src_alloc) = host_buffer(&device, 4);
    let (dst, _) = host_buffer(&device, 4);
    device.write_mapped(src_alloc, 0, &[1, 2, 3, 4]).unwrap();

    let pool = device.create_command_pool(CommandPoolFlags::TRANSIENT).unwrap();
    let cmd = device.allocate_command_buffer(pool).unwrap();
    device.begin_command_buffer(cmd, true).unwrap();
    device.cmd_copy_buffer(cmd, src, dst, BufferCopy { src_offset: 0, dst_offset: 0, size: 4 });
    device.end_command_buffer(cmd).unwrap();

    assert_eq!(device.buffer_contents(dst).unwrap(), vec![0, 0, 0, 0]);
    device.queue_submit(&SubmitDesc {
        command_buffers: &[cmd],
        wait_semaphores: &[],
        signal_semaphores: &[],
        fence: None,
    }).unwrap();
    assert_eq!(device.buffer_contents(dst).unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn test_rerecording_in_flight_buffer_is_a_violation() {
    let device = MockGraphicsDevice::new();
    let pool = device.create_command_pool(CommandPoolFlags::RESET_COMMAND_BUFFER).unwrap();
    let cmd = device.allocate_command_buffer(pool).unwrap();
    let fence = device.create_fence(false).unwrap();

    device.begin_command_buffer(cmd, false).unwrap();
    device.end_command_buffer(cmd).unwrap();
    device.queue_submit(&SubmitDesc {
        command_buffers: &[cmd],
        wait_semaphores: &[],
        signal_semaphores: &[],
        fence: Some(fence),
    }).unwrap();
    assert!(!device.fence_signaled(fence).unwrap());

    device.begin_command_buffer(cmd, false).unwrap();
    assert_eq!(device.violations().len(), 1);
}

#[test]
fn test_fence_signals_when_waited() {
    let device = MockGraphicsDevice::new();
    let pool = device.create_command_pool(CommandPoolFlags::RESET_COMMAND_BUFFER).unwrap();
    let cmd = device.allocate_command_buffer(pool).unwrap();
    let fence = device.create_fence(false).unwrap();

    device.begin_command_buffer(cmd, false).unwrap();
    device.end_command_buffer(cmd).unwrap();
    device.queue_submit(&SubmitDesc {
        command_buffers: &[cmd],
        wait_semaphores: &[],
        signal_semaphores: &[],
        fence: Some(fence),
    }).unwrap();

    device.wait_for_fence(fence).unwrap();
    assert!(device.fence_signaled(fence).unwrap());
    device.reset_fence(fence).unwrap();
    device.begin_command_buffer(cmd, false).unwrap();
    assert!(device.violations().is_empty());
}

#[test]
fn test_waiting_on_orphan_fence_fails() {
    let device = MockGraphicsDevice::new();
    let fence = device.create_fence(false).unwrap();
    assert!(device.wait_for_fence(fence).is_err());
}

// ============================================================================
// Descriptors and presentation
// ============================================================================

#[test]
fn test_descriptor_pool_reports_exhaustion() {
    let device = MockGraphicsDevice::new();
    let layout = device.create_descriptor_set_layout(&[]).unwrap();
    let pool = device.create_descriptor_pool(1, &[]).unwrap();
    assert!(device.allocate_descriptor_set(pool, layout).unwrap().is_some());
    assert!(device.allocate_descriptor_set(pool, layout).unwrap().is_none());
    assert_eq!(device.created("descriptor_set"), 1);
}

#[test]
fn test_scripted_acquire_and_present() {
    let device = MockGraphicsDevice::new();
    let format = SurfaceFormat { format: Format::B8G8R8A8_SRGB, color_space: ColorSpace::SrgbNonlinear };
    let swapchain = device.create_swapchain(&SwapchainDesc {
        surface_format: format,
        present_mode: PresentMode::Fifo,
        extent: Extent2D::new(800, 600),
        image_count: 3,
        old_swapchain: None,
    }).unwrap();
    let semaphore = device.create_semaphore().unwrap();

    device.push_acquire_outcome(AcquireOutcome::OutOfDate);
    assert_eq!(device.acquire_next_image(swapchain, semaphore).unwrap(), AcquireOutcome::OutOfDate);
    assert_eq!(
        device.acquire_next_image(swapchain, semaphore).unwrap(),
        AcquireOutcome::Acquired { image_index: 0, suboptimal: false }
    );

    device.push_present_outcome(PresentOutcome::Suboptimal);
    assert_eq!(device.queue_present(swapchain, 0, &[]).unwrap(), PresentOutcome::Suboptimal);
    assert_eq!(device.queue_present(swapchain, 0, &[]).unwrap(), PresentOutcome::Presented);
    assert_eq!(device.swapchain_images(swapchain).unwrap().len(), 3);
}

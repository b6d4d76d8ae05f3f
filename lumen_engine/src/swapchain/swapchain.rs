/// Swapchain - presentable images plus the per-image render targets
///
/// Every swapchain image gets a color view and a framebuffer; all framebuffers
/// share one depth attachment sized to the swapchain. Recreation waits for
/// the device to go idle, tears the targets down, creates the replacement
/// swapchain with the current one as `old_swapchain`, destroys the old
/// swapchain right after, and rebuilds the targets.

use std::sync::Arc;

use crate::allocator::{DeviceAllocator, ImageAllocation, OwnedAllocation};
use crate::error::Result;
use crate::graphics_device::{
    AcquireOutcome, Extent2D, FramebufferDesc, FramebufferHandle, GraphicsDevice, ImageAspect,
    ImageHandle, ImageUsage, ImageViewDesc, ImageViewHandle, PresentMode, PresentOutcome,
    SemaphoreHandle, SurfaceFormat, SwapchainDesc, SwapchainHandle,
};
use crate::swapchain::{choose_extent, choose_image_count, choose_present_mode, RenderPass};
use crate::{engine_debug, engine_info, engine_warn};

/// Views, depth attachment and framebuffers of one swapchain generation
#[derive(Default)]
struct SwapchainTargets {
    views: Vec<ImageViewHandle>,
    depth: Option<(ImageAllocation, ImageViewHandle)>,
    framebuffers: Vec<FramebufferHandle>,
}

impl SwapchainTargets {
    /// Destroy whatever has been created so far (framebuffers first)
    fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for framebuffer in self.framebuffers.drain(..) {
            device.destroy_framebuffer(framebuffer);
        }
        for view in self.views.drain(..) {
            device.destroy_image_view(view);
        }
        if let Some((depth, view)) = self.depth.take() {
            device.destroy_image_view(view);
            depth.free();
        }
    }
}

pub struct Swapchain {
    device: Arc<dyn GraphicsDevice>,
    handle: SwapchainHandle,
    surface_format: SurfaceFormat,
    present_preference: Option<PresentMode>,
    present_mode: PresentMode,
    extent: Extent2D,
    images: Vec<ImageHandle>,
    targets: SwapchainTargets,
}

impl Swapchain {
    /// Create the swapchain and its render targets
    ///
    /// # Arguments
    ///
    /// * `allocator` - Allocates the depth attachment
    /// * `render_pass` - Pass the framebuffers are compatible with
    /// * `surface_format` - Format chosen at startup (kept across recreations)
    /// * `present_preference` - Present mode to use when the surface offers it
    /// * `window_extent` - Window size, used when the surface leaves the extent open
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        allocator: &DeviceAllocator,
        render_pass: &RenderPass,
        surface_format: SurfaceFormat,
        present_preference: Option<PresentMode>,
        window_extent: Extent2D,
    ) -> Result<Self> {
        let support = device.surface_support()?;
        let present_mode = choose_present_mode(&support.present_modes, present_preference);
        let extent = choose_extent(&support.capabilities, window_extent);
        let image_count = choose_image_count(&support.capabilities);

        let handle = device.create_swapchain(&SwapchainDesc {
            surface_format,
            present_mode,
            extent,
            image_count,
            old_swapchain: None,
        })?;

        let mut swapchain = Self {
            device,
            handle,
            surface_format,
            present_preference,
            present_mode,
            extent,
            images: Vec::new(),
            targets: SwapchainTargets::default(),
        };
        swapchain.images = swapchain.device.swapchain_images(handle)?;
        swapchain.build_targets(allocator, render_pass)?;

        engine_info!("lumen::Swapchain",
            "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            extent.width, extent.height, swapchain.images.len(), surface_format.format, present_mode);
        Ok(swapchain)
    }

    /// Rebuild the swapchain against the current surface capabilities
    ///
    /// Returns `Ok(false)` without touching anything when the surface
    /// currently reports a zero extent.
    pub fn recreate(
        &mut self,
        allocator: &DeviceAllocator,
        render_pass: &RenderPass,
        window_extent: Extent2D,
    ) -> Result<bool> {
        self.device.device_wait_idle()?;

        let support = self.device.surface_support()?;
        let extent = choose_extent(&support.capabilities, window_extent);
        if extent.is_zero() {
            engine_debug!("lumen::Swapchain", "Surface extent is zero, recreation deferred");
            return Ok(false);
        }
        let present_mode = choose_present_mode(&support.present_modes, self.present_preference);
        let image_count = choose_image_count(&support.capabilities);

        self.targets.destroy(&*self.device);

        let old_swapchain = self.handle;
        let handle = self.device.create_swapchain(&SwapchainDesc {
            surface_format: self.surface_format,
            present_mode,
            extent,
            image_count,
            old_swapchain: Some(old_swapchain),
        })?;
        self.device.destroy_swapchain(old_swapchain);

        self.handle = handle;
        self.present_mode = present_mode;
        self.extent = extent;
        self.images = self.device.swapchain_images(handle)?;
        self.build_targets(allocator, render_pass)?;

        engine_info!("lumen::Swapchain",
            "Swapchain recreated: {}x{}, {} images", extent.width, extent.height, self.images.len());
        Ok(true)
    }

    pub fn handle(&self) -> SwapchainHandle {
        self.handle
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn surface_format(&self) -> SurfaceFormat {
        self.surface_format
    }

    pub fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Framebuffer targeting swapchain image `image_index`
    pub fn framebuffer(&self, image_index: u32) -> Option<FramebufferHandle> {
        self.targets.framebuffers.get(image_index as usize).copied()
    }

    /// Acquire the next image, signaling `signal` when it can be rendered to
    pub fn acquire_next_image(&self, signal: SemaphoreHandle) -> Result<AcquireOutcome> {
        self.device.acquire_next_image(self.handle, signal)
    }

    /// Present `image_index` once `wait` is signaled
    pub fn present(&self, image_index: u32, wait: SemaphoreHandle) -> Result<PresentOutcome> {
        self.device.queue_present(self.handle, image_index, &[wait])
    }

    // ===== INTERNAL =====

    fn build_targets(&mut self, allocator: &DeviceAllocator, render_pass: &RenderPass) -> Result<()> {
        let mut targets = SwapchainTargets::default();
        if let Err(e) = self.fill_targets(&mut targets, allocator, render_pass) {
            engine_warn!("lumen::Swapchain", "Render target creation failed, releasing partial targets");
            targets.destroy(&*self.device);
            return Err(e);
        }
        self.targets = targets;
        Ok(())
    }

    fn fill_targets(
        &self,
        targets: &mut SwapchainTargets,
        allocator: &DeviceAllocator,
        render_pass: &RenderPass,
    ) -> Result<()> {
        for image in &self.images {
            targets.views.push(self.device.create_image_view(&ImageViewDesc {
                image: *image,
                format: self.surface_format.format,
                aspect: ImageAspect::Color,
            })?);
        }

        let depth = allocator.allocate_image_attachment(
            self.extent.width,
            self.extent.height,
            render_pass.depth_format(),
            ImageUsage::DEPTH_STENCIL_ATTACHMENT,
        )?;
        let depth_view = self.device.create_image_view(&ImageViewDesc {
            image: depth.image(),
            format: depth.format(),
            aspect: ImageAspect::Depth,
        });
        let depth_view = match depth_view {
            Ok(view) => view,
            Err(e) => {
                depth.free();
                return Err(e);
            }
        };
        targets.depth = Some((depth, depth_view));

        for view in &targets.views {
            targets.framebuffers.push(self.device.create_framebuffer(&FramebufferDesc {
                render_pass: render_pass.handle(),
                attachments: vec![*view, depth_view],
                extent: self.extent,
            })?);
        }
        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.targets.destroy(&*self.device);
        self.device.destroy_swapchain(self.handle);
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;

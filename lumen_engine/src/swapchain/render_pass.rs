/// Owned render pass: one color attachment presented to the surface plus depth

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{Format, GraphicsDevice, RenderPassDesc, RenderPassHandle};

pub struct RenderPass {
    device: Arc<dyn GraphicsDevice>,
    handle: RenderPassHandle,
    color_format: Format,
    depth_format: Format,
}

impl RenderPass {
    pub fn new(device: Arc<dyn GraphicsDevice>, color_format: Format, depth_format: Format) -> Result<Self> {
        let handle = device.create_render_pass(&RenderPassDesc { color_format, depth_format })?;
        Ok(Self { device, handle, color_format, depth_format })
    }

    pub fn handle(&self) -> RenderPassHandle {
        self.handle
    }

    pub fn color_format(&self) -> Format {
        self.color_format
    }

    pub fn depth_format(&self) -> Format {
        self.depth_format
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        self.device.destroy_render_pass(self.handle);
    }
}

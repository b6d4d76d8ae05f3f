/*!
# Lumen - Vulkan Backend

Vulkan implementation of the Lumen `GraphicsDevice` trait, built on `ash`
for the API bindings and `gpu-allocator` for memory management.

```no_run
use std::sync::Arc;
use lumen_engine::lumen::{Application, Config};
use lumen_engine::lumen::device::{Extent2D, GraphicsDevice};
use lumen_engine_renderer_vulkan::VulkanGraphicsDevice;

# fn run(window: &winit::window::Window) -> lumen_engine::lumen::Result<()> {
let config = Config::default();
let device: Arc<dyn GraphicsDevice> = Arc::new(VulkanGraphicsDevice::new(window, &config)?);
let app = Application::new(device, config, Extent2D::new(1280, 720))?;
# Ok(())
# }
```
*/

mod debug;
mod vulkan_context;
mod vulkan_format;
mod vulkan_graphics_device;

pub use vulkan_graphics_device::VulkanGraphicsDevice;

pub use debug::{get_validation_stats, print_validation_stats_report, ValidationStats};

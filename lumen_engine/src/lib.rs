/*!
# Lumen Engine

Backend-agnostic core of the Lumen real-time renderer.

The core talks to the GPU only through the [`GraphicsDevice`](graphics_device::GraphicsDevice)
trait; the Vulkan implementation lives in `lumen_engine_renderer_vulkan`.

## Architecture

- **DeviceAllocator**: owned buffer/image allocations, staging uploads, immediate submits
- **DescriptorCache**: content-addressed descriptor pools and sets, one cache per frame slot
- **Frame / FrameRing**: per-slot command buffer, semaphores, fence and descriptor cache
- **Swapchain / RenderPass**: presentable images, depth attachment, framebuffers, recreation guard
- **Material / Mesh / GraphicsPipeline / RenderObject**: what gets drawn
- **Application**: registry and frame loop (acquire, update descriptors, record, submit, present)
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod graphics_device;
pub mod allocator;
pub mod descriptor;
pub mod frame;
pub mod swapchain;
pub mod resource;
pub mod app;

#[cfg(test)]
mod test_utils;

// Main lumen namespace module
pub mod lumen {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton (global logger)
    pub use crate::engine::Engine;

    // Configuration
    pub use crate::config::{Config, DebugSeverity};

    // Orchestrator
    pub use crate::app::{Application, FrameOutcome, FramePacer, FrameStats};

    // Logging sub-module (types only; the engine_* macros live at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, FacadeLogger, LogEntry, LogSeverity, Logger};
    }

    // Device seam sub-module
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }
}

// Re-export math library at crate root
pub use glam;

/// Swapchain module - presentation images, render pass, framebuffers and recreation

pub mod recreation;
pub mod render_pass;
pub mod surface_selection;
pub mod swapchain;

pub use recreation::*;
pub use render_pass::*;
pub use surface_selection::*;
pub use swapchain::*;

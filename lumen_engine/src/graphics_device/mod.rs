/// Graphics device module - the backend seam and the types crossing it

pub mod graphics_device;
pub mod types;

pub use graphics_device::*;
pub use types::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;

/// Allocator module - GPU memory ownership and staging transfers

pub mod device_allocator;

pub use device_allocator::*;

/// Descriptor module - layouts and the per-frame-slot descriptor cache

pub mod descriptor_cache;
pub mod descriptor_set_layout;

pub use descriptor_cache::*;
pub use descriptor_set_layout::*;

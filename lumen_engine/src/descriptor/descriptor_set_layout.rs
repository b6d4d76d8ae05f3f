/// Owned descriptor set layout

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::graphics_device::{
    DescriptorPoolSize, DescriptorSetLayoutBinding, DescriptorSetLayoutHandle, DescriptorType,
    GraphicsDevice,
};
use crate::engine_error;

/// Descriptor set layout together with the bindings it was built from
///
/// The bindings are kept sorted by binding index; two layouts with the same
/// bindings share a `signature()` and are interchangeable for pooling.
pub struct DescriptorSetLayout {
    device: Arc<dyn GraphicsDevice>,
    handle: DescriptorSetLayoutHandle,
    bindings: Vec<DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Create a layout (bindings are sorted by index, duplicates are rejected)
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        mut bindings: Vec<DescriptorSetLayoutBinding>,
    ) -> Result<Self> {
        bindings.sort_by_key(|b| b.binding);
        if bindings.windows(2).any(|w| w[0].binding == w[1].binding) {
            engine_error!("lumen::DescriptorSetLayout", "Duplicate binding index in layout {:?}", bindings);
            return Err(Error::InvalidResource("duplicate descriptor binding index".to_string()));
        }
        let handle = device.create_descriptor_set_layout(&bindings)?;
        Ok(Self { device, handle, bindings })
    }

    pub fn handle(&self) -> DescriptorSetLayoutHandle {
        self.handle
    }

    /// Structural identity of the layout (sorted bindings)
    pub fn signature(&self) -> &[DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Pool sizes able to hold `max_sets` sets of this layout
    pub fn pool_sizes(&self, max_sets: u32) -> Vec<DescriptorPoolSize> {
        let mut sizes: Vec<DescriptorPoolSize> = Vec::new();
        for binding in &self.bindings {
            let count = binding.descriptor_count * max_sets;
            match sizes.iter_mut().find(|s| s.descriptor_type == binding.descriptor_type) {
                Some(size) => size.count += count,
                None => sizes.push(DescriptorPoolSize { descriptor_type: binding.descriptor_type, count }),
            }
        }
        sizes.sort_by_key(|s| s.descriptor_type);
        sizes
    }

    /// Number of bindings of the given type
    pub fn count_of(&self, descriptor_type: DescriptorType) -> usize {
        self.bindings.iter().filter(|b| b.descriptor_type == descriptor_type).count()
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        self.device.destroy_descriptor_set_layout(self.handle);
    }
}

impl std::fmt::Debug for DescriptorSetLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorSetLayout")
            .field("handle", &self.handle)
            .field("bindings", &self.bindings)
            .finish()
    }
}

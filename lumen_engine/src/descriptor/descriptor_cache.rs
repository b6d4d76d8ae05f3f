/// DescriptorCache - content-addressed descriptor pools and sets of one frame slot
///
/// Pools are keyed by the layout signature, sets by the full binding content
/// (layout signature + every buffer binding + every image binding, in binding
/// index order). Nothing is ever evicted: everything lives until the cache is
/// dropped, and dropping the pools releases their sets.

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::descriptor::DescriptorSetLayout;
use crate::error::Result;
use crate::graphics_device::{
    BufferBinding, DescriptorPoolHandle, DescriptorResource, DescriptorSetHandle,
    DescriptorSetLayoutBinding, DescriptorWrite, GraphicsDevice, ImageBinding,
};
use crate::{engine_debug, engine_err, engine_info};

/// Sets per descriptor pool before the cache chains a new pool
pub const DEFAULT_SETS_PER_POOL: u32 = 16;

/// Exact structural identity of a cached descriptor set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorSetKey {
    pub layout: Vec<DescriptorSetLayoutBinding>,
    pub buffers: Vec<(u32, BufferBinding)>,
    pub images: Vec<(u32, ImageBinding)>,
}

impl DescriptorSetKey {
    pub fn new(
        layout: &DescriptorSetLayout,
        buffers: &BTreeMap<u32, BufferBinding>,
        images: &BTreeMap<u32, ImageBinding>,
    ) -> Self {
        Self {
            layout: layout.signature().to_vec(),
            buffers: buffers.iter().map(|(k, v)| (*k, *v)).collect(),
            images: images.iter().map(|(k, v)| (*k, *v)).collect(),
        }
    }

    /// Writes that fill every binding of the set
    fn writes(&self) -> Vec<DescriptorWrite> {
        let buffers = self.buffers.iter().map(|(binding, info)| DescriptorWrite {
            binding: *binding,
            resource: DescriptorResource::Buffer(*info),
        });
        let images = self.images.iter().map(|(binding, info)| DescriptorWrite {
            binding: *binding,
            resource: DescriptorResource::Image(*info),
        });
        let mut writes: Vec<DescriptorWrite> = buffers.chain(images).collect();
        writes.sort_by_key(|w| w.binding);
        writes
    }
}

/// Cached descriptor set and the content it must hold
#[derive(Debug)]
pub struct DescriptorSet {
    handle: DescriptorSetHandle,
    writes: Vec<DescriptorWrite>,
}

impl DescriptorSet {
    pub fn handle(&self) -> DescriptorSetHandle {
        self.handle
    }

    pub fn writes(&self) -> &[DescriptorWrite] {
        &self.writes
    }

    /// Push every binding of the set to the device
    pub fn update_all(&self, device: &dyn GraphicsDevice) {
        device.update_descriptor_set(self.handle, &self.writes);
    }
}

pub struct DescriptorCache {
    device: Arc<dyn GraphicsDevice>,
    /// Pool chain per layout signature; the last pool is the one allocated from
    pools: FxHashMap<Vec<DescriptorSetLayoutBinding>, Vec<DescriptorPoolHandle>>,
    sets: FxHashMap<DescriptorSetKey, DescriptorSet>,
    sets_per_pool: u32,
}

impl DescriptorCache {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self::with_pool_capacity(device, DEFAULT_SETS_PER_POOL)
    }

    /// Cache whose pools hold `sets_per_pool` sets each
    pub fn with_pool_capacity(device: Arc<dyn GraphicsDevice>, sets_per_pool: u32) -> Self {
        Self {
            device,
            pools: FxHashMap::default(),
            sets: FxHashMap::default(),
            sets_per_pool: sets_per_pool.max(1),
        }
    }

    /// Current pool for a layout signature, created on first use
    pub fn descriptor_pool(&mut self, layout: &DescriptorSetLayout) -> Result<DescriptorPoolHandle> {
        if let Some(pool) = self.pools.get(layout.signature()).and_then(|chain| chain.last()) {
            return Ok(*pool);
        }
        let pool = self.device.create_descriptor_pool(self.sets_per_pool, &layout.pool_sizes(self.sets_per_pool))?;
        self.pools.insert(layout.signature().to_vec(), vec![pool]);
        engine_debug!("lumen::DescriptorCache", "Created descriptor pool for {} bindings", layout.signature().len());
        Ok(pool)
    }

    /// Cached set for (layout, buffers, images), allocated on first request
    ///
    /// # Arguments
    ///
    /// * `layout` - Layout the set is allocated with
    /// * `buffers` - Binding index -> uniform buffer range
    /// * `images` - Binding index -> sampled image
    pub fn descriptor_set(
        &mut self,
        layout: &DescriptorSetLayout,
        buffers: &BTreeMap<u32, BufferBinding>,
        images: &BTreeMap<u32, ImageBinding>,
    ) -> Result<DescriptorSetHandle> {
        let key = DescriptorSetKey::new(layout, buffers, images);
        if let Some(set) = self.sets.get(&key) {
            return Ok(set.handle);
        }

        let handle = self.allocate(layout)?;
        let writes = key.writes();
        self.sets.insert(key, DescriptorSet { handle, writes });
        engine_debug!("lumen::DescriptorCache", "Descriptor set cache grew to {} sets", self.sets.len());
        Ok(handle)
    }

    /// Push the binding content of every cached set to the device
    ///
    /// Must run before submitting commands that bind these sets.
    pub fn update_descriptor_sets(&self) {
        for set in self.sets.values() {
            set.update_all(&*self.device);
        }
    }

    /// Total number of pools across all layouts
    pub fn pool_count(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    pub fn get(&self, key: &DescriptorSetKey) -> Option<&DescriptorSet> {
        self.sets.get(key)
    }

    /// Destroy every pool (and with them every set)
    pub fn clear(&mut self) {
        self.sets.clear();
        for (_, chain) in self.pools.drain() {
            for pool in chain {
                self.device.destroy_descriptor_pool(pool);
            }
        }
    }

    // ===== INTERNAL =====

    /// Allocate from the layout's current pool, chaining a new pool when it is full
    fn allocate(&mut self, layout: &DescriptorSetLayout) -> Result<DescriptorSetHandle> {
        let pool = self.descriptor_pool(layout)?;
        if let Some(set) = self.device.allocate_descriptor_set(pool, layout.handle())? {
            return Ok(set);
        }

        let new_pool = self.device.create_descriptor_pool(self.sets_per_pool, &layout.pool_sizes(self.sets_per_pool))?;
        let chain = self.pools.entry(layout.signature().to_vec()).or_default();
        chain.push(new_pool);
        engine_info!("lumen::DescriptorCache",
            "Descriptor pool exhausted, created new pool (total: {})", chain.len());

        self.device.allocate_descriptor_set(new_pool, layout.handle())?
            .ok_or_else(|| engine_err!("lumen::DescriptorCache",
                "Failed to allocate descriptor set after pool growth"))
    }
}

impl Drop for DescriptorCache {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
#[path = "descriptor_cache_tests.rs"]
mod tests;

/// Application - owns every GPU object and drives the frame loop
///
/// One call to `draw_frame()` runs the whole cycle for the current slot:
/// wait on its fence, acquire a swapchain image, resolve and update the
/// slot's descriptor sets, record, submit, present, advance. Out-of-date and
/// suboptimal swapchains are not errors: they queue a recreation, which runs
/// at the start of the next frame.
///
/// Fields are declared in teardown order: frame slots and pipelines go
/// before the materials and meshes they reference, the swapchain before its
/// render pass, and the allocator last.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Mat4;
use slotmap::SlotMap;

use crate::allocator::DeviceAllocator;
use crate::app::{FramePacer, FrameStats};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame::FrameRing;
use crate::graphics_device::{
    AcquireOutcome, ClearValue, CommandBufferHandle, DescriptorSetHandle, Extent2D,
    GraphicsDevice, PresentOutcome, Rect2D, ShaderStageFlags, Viewport,
};
use crate::resource::{
    GraphicsPipeline, Material, MaterialId, MaterialResource, Mesh, MeshData, MeshKey,
    RenderObject, RenderObjectKey,
};
use crate::swapchain::{choose_surface_format, RecreationState, RenderPass, Swapchain};
use crate::{engine_debug, engine_error, engine_info, engine_warn};

/// What a call to `draw_frame()` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was submitted and presented
    Rendered,
    /// The swapchain was out of date; nothing was submitted
    Skipped,
    /// The window has a zero extent; rendering waits for a resize
    Paused,
}

pub struct Application {
    frames: FrameRing,
    pipelines: BTreeMap<MaterialId, GraphicsPipeline>,
    render_objects: SlotMap<RenderObjectKey, RenderObject>,
    meshes: SlotMap<MeshKey, Mesh>,
    materials: BTreeMap<MaterialId, Material>,
    swapchain: Swapchain,
    render_pass: RenderPass,
    allocator: DeviceAllocator,
    device: Arc<dyn GraphicsDevice>,
    config: Config,
    recreation: RecreationState,
    window_extent: Extent2D,
    view_projection: Mat4,
    pacer: FramePacer,
    stats: FrameStats,
    finished: bool,
}

impl Application {
    /// Build the render pass, swapchain and frame slots for a window
    ///
    /// # Arguments
    ///
    /// * `device` - Backend the application renders with
    /// * `config` - Validated here (frame slot count, FPS target)
    /// * `window_extent` - Current window size in pixels
    pub fn new(device: Arc<dyn GraphicsDevice>, config: Config, window_extent: Extent2D) -> Result<Self> {
        config.validate()?;

        let allocator = DeviceAllocator::new(Arc::clone(&device))?;
        let support = device.surface_support()?;
        let surface_format = choose_surface_format(&support.formats)?;
        let depth_format = device.find_depth_format()?;
        let render_pass = RenderPass::new(Arc::clone(&device), surface_format.format, depth_format)?;
        let swapchain = Swapchain::new(
            Arc::clone(&device),
            &allocator,
            &render_pass,
            surface_format,
            config.present_mode_preference,
            window_extent,
        )?;
        let frames = FrameRing::new(Arc::clone(&device), config.concurrent_frames)?;

        engine_info!("lumen::Application",
            "Application '{}' ready: {} frame slots, depth {:?}", config.app_name, frames.len(), depth_format);

        Ok(Self {
            frames,
            pipelines: BTreeMap::new(),
            render_objects: SlotMap::with_key(),
            meshes: SlotMap::with_key(),
            materials: BTreeMap::new(),
            swapchain,
            render_pass,
            allocator,
            device,
            pacer: FramePacer::new(config.target_fps),
            config,
            recreation: RecreationState::new(),
            window_extent,
            view_projection: Mat4::IDENTITY,
            stats: FrameStats::new(),
            finished: false,
        })
    }

    // ===== REGISTRY =====

    /// Allocator for building materials outside the application
    pub fn allocator(&self) -> &DeviceAllocator {
        &self.allocator
    }

    /// Register a material and build its pipeline
    pub fn add_material(&mut self, material: Material) -> Result<MaterialId> {
        let id = material.id();
        if self.materials.contains_key(&id) {
            engine_error!("lumen::Application", "Material id {} is already registered", id.0);
            return Err(Error::InvalidResource(format!("material id {} already registered", id.0)));
        }
        let pipeline = GraphicsPipeline::for_material(Arc::clone(&self.device), &material, &self.render_pass)?;
        self.pipelines.insert(id, pipeline);
        self.materials.insert(id, material);
        Ok(id)
    }

    pub fn add_material_from_resource(&mut self, id: MaterialId, resource: &MaterialResource) -> Result<MaterialId> {
        let material = Material::from_resource(id, &self.allocator, resource)?;
        self.add_material(material)
    }

    pub fn add_mesh(&mut self, data: &MeshData) -> Result<MeshKey> {
        let mesh = Mesh::upload(&self.allocator, data)?;
        Ok(self.meshes.insert(mesh))
    }

    /// Register an object drawn every frame (its material and mesh must exist)
    pub fn add_render_object(&mut self, object: RenderObject) -> Result<RenderObjectKey> {
        if !self.materials.contains_key(&object.material) {
            engine_error!("lumen::Application", "Render object references unknown material {}", object.material.0);
            return Err(Error::InvalidResource(format!("unknown material {}", object.material.0)));
        }
        if !self.meshes.contains_key(object.mesh) {
            engine_error!("lumen::Application", "Render object references an unknown mesh");
            return Err(Error::InvalidResource("unknown mesh".to_string()));
        }
        Ok(self.render_objects.insert(object))
    }

    pub fn render_object_mut(&mut self, key: RenderObjectKey) -> Option<&mut RenderObject> {
        self.render_objects.get_mut(key)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    pub fn set_view_projection(&mut self, view_projection: Mat4) {
        self.view_projection = view_projection;
    }

    // ===== WINDOW EVENTS =====

    /// Record a window resize; the swapchain is rebuilt before the next frame
    ///
    /// Repeated calls before that frame coalesce into one recreation.
    pub fn notify_resized(&mut self, extent: Extent2D) {
        self.window_extent = extent;
        self.recreation.request(extent);
    }

    pub fn set_target_fps(&mut self, target_fps: u32) {
        self.pacer.set_target_fps(target_fps);
    }

    // ===== STATE =====

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn frames(&self) -> &FrameRing {
        &self.frames
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn is_paused(&self) -> bool {
        self.recreation.is_paused()
    }

    /// True once single-frame mode has rendered its frame
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // ===== FRAME LOOP =====

    /// Draw one frame, then sleep out the rest of the frame period
    pub fn run_frame(&mut self) -> Result<FrameOutcome> {
        let outcome = self.draw_frame()?;
        self.pacer.wait();
        Ok(outcome)
    }

    /// Draw one frame on the current slot
    pub fn draw_frame(&mut self) -> Result<FrameOutcome> {
        if self.finished {
            return Ok(FrameOutcome::Skipped);
        }
        if let Some(outcome) = self.apply_pending_recreation()? {
            return Ok(outcome);
        }

        self.frames.current_mut().wait()?;

        let image_available = self.frames.current().image_available();
        let (image_index, suboptimal) = match self.swapchain.acquire_next_image(image_available) {
            Ok(AcquireOutcome::Acquired { image_index, suboptimal }) => (image_index, suboptimal),
            Ok(AcquireOutcome::OutOfDate) | Err(Error::SwapchainOutOfDate) => {
                engine_debug!("lumen::Application", "Swapchain out of date on acquire, frame skipped");
                self.recreation.request(self.window_extent);
                return Ok(FrameOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        let sets = self.resolve_descriptor_sets()?;
        self.record_and_submit(image_index, &sets)?;

        let render_finished = self.frames.current().render_finished();
        match self.swapchain.present(image_index, render_finished) {
            Ok(PresentOutcome::Presented) if !suboptimal => {}
            Ok(_) | Err(Error::SwapchainOutOfDate) => {
                engine_debug!("lumen::Application", "Swapchain suboptimal or out of date, recreation queued");
                self.recreation.request(self.window_extent);
            }
            Err(e) => return Err(e),
        }

        self.frames.advance();
        self.stats.record_frame();
        if self.config.single_frame {
            engine_info!("lumen::Application", "Single frame rendered, finishing");
            self.finished = true;
        }
        Ok(FrameOutcome::Rendered)
    }

    // ===== INTERNAL =====

    /// Run a queued swapchain recreation; `Some(Paused)` while the extent is zero
    fn apply_pending_recreation(&mut self) -> Result<Option<FrameOutcome>> {
        if !self.recreation.is_pending() {
            return Ok(None);
        }
        let Some(extent) = self.recreation.begin() else {
            return Ok(self.recreation.is_paused().then_some(FrameOutcome::Paused));
        };

        match self.swapchain.recreate(&self.allocator, &self.render_pass, extent) {
            Ok(true) => {
                self.recreation.finish();
                Ok(None)
            }
            Ok(false) => {
                self.recreation.defer(Extent2D::new(0, 0));
                Ok(Some(FrameOutcome::Paused))
            }
            Err(e) => {
                self.recreation.finish();
                engine_error!("lumen::Application", "Swapchain recreation failed: {}", e);
                Err(e)
            }
        }
    }

    /// Descriptor set of the current slot for every render object, in draw order
    fn resolve_descriptor_sets(&mut self) -> Result<Vec<DescriptorSetHandle>> {
        let frame = self.frames.current_mut();
        let mut sets = Vec::with_capacity(self.render_objects.len());
        for object in self.render_objects.values() {
            let material = self.materials.get(&object.material).ok_or_else(|| {
                Error::ContractViolation(format!("render object uses unregistered material {}", object.material.0))
            })?;
            sets.push(frame.descriptor_set(material.layout(), material.buffer_infos(), material.image_infos())?);
        }
        frame.update_descriptor_sets();
        Ok(sets)
    }

    fn record_and_submit(&mut self, image_index: u32, sets: &[DescriptorSetHandle]) -> Result<()> {
        let framebuffer = self.swapchain.framebuffer(image_index).ok_or_else(|| {
            engine_error!("lumen::Application", "Acquired image {} has no framebuffer", image_index);
            Error::ContractViolation(format!("no framebuffer for swapchain image {}", image_index))
        })?;
        let extent = self.swapchain.extent();

        let command_buffer = self.frames.current_mut().begin_recording()?;
        self.device.cmd_begin_render_pass(
            command_buffer,
            self.render_pass.handle(),
            framebuffer,
            extent,
            &[
                ClearValue::Color(self.config.clear_color),
                ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
            ],
        );
        self.device.cmd_set_viewport(command_buffer, Viewport::from_extent(extent));
        self.device.cmd_set_scissor(command_buffer, Rect2D::from_extent(extent));
        self.record_draws(command_buffer, sets)?;
        self.device.cmd_end_render_pass(command_buffer);

        self.frames.current_mut().submit()
    }

    fn record_draws(&self, command_buffer: CommandBufferHandle, sets: &[DescriptorSetHandle]) -> Result<()> {
        let device = &*self.device;
        let mut bound = None;
        for (object, set) in self.render_objects.values().zip(sets) {
            let pipeline = self.pipelines.get(&object.material).ok_or_else(|| {
                Error::ContractViolation(format!("no pipeline for material {}", object.material.0))
            })?;
            let Some(mesh) = self.meshes.get(object.mesh) else {
                engine_warn!("lumen::Application", "Render object references a removed mesh, skipped");
                continue;
            };

            if bound != Some(object.material) {
                device.cmd_bind_pipeline(command_buffer, pipeline.handle());
                bound = Some(object.material);
            }
            device.cmd_bind_descriptor_set(command_buffer, pipeline.layout(), 0, *set);
            device.cmd_bind_vertex_buffer(command_buffer, mesh.vertex_buffer().buffer(), 0);
            device.cmd_bind_index_buffer(command_buffer, mesh.index_buffer().buffer(), 0, mesh.index_type());
            let constants = object.push_constants(self.view_projection);
            device.cmd_push_constants(
                command_buffer,
                pipeline.layout(),
                ShaderStageFlags::VERTEX,
                0,
                bytemuck::bytes_of(&constants),
            );
            device.cmd_draw_indexed(command_buffer, mesh.index_count(), 1);
        }
        Ok(())
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        if let Err(e) = self.device.device_wait_idle() {
            engine_error!("lumen::Application", "device_wait_idle failed during shutdown: {}", e);
        }
        engine_info!("lumen::Application", "Shutting down after {} frames", self.stats.frame_count());
    }
}

#[cfg(test)]
#[path = "application_tests.rs"]
mod tests;

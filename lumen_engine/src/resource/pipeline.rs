/// GraphicsPipeline - pipeline state built for one material
///
/// The pipeline layout holds the material's descriptor set layout at set 0
/// and a vertex-stage push constant range for `PushConstants`. Viewport and
/// scissor are dynamic, so a pipeline survives swapchain recreation as long
/// as the render pass stays compatible.

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{
    CullMode, GraphicsDevice, GraphicsPipelineDesc, PipelineHandle, PipelineLayoutDesc,
    PipelineLayoutHandle, PushConstantRange, ShaderStageFlags,
};
use crate::resource::{Material, MaterialId, PushConstants, ShaderModule, Vertex};
use crate::swapchain::RenderPass;
use crate::engine_debug;

pub struct GraphicsPipeline {
    device: Arc<dyn GraphicsDevice>,
    material: MaterialId,
    layout: PipelineLayoutHandle,
    handle: PipelineHandle,
}

impl GraphicsPipeline {
    /// Build the pipeline drawing `material` inside `render_pass`
    ///
    /// Shader modules only live for the duration of the call.
    pub fn for_material(
        device: Arc<dyn GraphicsDevice>,
        material: &Material,
        render_pass: &RenderPass,
    ) -> Result<Self> {
        let vertex = ShaderModule::new(Arc::clone(&device), material.vertex_shader())?;
        let fragment = ShaderModule::new(Arc::clone(&device), material.fragment_shader())?;

        let layout = device.create_pipeline_layout(&PipelineLayoutDesc {
            set_layouts: vec![material.layout().handle()],
            push_constant_ranges: vec![PushConstantRange {
                stages: ShaderStageFlags::VERTEX,
                offset: 0,
                size: std::mem::size_of::<PushConstants>() as u32,
            }],
        })?;

        let handle = device.create_graphics_pipeline(&GraphicsPipelineDesc {
            vertex_shader: vertex.handle(),
            fragment_shader: fragment.handle(),
            layout,
            render_pass: render_pass.handle(),
            vertex_input: Vertex::vertex_input(),
            cull_mode: CullMode::Back,
            depth_test: true,
        });
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                device.destroy_pipeline_layout(layout);
                return Err(e);
            }
        };

        engine_debug!("lumen::GraphicsPipeline", "Pipeline created for material '{}'", material.name());
        Ok(Self { device, material: material.id(), layout, handle })
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn handle(&self) -> PipelineHandle {
        self.handle
    }

    pub fn layout(&self) -> PipelineLayoutHandle {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        self.device.destroy_pipeline(self.handle);
        self.device.destroy_pipeline_layout(self.layout);
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;

/// Shader resources: CPU-side SPIR-V blobs and the GPU modules built from them

use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::graphics_device::{GraphicsDevice, ShaderModuleHandle, ShaderStage};
use crate::{engine_debug, engine_error};

/// First word of every SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Validated SPIR-V code for one stage (entry point "main")
#[derive(Debug, Clone)]
pub struct ShaderResource {
    name: String,
    stage: ShaderStage,
    code: Vec<u32>,
}

impl ShaderResource {
    /// Wrap raw SPIR-V bytes (little-endian words)
    ///
    /// # Arguments
    ///
    /// * `name` - Debug name (usually the file name)
    /// * `stage` - Pipeline stage the module is compiled for
    /// * `bytes` - SPIR-V binary; length must be a multiple of 4 and start with the magic number
    pub fn from_spirv(name: impl Into<String>, stage: ShaderStage, bytes: &[u8]) -> Result<Self> {
        let name = name.into();
        if bytes.is_empty() || bytes.len() % 4 != 0 {
            engine_error!("lumen::ShaderResource", "Shader '{}' is {} bytes, not a whole number of words", name, bytes.len());
            return Err(Error::InvalidResource(format!(
                "shader '{}': SPIR-V length {} is not a non-zero multiple of 4", name, bytes.len()
            )));
        }
        let code: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect();
        if code[0] != SPIRV_MAGIC {
            engine_error!("lumen::ShaderResource", "Shader '{}' has bad magic {:#010x}", name, code[0]);
            return Err(Error::InvalidResource(format!("shader '{}': not a SPIR-V module", name)));
        }
        Ok(Self { name, stage, code })
    }

    /// Read a SPIR-V file from disk
    pub fn load(path: impl AsRef<Path>, stage: ShaderStage) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            engine_error!("lumen::ShaderResource", "Failed to read shader {}: {}", path.display(), e);
            Error::InvalidResource(format!("failed to read shader {}: {}", path.display(), e))
        })?;
        engine_debug!("lumen::ShaderResource", "Loaded {} ({} bytes)", path.display(), bytes.len());
        Self::from_spirv(path.display().to_string(), stage, &bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn code(&self) -> &[u32] {
        &self.code
    }
}

/// GPU shader module, destroyed on drop
pub struct ShaderModule {
    device: Arc<dyn GraphicsDevice>,
    handle: ShaderModuleHandle,
}

impl ShaderModule {
    pub fn new(device: Arc<dyn GraphicsDevice>, resource: &ShaderResource) -> Result<Self> {
        let handle = device.create_shader_module(resource.code(), resource.stage())?;
        Ok(Self { device, handle })
    }

    pub fn handle(&self) -> ShaderModuleHandle {
        self.handle
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        self.device.destroy_shader_module(self.handle);
    }
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;

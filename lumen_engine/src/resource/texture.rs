/// Texture resources: CPU-side RGBA images and their sampled GPU copies

use std::sync::Arc;

use crate::allocator::{DeviceAllocator, ImageAllocation};
use crate::error::{Error, Result};
use crate::graphics_device::{
    Extent2D, Format, GraphicsDevice, ImageAspect, ImageViewDesc, ImageViewHandle,
};
use crate::engine_error;

/// Format every texture is uploaded with
pub const TEXTURE_FORMAT: Format = Format::R8G8B8A8_SRGB;

/// Tightly packed 8-bit RGBA image in host memory
#[derive(Debug, Clone, PartialEq)]
pub struct ImageResource {
    name: String,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl ImageResource {
    /// # Arguments
    ///
    /// * `pixels` - `width * height * 4` bytes, row-major, RGBA
    pub fn new(name: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            engine_error!("lumen::ImageResource",
                "Image '{}' {}x{} has {} bytes, expected {}", name, width, height, pixels.len(), expected);
            return Err(Error::InvalidResource(format!(
                "image '{}': {} bytes for {}x{} RGBA", name, pixels.len(), width, height
            )));
        }
        Ok(Self { name, width, height, pixels })
    }

    /// Single-colored image
    pub fn solid(name: impl Into<String>, width: u32, height: u32, color: [u8; 4]) -> Result<Self> {
        let pixels = color.repeat(width as usize * height as usize);
        Self::new(name, width, height, pixels)
    }

    /// Two-colored checkerboard with square cells of `cell` pixels
    pub fn checkerboard(name: impl Into<String>, size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Result<Self> {
        let cell = cell.max(1);
        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let color = if (x / cell + y / cell) % 2 == 0 { a } else { b };
                pixels.extend_from_slice(&color);
            }
        }
        Self::new(name, size, size, pixels)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Sampled texture: device-local image in SHADER_READ_ONLY_OPTIMAL plus its view
pub struct Texture {
    device: Arc<dyn GraphicsDevice>,
    view: ImageViewHandle,
    image: ImageAllocation,
}

impl Texture {
    /// Upload an image through a staging buffer and create its view
    pub fn upload(allocator: &DeviceAllocator, resource: &ImageResource) -> Result<Self> {
        let image = allocator.allocate_texture(resource.width, resource.height, TEXTURE_FORMAT, &resource.pixels)?;
        let device = Arc::clone(allocator.device());
        let view = device.create_image_view(&ImageViewDesc {
            image: image.image(),
            format: TEXTURE_FORMAT,
            aspect: ImageAspect::Color,
        })?;
        Ok(Self { device, view, image })
    }

    pub fn view(&self) -> ImageViewHandle {
        self.view
    }

    pub fn image(&self) -> &ImageAllocation {
        &self.image
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        // The image itself is released when the `image` field drops
        self.device.destroy_image_view(self.view);
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;

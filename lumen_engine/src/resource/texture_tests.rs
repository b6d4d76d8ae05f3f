/// Unit tests for ImageResource / Texture

use std::sync::Arc;

use crate::allocator::DeviceAllocator;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::*;
use crate::resource::texture::*;

// ============================================================================
// ImageResource
// ============================================================================

#[test]
fn test_image_resource_validates_pixel_count() {
    assert!(ImageResource::new("ok", 2, 2, vec![0; 16]).is_ok());

    let short = ImageResource::new("short", 2, 2, vec![0; 15]);
    assert!(matches!(short, Err(Error::InvalidResource(_))));

    let empty = ImageResource::new("empty", 0, 4, Vec::new());
    assert!(matches!(empty, Err(Error::InvalidResource(_))));
}

#[test]
fn test_solid_fills_every_pixel() {
    let image = ImageResource::solid("red", 3, 2, [255, 0, 0, 255]).unwrap();
    assert_eq!(image.extent(), Extent2D::new(3, 2));
    assert_eq!(image.pixels().len(), 24);
    assert!(image.pixels().chunks(4).all(|p| p == [255, 0, 0, 255]));
}

#[test]
fn test_checkerboard_alternates_cells() {
    let white = [255, 255, 255, 255];
    let black = [0, 0, 0, 255];
    let image = ImageResource::checkerboard("checker", 4, 2, white, black).unwrap();
    let pixel = |x: usize, y: usize| &image.pixels()[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];

    assert_eq!(pixel(0, 0), white);
    assert_eq!(pixel(1, 1), white);
    assert_eq!(pixel(2, 0), black);
    assert_eq!(pixel(0, 2), black);
    assert_eq!(pixel(3, 3), white);
}

// ============================================================================
// Texture
// ============================================================================

#[test]
fn test_upload_creates_sampled_image_and_view() {
    let mock = Arc::new(MockGraphicsDevice::new());
    let allocator = DeviceAllocator::new(mock.clone()).unwrap();
    let image = ImageResource::solid("white", 8, 8, [255; 4]).unwrap();

    let texture = Texture::upload(&allocator, &image).unwrap();

    assert_eq!(texture.image().extent(), Extent2D::new(8, 8));
    assert_eq!(texture.image().format(), TEXTURE_FORMAT);
    assert_eq!(mock.live_count("image_view"), 1);
    let desc = &mock.image_descs()[0];
    assert!(desc.usage.contains(ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST));
    // staging buffer is gone once the upload returns
    assert_eq!(mock.live_count("buffer"), 0);
}

#[test]
fn test_drop_releases_view_and_image() {
    let mock = Arc::new(MockGraphicsDevice::new());
    let allocator = DeviceAllocator::new(mock.clone()).unwrap();
    let image = ImageResource::solid("white", 4, 4, [255; 4]).unwrap();

    drop(Texture::upload(&allocator, &image).unwrap());

    assert_eq!(mock.live_count("image_view"), 0);
    assert_eq!(mock.live_count("image"), 0);
    assert!(mock.violations().is_empty());
}

#[test]
fn test_failed_view_releases_image() {
    let mock = Arc::new(MockGraphicsDevice::new());
    let allocator = DeviceAllocator::new(mock.clone()).unwrap();
    let image = ImageResource::solid("white", 4, 4, [255; 4]).unwrap();
    mock.fail_on("create_image_view");

    assert!(Texture::upload(&allocator, &image).is_err());
    assert_eq!(mock.live_count("image"), 0);
}

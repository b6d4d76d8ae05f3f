/// Unit tests for surface selection

use crate::graphics_device::*;
use crate::swapchain::*;

fn capabilities(current: Option<Extent2D>, min_images: u32, max_images: u32) -> SurfaceCapabilities {
    SurfaceCapabilities {
        min_image_count: min_images,
        max_image_count: max_images,
        current_extent: current,
        min_image_extent: Extent2D::new(16, 16),
        max_image_extent: Extent2D::new(2048, 1024),
    }
}

// ============================================================================
// Format and present mode
// ============================================================================

#[test]
fn test_prefers_srgb_bgra() {
    let formats = [
        SurfaceFormat { format: Format::B8G8R8A8_UNORM, color_space: ColorSpace::SrgbNonlinear },
        SurfaceFormat { format: Format::B8G8R8A8_SRGB, color_space: ColorSpace::SrgbNonlinear },
    ];
    assert_eq!(choose_surface_format(&formats).unwrap().format, Format::B8G8R8A8_SRGB);
}

#[test]
fn test_falls_back_to_first_format() {
    let formats = [
        SurfaceFormat { format: Format::R8G8B8A8_UNORM, color_space: ColorSpace::SrgbNonlinear },
        SurfaceFormat { format: Format::B8G8R8A8_SRGB, color_space: ColorSpace::Other(1000104002) },
    ];
    assert_eq!(choose_surface_format(&formats).unwrap(), formats[0]);
}

#[test]
fn test_no_formats_is_an_error() {
    assert!(choose_surface_format(&[]).is_err());
}

#[test]
fn test_present_mode_choice() {
    assert_eq!(choose_present_mode(&[PresentMode::Fifo, PresentMode::Mailbox], None), PresentMode::Mailbox);
    assert_eq!(choose_present_mode(&[PresentMode::Immediate, PresentMode::Fifo], None), PresentMode::Fifo);
    assert_eq!(
        choose_present_mode(&[PresentMode::Fifo, PresentMode::Mailbox], Some(PresentMode::Fifo)),
        PresentMode::Fifo
    );
    assert_eq!(
        choose_present_mode(&[PresentMode::Fifo], Some(PresentMode::Immediate)),
        PresentMode::Fifo
    );
}

// ============================================================================
// Extent and image count
// ============================================================================

#[test]
fn test_extent_uses_current_extent_when_defined() {
    let caps = capabilities(Some(Extent2D::new(800, 600)), 2, 8);
    assert_eq!(choose_extent(&caps, Extent2D::new(1, 1)), Extent2D::new(800, 600));
}

#[test]
fn test_extent_clamps_window_size() {
    let caps = capabilities(None, 2, 8);
    assert_eq!(choose_extent(&caps, Extent2D::new(4000, 8)), Extent2D::new(2048, 16));
    assert_eq!(choose_extent(&caps, Extent2D::new(640, 480)), Extent2D::new(640, 480));
}

#[test]
fn test_image_count_is_min_plus_one_clamped() {
    assert_eq!(choose_image_count(&capabilities(None, 2, 8)), 3);
    assert_eq!(choose_image_count(&capabilities(None, 3, 3)), 3);
    assert_eq!(choose_image_count(&capabilities(None, 4, 0)), 5);
}

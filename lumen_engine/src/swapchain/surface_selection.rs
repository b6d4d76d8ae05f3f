/// Surface format, present mode, extent and image count selection

use crate::error::{Error, Result};
use crate::graphics_device::{
    ColorSpace, Extent2D, Format, PresentMode, SurfaceCapabilities, SurfaceFormat,
};

/// B8G8R8A8_SRGB with the sRGB non-linear color space if offered, else the first format
pub fn choose_surface_format(formats: &[SurfaceFormat]) -> Result<SurfaceFormat> {
    let first = formats.first().ok_or_else(|| {
        Error::InitializationFailed("surface reports no formats".to_string())
    })?;
    Ok(formats
        .iter()
        .find(|f| f.format == Format::B8G8R8A8_SRGB && f.color_space == ColorSpace::SrgbNonlinear)
        .copied()
        .unwrap_or(*first))
}

/// Preferred mode when offered, otherwise MAILBOX if offered, otherwise FIFO
///
/// FIFO is always available on a conforming implementation.
pub fn choose_present_mode(available: &[PresentMode], preference: Option<PresentMode>) -> PresentMode {
    if let Some(preferred) = preference {
        if available.contains(&preferred) {
            return preferred;
        }
    }
    if available.contains(&PresentMode::Mailbox) {
        PresentMode::Mailbox
    } else {
        PresentMode::Fifo
    }
}

/// Surface's current extent when it is defined, otherwise the window size clamped to the limits
pub fn choose_extent(capabilities: &SurfaceCapabilities, window: Extent2D) -> Extent2D {
    if let Some(current) = capabilities.current_extent {
        return current;
    }
    Extent2D::new(
        window.width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        window.height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    )
}

/// One more image than the minimum, clamped to the maximum when there is one
pub fn choose_image_count(capabilities: &SurfaceCapabilities) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

#[cfg(test)]
#[path = "surface_selection_tests.rs"]
mod tests;

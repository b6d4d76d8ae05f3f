/// Swapchain recreation guard
///
/// Resize signals and out-of-date results only record a pending request;
/// requests arriving before the recreation runs overwrite each other, so one
/// settled size produces exactly one recreation. A zero-sized request pauses
/// rendering until a non-zero size arrives.

use crate::graphics_device::Extent2D;

#[derive(Debug, Default)]
pub struct RecreationState {
    pending: Option<Extent2D>,
    recreating: bool,
}

impl RecreationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the swapchain must be rebuilt for `extent`
    pub fn request(&mut self, extent: Extent2D) {
        self.pending = Some(extent);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_recreating(&self) -> bool {
        self.recreating
    }

    /// A zero-sized window is waiting for a non-zero resize
    pub fn is_paused(&self) -> bool {
        matches!(self.pending, Some(extent) if extent.is_zero())
    }

    /// Claim the pending request
    ///
    /// Returns `None` when nothing is pending, when a recreation is already
    /// running, or while the requested size is zero (the request stays pending).
    pub fn begin(&mut self) -> Option<Extent2D> {
        if self.recreating {
            return None;
        }
        match self.pending {
            Some(extent) if !extent.is_zero() => {
                self.pending = None;
                self.recreating = true;
                Some(extent)
            }
            _ => None,
        }
    }

    /// Release the guard after a successful recreation
    pub fn finish(&mut self) {
        self.recreating = false;
    }

    /// Release the guard and put `extent` back as pending (recreation deferred or failed)
    pub fn defer(&mut self, extent: Extent2D) {
        self.recreating = false;
        if self.pending.is_none() {
            self.pending = Some(extent);
        }
    }
}

#[cfg(test)]
#[path = "recreation_tests.rs"]
mod tests;

/// Application and backend configuration

use crate::error::{Error, Result};
use crate::graphics_device::PresentMode;

/// Validation message severity forwarded to the engine logger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only validation errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything, including info and verbose messages
    All,
}

/// Engine configuration
///
/// Built by the host application (the demo maps its command line onto it)
/// and handed to both the backend and the `Application`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,
    /// Enable validation layers and the debug messenger
    pub enable_validation: bool,
    /// Which validation messages reach the logger
    pub debug_severity: DebugSeverity,
    /// Number of frame slots in flight
    pub concurrent_frames: usize,
    /// Render one frame, then report the run as finished
    pub single_frame: bool,
    /// Frame pacing target
    pub target_fps: u32,
    /// Present mode to use when the surface offers it (MAILBOX, else FIFO otherwise)
    pub present_mode_preference: Option<PresentMode>,
    /// Color the swapchain image is cleared to
    pub clear_color: [f32; 4],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Lumen Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            concurrent_frames: 2,
            single_frame: false,
            target_fps: 60,
            present_mode_preference: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl Config {
    /// Reject configurations the application cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.concurrent_frames == 0 {
            crate::engine_error!("lumen::Config", "concurrent_frames must be at least 1");
            return Err(Error::InitializationFailed(
                "concurrent_frames must be at least 1".to_string(),
            ));
        }
        if self.target_fps == 0 {
            crate::engine_error!("lumen::Config", "target_fps must be at least 1");
            return Err(Error::InitializationFailed(
                "target_fps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

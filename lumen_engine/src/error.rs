//! Error types for the Lumen engine
//!
//! One error enum is shared by the core crate and every backend. Native
//! failures are wrapped into `BackendError`, API misuse into `ContractViolation`.

use std::fmt;

/// Result type for Lumen engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan call failed, lock poisoned, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (unknown material, malformed SPIR-V, etc.)
    InvalidResource(String),

    /// Initialization failed (instance, device, swapchain, subsystems)
    InitializationFailed(String),

    /// An API precondition was violated by the caller
    ContractViolation(String),

    /// The swapchain no longer matches the surface and must be recreated
    SwapchainOutOfDate,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ContractViolation(msg) => write!(f, "Contract violation: {}", msg),
            Error::SwapchainOutOfDate => write!(f, "Swapchain out of date"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

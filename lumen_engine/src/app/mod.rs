//! Application orchestrator: registry, frame loop, pacing and statistics

pub mod application;
pub mod frame_pacer;

pub use application::*;
pub use frame_pacer::*;

/// Frame module - in-flight frame slots

pub mod frame;

pub use frame::*;

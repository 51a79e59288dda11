//! Renderer-agnostic two-stage bloom contract.
//!
//! # Invariants
//! - Extraction always runs before composition within a frame.
//! - Composition consumes the bloom target produced that same frame.
//! - Bloom shape parameters are fixed at pipeline construction; only the
//!   exposure varies per frame.
//!
//! # Workaround
//! Provides a recording executor as a device-free stand-in for the wgpu
//! backend. The trait is stable; swap in a GPU implementation without
//! changing consumers.

mod graph;

pub use graph::{
    BLOOM_LEVELS, BLUR_KERNEL_RADII, BloomGraph, BloomSettings, DEFAULT_EXPOSURE,
    RecordingExecutor, StageEvent, StageExecutor, TargetVersion,
};

pub fn crate_info() -> &'static str {
    "turntable-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}

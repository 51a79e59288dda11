//! Scene state for the turntable showcase: node tree, look-at camera, and
//! the per-frame spin/flicker controller.
//!
//! # Invariants
//! - All animation state lives in the frame controller; none of it is global.
//! - The model's mounting orientation is written once at insertion; animation
//!   only touches the spin angle.
//! - The flicker countdown never underflows and is only ever reloaded to 10.

pub mod camera;
pub mod controller;
pub mod graph;

pub use camera::Camera;
pub use controller::{
    DIM_EXPOSURE, ExposurePhase, FLICKER_FRAMES, FLICKER_ODDS, FlickerRng, FrameController,
    FrameUpdate, NORMAL_EXPOSURE, spin_angle,
};
pub use graph::{NodeKind, SceneGraph, SceneNode};

pub fn crate_info() -> &'static str {
    "turntable-scene v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("scene"));
    }
}

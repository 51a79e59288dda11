//! wgpu backend for the two-stage bloom renderer.
//!
//! The executor renders the scene in HDR, high-passes and blurs the bright
//! areas through a five-level pyramid, then tone maps scene plus bloom into
//! the surface view the caller staged for the frame.
//!
//! # Invariants
//! - Composition rejects any bloom target the executor did not produce in
//!   its most recent extraction.
//! - A staged output view is consumed by exactly one composition.
//! - Intermediate targets stay linear; sRGB encoding is the surface
//!   format's job.

mod gpu;
mod shaders;
mod targets;

pub use gpu::{RenderError, WgpuExecutor};

//! Wavefront model loading: MTL materials, OBJ geometry, and a one-shot
//! background load.
//!
//! Loaded assets are content-addressed. The renderer consumes meshes by
//! handle, never by raw file paths.
//!
//! # Invariants
//! - A load delivers either a complete model or an error, never a partial.
//! - Materials are read before geometry; a material failure means the
//!   geometry file is never touched.
//! - A pending background load yields its result exactly once.

pub mod loader;
pub mod mtl;
pub mod obj;

pub use loader::{LoadedModel, ModelSummary, PendingModel, load_model, model_paths, spawn_load};
pub use mtl::{MtlMaterial, parse_mtl};
pub use obj::{MeshData, MeshVertex, ObjModel, ObjObject, parse_obj};

/// Errors from asset loading.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MTL parse error: {0}")]
    Mtl(String),
    #[error("OBJ parse error: {0}")]
    Obj(String),
    #[error("model '{0}' has no geometry")]
    Empty(String),
}

pub fn crate_info() -> &'static str {
    "turntable-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("assets"));
    }
}

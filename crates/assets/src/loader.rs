//! Two-stage model load with an optional background worker.
//!
//! Materials come first; only once the library parses does the geometry get
//! read and bound against it. The background path runs the same load on a
//! worker thread and hands the result back through a polled one-shot
//! channel, so the caller applies it on its own thread.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use glam::{Quat, Vec3};
use serde::Serialize;
use sha2::{Digest, Sha256};
use turntable_common::{AssetId, Transform};

use crate::AssetError;
use crate::mtl::{self, MtlMaterial};
use crate::obj::{self, MeshData};

/// A fully resolved model: the first geometry section plus its material.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub name: String,
    pub asset: AssetId,
    pub mesh: MeshData,
    pub material: MtlMaterial,
}

impl LoadedModel {
    /// Fixed display placement: tipped a quarter turn about X and raised one
    /// unit, so the piece sits upright on the virtual turntable.
    pub fn display_transform(&self) -> Transform {
        Transform {
            position: Vec3::new(0.0, 1.0, 0.0),
            rotation: Quat::from_rotation_x(std::f32::consts::FRAC_PI_2),
            scale: Vec3::ONE,
        }
    }

    /// Serializable digest for inspection tooling.
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            name: self.name.clone(),
            asset: self.asset,
            vertices: self.mesh.vertices.len(),
            triangles: self.mesh.triangle_count(),
            material: self.material.name.clone(),
            diffuse: self.material.diffuse.to_array(),
            emission: self.material.emission.to_array(),
            diffuse_map: self.material.diffuse_map.clone(),
        }
    }
}

/// What `inspect` tooling prints about a loaded model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub asset: AssetId,
    pub vertices: usize,
    pub triangles: usize,
    pub material: String,
    pub diffuse: [f32; 3],
    pub emission: [f32; 3],
    pub diffuse_map: Option<String>,
}

/// Conventional material/geometry paths for a named model.
pub fn model_paths(assets_dir: &Path, name: &str) -> (PathBuf, PathBuf) {
    let base = assets_dir.join("models");
    (
        base.join(format!("{name}.mtl")),
        base.join(format!("{name}.obj")),
    )
}

/// Load a named model from disk.
///
/// Fails without side effects. On success the first geometry section with
/// faces becomes the model; a section naming a material missing from the
/// library falls back to the default material with a warning rather than
/// failing the load.
pub fn load_model(assets_dir: &Path, name: &str) -> Result<LoadedModel, AssetError> {
    let _span = tracing::info_span!("load_model", name).entered();
    let (mtl_path, obj_path) = model_paths(assets_dir, name);

    let mtl_source = std::fs::read_to_string(&mtl_path)?;
    let materials = mtl::parse_mtl(&mtl_source)?;
    tracing::debug!(path = %mtl_path.display(), materials = materials.len(), "materials loaded");

    let obj_source = std::fs::read_to_string(&obj_path)?;
    let parsed = obj::parse_obj(&obj_source)?;
    tracing::debug!(path = %obj_path.display(), sections = parsed.objects.len(), "geometry loaded");

    let first = parsed
        .objects
        .into_iter()
        .next()
        .ok_or_else(|| AssetError::Empty(name.to_string()))?;

    let material = match first.material.as_deref() {
        Some(wanted) => match materials.get(wanted) {
            Some(found) => found.clone(),
            None => {
                tracing::warn!(material = wanted, "not in library, using default");
                MtlMaterial::default()
            }
        },
        None => MtlMaterial::default(),
    };

    let asset = content_id(name, &first.mesh, &material);
    tracing::info!(
        vertices = first.mesh.vertices.len(),
        triangles = first.mesh.triangle_count(),
        material = %material.name,
        "model ready"
    );

    Ok(LoadedModel {
        name: name.to_string(),
        asset,
        mesh: first.mesh,
        material,
    })
}

/// Handle to a background load. Yields its result exactly once.
#[derive(Debug)]
pub struct PendingModel {
    rx: mpsc::Receiver<Result<LoadedModel, AssetError>>,
}

impl PendingModel {
    /// Non-blocking check. `None` until the load finishes, and again after
    /// the result has been taken.
    pub fn poll(&mut self) -> Option<Result<LoadedModel, AssetError>> {
        self.rx.try_recv().ok()
    }
}

/// Kick off a background load and return the handle to poll.
pub fn spawn_load(assets_dir: PathBuf, name: String) -> PendingModel {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // A dropped receiver means the app quit before the load finished.
        let _ = tx.send(load_model(&assets_dir, &name));
    });
    PendingModel { rx }
}

/// Content-addressed identity: name plus geometry/material shape.
fn content_id(name: &str, mesh: &MeshData, material: &MtlMaterial) -> AssetId {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update((mesh.vertices.len() as u64).to_le_bytes());
    hasher.update((mesh.indices.len() as u64).to_le_bytes());
    hasher.update(material.name.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    AssetId(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MTL_FIXTURE: &str = "\
newmtl Glaze
Kd 0.8 0.2 0.2
Ke 0.1 0.1 0.0
";

    const OBJ_FIXTURE: &str = "\
mtllib gear.mtl
v 0 0 0
v 1 0 0
v 0 1 0
o gear_body
usemtl Glaze
f 1 2 3
";

    fn write_fixture(dir: &Path, name: &str, mtl: &str, obj: &str) {
        let models = dir.join("models");
        std::fs::create_dir_all(&models).unwrap();
        std::fs::write(models.join(format!("{name}.mtl")), mtl).unwrap();
        std::fs::write(models.join(format!("{name}.obj")), obj).unwrap();
    }

    #[test]
    fn loads_first_section_with_its_material() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "gear", MTL_FIXTURE, OBJ_FIXTURE);

        let model = load_model(dir.path(), "gear").unwrap();
        assert_eq!(model.name, "gear");
        assert_eq!(model.mesh.vertices.len(), 3);
        assert_eq!(model.material.name, "Glaze");
        assert_eq!(model.material.diffuse.x, 0.8);
    }

    #[test]
    fn display_transform_tips_and_raises() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "gear", MTL_FIXTURE, OBJ_FIXTURE);

        let model = load_model(dir.path(), "gear").unwrap();
        let t = model.display_transform();
        assert_eq!(t.position, Vec3::new(0.0, 1.0, 0.0));
        let expected = Quat::from_rotation_x(std::f32::consts::FRAC_PI_2);
        assert!((t.rotation.dot(expected).abs() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn missing_material_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        std::fs::create_dir_all(&models).unwrap();
        std::fs::write(models.join("gear.obj"), OBJ_FIXTURE).unwrap();

        let err = load_model(dir.path(), "gear").unwrap_err();
        assert!(matches!(err, AssetError::Io(_)));
    }

    #[test]
    fn material_failure_short_circuits_before_geometry() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "gear", "newmtl\n", "f 1 2 3\n");

        // The OBJ is also broken; the MTL error must win.
        let err = load_model(dir.path(), "gear").unwrap_err();
        assert!(matches!(err, AssetError::Mtl(_)));
    }

    #[test]
    fn faceless_geometry_is_empty_error() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "gear", MTL_FIXTURE, "v 0 0 0\nv 1 0 0\n");

        let err = load_model(dir.path(), "gear").unwrap_err();
        assert!(matches!(err, AssetError::Empty(_)));
    }

    #[test]
    fn unknown_material_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let obj = OBJ_FIXTURE.replace("usemtl Glaze", "usemtl Nope");
        write_fixture(dir.path(), "gear", MTL_FIXTURE, &obj);

        let model = load_model(dir.path(), "gear").unwrap();
        assert_eq!(model.material.name, "default");
    }

    #[test]
    fn content_id_is_stable_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "gear", MTL_FIXTURE, OBJ_FIXTURE);

        let a = load_model(dir.path(), "gear").unwrap();
        let b = load_model(dir.path(), "gear").unwrap();
        assert_eq!(a.asset, b.asset);
    }

    #[test]
    fn summary_reflects_the_model() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "gear", MTL_FIXTURE, OBJ_FIXTURE);

        let summary = load_model(dir.path(), "gear").unwrap().summary();
        assert_eq!(summary.triangles, 1);
        assert_eq!(summary.material, "Glaze");
        assert_eq!(summary.diffuse, [0.8, 0.2, 0.2]);
    }

    #[test]
    fn background_load_delivers_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "gear", MTL_FIXTURE, OBJ_FIXTURE);

        let mut pending = spawn_load(dir.path().to_path_buf(), "gear".into());
        let mut result = None;
        for _ in 0..500 {
            if let Some(r) = pending.poll() {
                result = Some(r);
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let model = result.expect("load did not finish in time").unwrap();
        assert_eq!(model.name, "gear");
        assert!(pending.poll().is_none());
    }

    #[test]
    fn background_load_surfaces_errors() {
        let dir = tempfile::tempdir().unwrap();
        // No files at all.
        let mut pending = spawn_load(dir.path().to_path_buf(), "gear".into());
        let mut result = None;
        for _ in 0..500 {
            if let Some(r) = pending.poll() {
                result = Some(r);
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(result.expect("load did not finish in time").is_err());
    }
}

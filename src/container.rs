//! Scene container: an `.npz` archive holding
//!
//! | entry         | dtype | shape               |
//! |---------------|-------|---------------------|
//! | `scene`       | f32   | rows × cols × bands |
//! | `wavelengths` | f64   | bands               |
//! | `gt`          | u32   | rows × cols         |
//!
//! Archives written by other tools may store the cube as f64 and `gt` as any
//! integer type; both are accepted on load.

use std::path::Path;

use ndarray::{Array1, Ix1};
use ndarray_npy::NpzWriter;

use crate::data::decoder::npy::NpzDecoder;
use crate::data::decoder::FormatDecoder;
use crate::data::loader::{into_cube, into_label_map};
use crate::data::model::Scene;
use crate::error::{Result, SceneError};

pub const CUBE_ENTRY: &str = "scene";
pub const WAVELENGTHS_ENTRY: &str = "wavelengths";
pub const LABELS_ENTRY: &str = "gt";

/// Write `scene` to `path`, replacing any existing file.
pub fn save(scene: &Scene, path: &Path) -> Result<()> {
    let write_err = |e: ndarray_npy::WriteNpzError| SceneError::io(path, std::io::Error::other(e));

    let file = std::fs::File::create(path).map_err(|e| SceneError::io(path, e))?;
    let mut npz = NpzWriter::new(file);
    npz.add_array(CUBE_ENTRY, scene.cube()).map_err(write_err)?;
    npz.add_array(WAVELENGTHS_ENTRY, &Array1::from(scene.wavelengths().to_vec()))
        .map_err(write_err)?;
    npz.add_array(LABELS_ENTRY, scene.labels()).map_err(write_err)?;
    npz.finish().map_err(write_err)?;

    log::info!(
        "Saved {}x{}x{} scene to {}",
        scene.rows(),
        scene.cols(),
        scene.bands(),
        path.display()
    );
    Ok(())
}

/// Read a scene container back.
pub fn load(path: &Path) -> Result<Scene> {
    let mut raw = NpzDecoder.decode(path)?;
    let context = |e: SceneError| SceneError::corrupt(format!("{}: {e}", path.display()));

    let cube = into_cube(raw.take(Some(CUBE_ENTRY)).map_err(context)?).map_err(context)?;
    let (rows, cols, _) = cube.dim();
    let wavelengths = raw
        .take(Some(WAVELENGTHS_ENTRY))
        .map_err(context)?
        .into_dimensionality::<Ix1>()
        .map_err(|_| SceneError::corrupt(format!("{}: wavelengths must be 1-D", path.display())))?
        .to_vec();
    let labels = into_label_map(raw.take(Some(LABELS_ENTRY)).map_err(context)?, (rows, cols))
        .map_err(context)?;

    let scene = Scene::new(cube.mapv(|v| v as f32), wavelengths, labels)?;
    log::debug!("Loaded container {} ({} bands)", path.display(), scene.bands());
    Ok(scene)
}

use std::collections::BTreeMap;

use ndarray::{Array2, Array3, ArrayD, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::color::Palette;
use crate::error::{Result, SceneError};

// ---------------------------------------------------------------------------
// Wavelength axis checks
// ---------------------------------------------------------------------------

/// Fail with [`SceneError::InvalidAxis`] unless `wavelengths` holds at least
/// `min_len` samples in strictly increasing order.
pub fn check_axis(wavelengths: &[f64], min_len: usize) -> Result<()> {
    if wavelengths.len() < min_len {
        return Err(SceneError::InvalidAxis(format!(
            "expected at least {min_len} wavelength samples, got {}",
            wavelengths.len()
        )));
    }
    if let Some(i) = wavelengths.windows(2).position(|w| !(w[1] > w[0])) {
        return Err(SceneError::InvalidAxis(format!(
            "wavelengths not strictly increasing at index {}: {} then {}",
            i + 1,
            wavelengths[i],
            wavelengths[i + 1]
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scene – the canonical (cube, wavelengths, label map) tuple
// ---------------------------------------------------------------------------

/// A hyperspectral scene: cube indexed (row, column, band), its wavelength
/// axis in nanometres, and a per-pixel label map.
///
/// The three arrays are validated together on construction and cannot be
/// mutated afterwards; derived scenes (resampling) are new values.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    cube: Array3<f32>,
    wavelengths: Vec<f64>,
    labels: Array2<u32>,
}

impl Scene {
    /// Build a scene, enforcing:
    /// * band count == wavelength count, axis strictly increasing,
    /// * label map shape == cube spatial shape,
    /// * no NaN in the cube.
    pub fn new(cube: Array3<f32>, wavelengths: Vec<f64>, labels: Array2<u32>) -> Result<Self> {
        let (rows, cols, bands) = cube.dim();
        if bands != wavelengths.len() {
            return Err(SceneError::corrupt(format!(
                "cube has {bands} bands but the wavelength axis has {} samples",
                wavelengths.len()
            )));
        }
        check_axis(&wavelengths, 1)?;
        if labels.dim() != (rows, cols) {
            return Err(SceneError::corrupt(format!(
                "label map is {:?} but the cube is {rows}x{cols}",
                labels.dim()
            )));
        }
        if cube.iter().any(|v| v.is_nan()) {
            return Err(SceneError::corrupt("scene cube contains NaN values"));
        }
        Ok(Scene {
            cube,
            wavelengths,
            labels,
        })
    }

    pub fn cube(&self) -> &Array3<f32> {
        &self.cube
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn labels(&self) -> &Array2<u32> {
        &self.labels
    }

    pub fn rows(&self) -> usize {
        self.cube.dim().0
    }

    pub fn cols(&self) -> usize {
        self.cube.dim().1
    }

    pub fn bands(&self) -> usize {
        self.cube.dim().2
    }

    /// Spectrum of one pixel.
    pub fn spectrum(&self, row: usize, col: usize) -> ArrayView1<'_, f32> {
        self.cube.slice(ndarray::s![row, col, ..])
    }

    /// Descriptive span `max − min` of the wavelength axis.
    pub fn bandwidth(&self) -> f64 {
        match (self.wavelengths.first(), self.wavelengths.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Give the arrays back to the caller.
    pub fn into_parts(self) -> (Array3<f32>, Vec<f64>, Array2<u32>) {
        (self.cube, self.wavelengths, self.labels)
    }
}

// ---------------------------------------------------------------------------
// LoadedScene – a scene plus the dataset's expert metadata
// ---------------------------------------------------------------------------

/// What [`get_scene`](crate::data::loader::get_scene) hands to consumers.
#[derive(Debug, Clone)]
pub struct LoadedScene {
    /// Registry name the scene was loaded under.
    pub name: String,
    pub scene: Scene,
    /// `label_values[i]` is the name of class `i`.
    pub label_values: Vec<String>,
    /// Sorted and de-duplicated.
    pub ignored_labels: Vec<u32>,
    /// Band indices for a red/green/blue preview.
    pub rgb_bands: [usize; 3],
    pub palette: Palette,
    /// Span of the sensor's wavelength range in nanometres (descriptive).
    pub bandwidth: f64,
}

/// Summary line data for listings and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSummary {
    pub rows: usize,
    pub cols: usize,
    pub bands: usize,
    pub min_wavelength: f64,
    pub max_wavelength: f64,
}

impl From<&Scene> for SceneSummary {
    fn from(scene: &Scene) -> Self {
        SceneSummary {
            rows: scene.rows(),
            cols: scene.cols(),
            bands: scene.bands(),
            min_wavelength: scene.wavelengths().first().copied().unwrap_or(f64::NAN),
            max_wavelength: scene.wavelengths().last().copied().unwrap_or(f64::NAN),
        }
    }
}

// ---------------------------------------------------------------------------
// RawData – what a format decoder produces
// ---------------------------------------------------------------------------

/// Key used by decoders whose format carries a single unnamed array.
pub const DEFAULT_KEY: &str = "data";

/// Decoded file content before any dataset-specific fixes: one or more named
/// arrays (MAT and NPZ files carry several), plus a wavelength list when the
/// file header provides one.
#[derive(Debug, Clone, Default)]
pub struct RawData {
    pub arrays: BTreeMap<String, ArrayD<f64>>,
    pub wavelengths: Option<Vec<f64>>,
}

impl RawData {
    /// A single unnamed array.
    pub fn single(array: ArrayD<f64>) -> Self {
        let mut arrays = BTreeMap::new();
        arrays.insert(DEFAULT_KEY.to_string(), array);
        RawData {
            arrays,
            wavelengths: None,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.arrays.keys().map(String::as_str).collect()
    }

    /// Remove and return the array stored under `key`, or the only array when
    /// no key is given.
    pub fn take(&mut self, key: Option<&str>) -> Result<ArrayD<f64>> {
        match key {
            Some(k) => self.arrays.remove(k).ok_or_else(|| {
                SceneError::corrupt(format!(
                    "variable '{k}' not found (available: {:?})",
                    self.names()
                ))
            }),
            None if self.arrays.len() == 1 => {
                let k = self.arrays.keys().next().cloned().unwrap_or_default();
                self.arrays
                    .remove(&k)
                    .ok_or_else(|| SceneError::corrupt("empty file"))
            }
            None => Err(SceneError::corrupt(format!(
                "file holds {} arrays {:?}; a variable name is required",
                self.arrays.len(),
                self.names()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn tiny_scene() -> Result<Scene> {
        Scene::new(
            Array3::zeros((2, 3, 4)),
            vec![400.0, 500.0, 600.0, 700.0],
            Array2::zeros((2, 3)),
        )
    }

    #[test]
    fn scene_accepts_consistent_arrays() {
        let scene = tiny_scene().unwrap();
        assert_eq!((scene.rows(), scene.cols(), scene.bands()), (2, 3, 4));
        assert_eq!(scene.bandwidth(), 300.0);
        assert_eq!(scene.spectrum(1, 2).len(), 4);
    }

    #[test]
    fn scene_rejects_band_mismatch() {
        let err = Scene::new(Array3::zeros((2, 2, 3)), vec![1.0, 2.0], Array2::zeros((2, 2)));
        assert!(matches!(err, Err(SceneError::CorruptData(_))));
    }

    #[test]
    fn scene_rejects_label_shape_mismatch() {
        let err = Scene::new(Array3::zeros((2, 2, 2)), vec![1.0, 2.0], Array2::zeros((2, 3)));
        assert!(matches!(err, Err(SceneError::CorruptData(_))));
    }

    #[test]
    fn scene_rejects_nan_and_bad_axis() {
        let mut cube = Array3::zeros((1, 1, 2));
        cube[[0, 0, 1]] = f32::NAN;
        assert!(Scene::new(cube, vec![1.0, 2.0], Array2::zeros((1, 1))).is_err());

        let err = Scene::new(Array3::zeros((1, 1, 2)), vec![2.0, 1.0], Array2::zeros((1, 1)));
        assert!(matches!(err, Err(SceneError::InvalidAxis(_))));
    }

    #[test]
    fn check_axis_requires_strict_order() {
        assert!(check_axis(&[1.0, 2.0, 3.0], 2).is_ok());
        assert!(check_axis(&[1.0], 2).is_err());
        assert!(check_axis(&[1.0, 1.0], 2).is_err());
        assert!(check_axis(&[1.0, f64::NAN], 2).is_err());
    }

    #[test]
    fn raw_data_take() {
        let mut raw = RawData::single(Array::zeros(IxDyn(&[2, 2])));
        assert!(raw.take(None).is_ok());

        let mut raw = RawData::default();
        raw.arrays.insert("a".into(), Array::zeros(IxDyn(&[1])));
        raw.arrays.insert("b".into(), Array::zeros(IxDyn(&[1])));
        assert!(raw.take(None).is_err());
        assert!(raw.take(Some("b")).is_ok());
        assert!(raw.take(Some("b")).is_err());
    }
}

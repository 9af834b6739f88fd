use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3, ArrayD, Axis, Ix2, Ix3, Zip};

use super::decoder::{extension_of, DecoderRegistry};
use super::model::{check_axis, LoadedScene, RawData, Scene};
use super::registry::{DatasetDescriptor, Registry, WavelengthSource};
use super::spectrum_file::read_vector;
use super::transform::apply_all;
use crate::color::Palette;
use crate::error::{Result, SceneError};
use crate::resample::linspace;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load the registered dataset `name` from `root/<folder>/` with the built-in
/// registry and decoders.
pub fn get_scene(name: &str, root: &Path) -> Result<LoadedScene> {
    SceneLoader::default().get_scene(name, root)
}

/// Turns registry entries into canonical scenes.  Knows nothing about any
/// particular dataset: file formats come from the decoder registry and
/// layout fixes from the descriptor's transforms.
#[derive(Debug, Clone)]
pub struct SceneLoader {
    registry: Registry,
    decoders: DecoderRegistry,
}

impl Default for SceneLoader {
    fn default() -> Self {
        SceneLoader::new(Registry::builtin().clone(), DecoderRegistry::builtin().clone())
    }
}

impl SceneLoader {
    pub fn new(registry: Registry, decoders: DecoderRegistry) -> Self {
        SceneLoader { registry, decoders }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn get_scene(&self, name: &str, root: &Path) -> Result<LoadedScene> {
        let descriptor = self.registry.get(name)?;
        let folder = descriptor.folder_in(root);
        log::info!("Loading scene '{name}' from {}", folder.display());

        let mut files = DecodedFiles {
            folder: &folder,
            decoders: &self.decoders,
            cache: BTreeMap::new(),
        };

        // -- cube --
        let image = files.take(&descriptor.image.file, descriptor.image.key.as_deref())?;
        let image = apply_all(image, &descriptor.image_transforms, None)?;
        let mut cube = into_cube(image)?;
        let (rows, cols, bands) = cube.dim();

        // -- label map --
        let mut labels = match &descriptor.labels {
            Some(src) => {
                let gt = files.take(&src.file, src.key.as_deref())?;
                let gt = apply_all(gt, &descriptor.label_transforms, Some((rows, cols)))?;
                into_label_map(gt, (rows, cols))?
            }
            None => Array2::zeros((rows, cols)),
        };

        // -- NaN repair --
        let repaired = repair_nan_pixels(&mut cube, &mut labels);
        if repaired > 0 {
            log::warn!(
                "Scene '{name}': {repaired} pixel(s) contained NaN bands; spectra and labels zeroed"
            );
        }

        let wavelengths = self.resolve_wavelengths(descriptor, &mut files, bands)?;
        let ignored_labels = dedup_labels(&descriptor.ignored_labels);
        if ignored_labels.len() != descriptor.ignored_labels.len() {
            log::debug!("Scene '{name}': duplicate ignored labels collapsed to {ignored_labels:?}");
        }
        if let Some(&b) = descriptor.rgb_bands.iter().find(|&&b| b >= bands) {
            log::warn!("Scene '{name}': RGB preview band {b} is beyond its {bands} bands");
        }

        let palette = match &descriptor.palette {
            Some(colors) => Palette::from_colors(colors.clone(), descriptor.label_values.len()),
            None => Palette::for_labels(descriptor.label_values.len()),
        };

        let scene = Scene::new(cube.mapv(|v| v as f32), wavelengths, labels)?;
        let bandwidth = descriptor
            .nominal_bandwidth()
            .unwrap_or_else(|| scene.bandwidth());

        log::info!(
            "Loaded scene '{name}': {rows}x{cols} pixels, {bands} bands, {} classes",
            descriptor.label_values.len()
        );

        Ok(LoadedScene {
            name: name.to_string(),
            scene,
            label_values: descriptor.label_values.clone(),
            ignored_labels,
            rgb_bands: descriptor.rgb_bands,
            palette,
            bandwidth,
        })
    }

    fn resolve_wavelengths(
        &self,
        descriptor: &DatasetDescriptor,
        files: &mut DecodedFiles<'_>,
        bands: usize,
    ) -> Result<Vec<f64>> {
        let wavelengths = match &descriptor.wavelengths {
            WavelengthSource::Linear { first, last } => linspace(*first, *last, bands),
            WavelengthSource::File { file, key } => {
                if matches!(extension_of(Path::new(file)).as_str(), "csv" | "txt") {
                    read_vector(&files.folder.join(file), key.as_deref())?
                } else {
                    files.take(file, key.as_deref())?.into_iter().collect()
                }
            }
            WavelengthSource::Header => files
                .header_wavelengths(&descriptor.image.file)
                .ok_or_else(|| {
                    SceneError::corrupt(format!(
                        "{} carries no wavelength list",
                        descriptor.image.file
                    ))
                })?,
        };
        if wavelengths.len() != bands {
            return Err(SceneError::corrupt(format!(
                "{} wavelengths for a cube of {bands} bands",
                wavelengths.len()
            )));
        }
        check_axis(&wavelengths, 1)?;
        Ok(wavelengths)
    }
}

/// Decoded files of one dataset folder; a file shared by several sources
/// (e.g. a scene container) is decoded once.
struct DecodedFiles<'a> {
    folder: &'a Path,
    decoders: &'a DecoderRegistry,
    cache: BTreeMap<String, RawData>,
}

impl DecodedFiles<'_> {
    fn raw(&mut self, file: &str) -> Result<&mut RawData> {
        if !self.cache.contains_key(file) {
            let path: PathBuf = self.folder.join(file);
            let raw = self.decoders.decode(&path)?;
            self.cache.insert(file.to_string(), raw);
        }
        self.cache
            .get_mut(file)
            .ok_or_else(|| SceneError::corrupt(format!("{file} vanished from the decode cache")))
    }

    fn take(&mut self, file: &str, key: Option<&str>) -> Result<ArrayD<f64>> {
        self.raw(file)?
            .take(key)
            .map_err(|e| SceneError::corrupt(format!("{file}: {e}")))
    }

    fn header_wavelengths(&mut self, file: &str) -> Option<Vec<f64>> {
        self.cache.get(file).and_then(|raw| raw.wavelengths.clone())
    }
}

// ---------------------------------------------------------------------------
// Validation and repair
// ---------------------------------------------------------------------------

pub(crate) fn into_cube(array: ArrayD<f64>) -> Result<Array3<f64>> {
    let shape = array.shape().to_vec();
    array.into_dimensionality::<Ix3>().map_err(|_| {
        SceneError::corrupt(format!(
            "expected a (rows, cols, bands) cube after transforms, got shape {shape:?}"
        ))
    })
}

/// Check shape and convert label values to non-negative integers.
pub(crate) fn into_label_map(array: ArrayD<f64>, footprint: (usize, usize)) -> Result<Array2<u32>> {
    let shape = array.shape().to_vec();
    let gt = array.into_dimensionality::<Ix2>().map_err(|_| {
        SceneError::corrupt(format!("expected a 2-D label map, got shape {shape:?}"))
    })?;
    if gt.dim() != footprint {
        return Err(SceneError::corrupt(format!(
            "label map is {:?} but the cube is {}x{}",
            gt.dim(),
            footprint.0,
            footprint.1
        )));
    }
    if let Some(bad) = gt
        .iter()
        .find(|v| !(v.is_finite() && **v >= 0.0 && v.fract() == 0.0 && **v <= u32::MAX as f64))
    {
        return Err(SceneError::corrupt(format!(
            "label value {bad} is not a non-negative integer"
        )));
    }
    Ok(gt.mapv(|v| v as u32))
}

/// Zero the spectrum and the label of every pixel with at least one NaN
/// band.  Returns the number of pixels changed; other pixels are untouched.
pub fn repair_nan_pixels(cube: &mut Array3<f64>, labels: &mut Array2<u32>) -> usize {
    let mut repaired = 0;
    Zip::from(cube.lanes_mut(Axis(2)))
        .and(labels)
        .for_each(|mut spectrum, label| {
            if spectrum.iter().any(|v| v.is_nan()) {
                spectrum.fill(0.0);
                *label = 0;
                repaired += 1;
            }
        });
    repaired
}

/// Sorted, duplicate-free copy of `labels`.
pub fn dedup_labels(labels: &[u32]) -> Vec<u32> {
    let mut out = labels.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

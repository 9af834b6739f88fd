use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::transform::{Align, Transform};
use crate::error::{Result, SceneError};

// ---------------------------------------------------------------------------
// Dataset descriptor
// ---------------------------------------------------------------------------

/// One file of a dataset, plus the variable to read when the file holds
/// several named arrays (MAT, NPZ, Parquet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub file: String,
    #[serde(default)]
    pub key: Option<String>,
}

impl SourceFile {
    pub fn new(file: &str) -> Self {
        SourceFile {
            file: file.to_string(),
            key: None,
        }
    }

    pub fn keyed(file: &str, key: &str) -> Self {
        SourceFile {
            file: file.to_string(),
            key: Some(key.to_string()),
        }
    }
}

/// Where the wavelength axis of a dataset comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WavelengthSource {
    /// Evenly spaced from `first` to `last` nm over the cube's bands.
    Linear { first: f64, last: f64 },
    /// A 1-D array stored in a file of the dataset folder.
    File {
        file: String,
        #[serde(default)]
        key: Option<String>,
    },
    /// The list in the image file's own header (ENVI).
    Header,
}

/// Static description of a dataset: its files, the fixes its layout needs,
/// and expert metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub name: String,
    /// Folder under the scenes directory; defaults to `name`.
    #[serde(default)]
    pub folder: Option<String>,
    pub image: SourceFile,
    /// Ground truth; scenes without one get an all-zero label map.
    #[serde(default)]
    pub labels: Option<SourceFile>,
    pub label_values: Vec<String>,
    #[serde(default)]
    pub ignored_labels: Vec<u32>,
    pub rgb_bands: [usize; 3],
    pub wavelengths: WavelengthSource,
    #[serde(default)]
    pub image_transforms: Vec<Transform>,
    #[serde(default)]
    pub label_transforms: Vec<Transform>,
    /// Explicit colours per label; generated when absent.
    #[serde(default)]
    pub palette: Option<Vec<[u8; 3]>>,
}

impl DatasetDescriptor {
    /// Folder holding the dataset files under `root`.
    pub fn folder_in(&self, root: &Path) -> PathBuf {
        root.join(self.folder.as_deref().unwrap_or(&self.name))
    }

    /// Sensor span (max − min wavelength) when the descriptor states it.
    pub fn nominal_bandwidth(&self) -> Option<f64> {
        match self.wavelengths {
            WavelengthSource::Linear { first, last } => Some(last - first),
            _ => None,
        }
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// The datasets known out of the box.
pub fn builtin_descriptors() -> Vec<DatasetDescriptor> {
    vec![
        DatasetDescriptor {
            name: "PaviaU".into(),
            folder: None,
            image: SourceFile::keyed("PaviaU.mat", "paviaU"),
            labels: Some(SourceFile::keyed("PaviaU_gt.mat", "paviaU_gt")),
            label_values: names(&[
                "Undefined",
                "Asphalt",
                "Meadows",
                "Gravel",
                "Trees",
                "Painted metal sheets",
                "Bare Soil",
                "Bitumen",
                "Self-Blocking Bricks",
                "Shadows",
            ]),
            ignored_labels: vec![0],
            rgb_bands: [55, 41, 12],
            wavelengths: WavelengthSource::Linear {
                first: 430.0,
                last: 850.0,
            },
            image_transforms: vec![],
            label_transforms: vec![],
            palette: None,
        },
        DatasetDescriptor {
            name: "IndianPines".into(),
            folder: None,
            image: SourceFile::keyed("Indian_pines_corrected.mat", "indian_pines_corrected"),
            labels: Some(SourceFile::keyed("Indian_pines_gt.mat", "indian_pines_gt")),
            label_values: names(&[
                "Undefined",
                "Alfalfa",
                "Corn-notill",
                "Corn-mintill",
                "Corn",
                "Grass-pasture",
                "Grass-trees",
                "Grass-pasture-mowed",
                "Hay-windrowed",
                "Oats",
                "Soybean-notill",
                "Soybean-mintill",
                "Soybean-clean",
                "Wheat",
                "Woods",
                "Buildings-Grass-Trees-Drives",
                "Stone-Steel-Towers",
            ]),
            ignored_labels: vec![0],
            // AVIRIS sensor
            rgb_bands: [43, 21, 11],
            wavelengths: WavelengthSource::Linear {
                first: 400.0,
                last: 2500.0,
            },
            image_transforms: vec![],
            label_transforms: vec![],
            palette: None,
        },
        DatasetDescriptor {
            name: "WashMall".into(),
            folder: None,
            image: SourceFile::new("DC.tif"),
            labels: Some(SourceFile::new("GT.png")),
            label_values: names(&[
                "Undefined", "Roofs", "Road", "Grass", "Trees", "Trail", "Water", "Shadow",
            ]),
            ignored_labels: vec![0],
            rgb_bands: [60, 27, 17],
            wavelengths: WavelengthSource::Linear {
                first: 401.0,
                last: 2505.0,
            },
            image_transforms: vec![Transform::Transpose {
                axes: vec![1, 2, 0],
            }],
            label_transforms: vec![Transform::ShiftLabels { by: 1 }],
            palette: None,
        },
        DatasetDescriptor {
            name: "dfc".into(),
            folder: None,
            image: SourceFile::new("dfc.tif"),
            labels: Some(SourceFile::new("dfc_gt.tif")),
            label_values: names(&[
                "Unclassified",
                "Healthy grass",
                "Stressed grass",
                "Artificial turf",
                "Evergreen trees",
                "Deciduous trees",
                "Bare earth",
                "Water",
                "Residential buildings",
                "Non-residential buildings",
                "Roads",
                "Sidewalks",
                "Crosswalks",
                "Major thoroughfares",
                "Highways",
                "Railways",
                "Paved parking lots",
                "Unpaved parking lots",
                "Cars",
                "Trains",
                "Stadium seats",
            ]),
            ignored_labels: vec![0],
            rgb_bands: [0, 25, 40],
            wavelengths: WavelengthSource::Linear {
                first: 380.0,
                last: 1050.0,
            },
            image_transforms: vec![Transform::Transpose {
                axes: vec![1, 2, 0],
            }],
            // The ground truth covers the lower part of the flight line,
            // starting at column 596.
            label_transforms: vec![Transform::Embed {
                row: Align::End,
                col: Align::Start(596),
            }],
            palette: None,
        },
    ]
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable name → descriptor table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    datasets: BTreeMap<String, DatasetDescriptor>,
}

static BUILTIN: LazyLock<Registry> =
    LazyLock::new(|| Registry::from_descriptors(builtin_descriptors()));

impl Registry {
    /// The built-in table, constructed once per process.
    pub fn builtin() -> &'static Registry {
        &BUILTIN
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = DatasetDescriptor>) -> Self {
        Registry {
            datasets: descriptors
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
        }
    }

    /// A new registry holding these entries plus `extra`; an extra entry
    /// replaces a built-in one of the same name.
    pub fn with_datasets(&self, extra: impl IntoIterator<Item = DatasetDescriptor>) -> Self {
        let mut datasets = self.datasets.clone();
        for d in extra {
            if datasets.contains_key(&d.name) {
                log::info!("dataset '{}' overridden by configuration", d.name);
            }
            datasets.insert(d.name.clone(), d);
        }
        Registry { datasets }
    }

    pub fn get(&self, name: &str) -> Result<&DatasetDescriptor> {
        self.datasets
            .get(name)
            .ok_or_else(|| SceneError::UnknownDataset(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.datasets.keys().map(String::as_str).collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &DatasetDescriptor> {
        self.datasets.values()
    }

    /// Registered datasets whose folder exists under `root`.
    pub fn available(&self, root: &Path) -> Vec<&str> {
        self.datasets
            .values()
            .filter(|d| d.folder_in(root).is_dir())
            .map(|d| d.name.as_str())
            .collect()
    }
}

/// Every sub-directory of the scenes directory, sorted.
pub fn scan_scene_folders(root: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(root).map_err(|e| SceneError::io(root, e))?;
    let mut folders = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SceneError::io(root, e))?;
        if entry.path().is_dir() {
            folders.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    folders.sort();
    Ok(folders)
}

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use rusty_cube::data::registry::{DatasetDescriptor, SourceFile, WavelengthSource};

/// Fresh, empty directory for one test; removed when the guard drops.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Dataset folder `root/name`, created.
pub fn dataset_dir(root: &Path, name: &str) -> PathBuf {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Descriptor with no transforms, linear 400–700 nm axis and label 0 ignored.
pub fn descriptor(
    name: &str,
    image: SourceFile,
    labels: Option<SourceFile>,
    classes: usize,
) -> DatasetDescriptor {
    DatasetDescriptor {
        name: name.to_string(),
        folder: None,
        image,
        labels,
        label_values: (0..classes).map(|i| format!("class {i}")).collect(),
        ignored_labels: vec![0],
        rgb_bands: [0, 1, 2],
        wavelengths: WavelengthSource::Linear {
            first: 400.0,
            last: 700.0,
        },
        image_transforms: vec![],
        label_transforms: vec![],
        palette: None,
    }
}

mod common;

use std::fs::File;

use approx::assert_relative_eq;
use image::{GrayImage, Luma};
use ndarray::{array, Array3};
use ndarray_npy::{NpzWriter, WriteNpyExt};
use tiff::encoder::{colortype, TiffEncoder};

use rusty_cube::data::decoder::DecoderRegistry;
use rusty_cube::data::registry::{DatasetDescriptor, Registry, SourceFile, WavelengthSource};
use rusty_cube::data::transform::Transform;
use rusty_cube::state::SceneState;
use rusty_cube::worker::spawn_scene_load;
use rusty_cube::{container, Scene, SceneError, SceneLoader};

use common::{dataset_dir, descriptor, temp_dir};

fn loader(descriptors: Vec<DatasetDescriptor>) -> SceneLoader {
    SceneLoader::new(
        Registry::from_descriptors(descriptors),
        DecoderRegistry::builtin().clone(),
    )
}

/// 2x2 pixels, 3 bands; pixel (1, 0) has a NaN band.  Labels [[1, 2], [3, 1]].
fn write_nan_npz(root: &std::path::Path, name: &str) {
    let dir = dataset_dir(root, name);
    let mut cube =
        Array3::<f64>::from_shape_fn((2, 2, 3), |(r, c, b)| (r * 100 + c * 10 + b) as f64);
    cube[[1, 0, 1]] = f64::NAN;
    let mut npz = NpzWriter::new(File::create(dir.join("scene.npz")).unwrap());
    npz.add_array("cube", &cube).unwrap();
    npz.add_array("gt", &array![[1i32, 2], [3, 1]]).unwrap();
    npz.finish().unwrap();
}

fn nan_descriptor(name: &str) -> DatasetDescriptor {
    let mut d = descriptor(
        name,
        SourceFile::keyed("scene.npz", "cube"),
        Some(SourceFile::keyed("scene.npz", "gt")),
        4,
    );
    d.wavelengths = WavelengthSource::Linear {
        first: 500.0,
        last: 520.0,
    };
    d.ignored_labels = vec![0, 3, 0];
    d
}

#[test]
fn tiff_cube_with_png_labels_is_transposed_and_shifted() {
    let tmp = temp_dir();
    let root = tmp.path();
    let dir = dataset_dir(root, "MiniMall");

    // 4 bands of 3 rows x 2 cols, stored band-first
    {
        let mut enc = TiffEncoder::new(File::create(dir.join("DC.tif")).unwrap()).unwrap();
        for band in 0..4u16 {
            let page: Vec<u16> = (0..6u16).map(|px| band * 10 + px).collect();
            enc.write_image::<colortype::Gray16>(2, 3, &page).unwrap();
        }
    }
    let mut gt = GrayImage::new(2, 3);
    gt.put_pixel(1, 0, Luma([2]));
    gt.put_pixel(0, 2, Luma([1]));
    gt.save(dir.join("GT.png")).unwrap();

    let mut d = descriptor(
        "MiniMall",
        SourceFile::new("DC.tif"),
        Some(SourceFile::new("GT.png")),
        4,
    );
    d.image_transforms = vec![Transform::Transpose {
        axes: vec![1, 2, 0],
    }];
    d.label_transforms = vec![Transform::ShiftLabels { by: 1 }];
    d.ignored_labels = vec![0, 0];

    let loaded = loader(vec![d]).get_scene("MiniMall", root).unwrap();
    let scene = &loaded.scene;
    assert_eq!(scene.cube().dim(), (3, 2, 4));
    assert_eq!(scene.cube()[[2, 1, 3]], 35.0);
    assert_eq!(scene.cube()[[0, 1, 0]], 1.0);
    assert_eq!(scene.labels(), &array![[1u32, 3], [1, 1], [2, 1]]);
    assert_eq!(scene.wavelengths(), &[400.0, 500.0, 600.0, 700.0]);
    assert_relative_eq!(loaded.bandwidth, 300.0);
    assert_eq!(loaded.ignored_labels, vec![0]);
    assert_eq!(loaded.palette.len(), 4);
}

#[test]
fn nan_pixels_are_zeroed_and_ignored_labels_deduplicated() {
    let tmp = temp_dir();
    let root = tmp.path();
    write_nan_npz(root, "Speckled");

    let loaded = loader(vec![nan_descriptor("Speckled")])
        .get_scene("Speckled", root)
        .unwrap();
    let scene = &loaded.scene;
    assert_eq!(scene.labels(), &array![[1u32, 2], [0, 1]]);
    assert!(scene.spectrum(1, 0).iter().all(|&v| v == 0.0));
    assert_eq!(scene.spectrum(1, 1).to_vec(), vec![110.0f32, 111.0, 112.0]);
    assert_eq!(scene.spectrum(0, 1).to_vec(), vec![10.0f32, 11.0, 12.0]);
    assert_eq!(loaded.ignored_labels, vec![0, 3]);
    assert_eq!(scene.wavelengths(), &[500.0, 510.0, 520.0]);
}

#[test]
fn missing_label_source_gives_zero_map_and_csv_axis() {
    let tmp = temp_dir();
    let root = tmp.path();
    let dir = dataset_dir(root, "Bare");
    Array3::<f32>::ones((2, 3, 3))
        .write_npy(File::create(dir.join("cube.npy")).unwrap())
        .unwrap();
    std::fs::write(dir.join("axis.csv"), "wavelength\n410\n420.5\n430\n").unwrap();

    let mut d = descriptor("Bare", SourceFile::new("cube.npy"), None, 1);
    d.wavelengths = WavelengthSource::File {
        file: "axis.csv".into(),
        key: Some("wavelength".into()),
    };
    let loaded = loader(vec![d]).get_scene("Bare", root).unwrap();
    assert!(loaded.scene.labels().iter().all(|&l| l == 0));
    assert_eq!(loaded.scene.labels().dim(), (2, 3));
    assert_eq!(loaded.scene.wavelengths(), &[410.0, 420.5, 430.0]);
    // no nominal range: bandwidth comes from the axis
    assert_relative_eq!(loaded.bandwidth, 20.0);
}

#[test]
fn scene_container_is_a_registrable_dataset() {
    let tmp = temp_dir();
    let root = tmp.path();
    let dir = dataset_dir(root, "F_fluocompact");
    let original = Scene::new(
        Array3::from_shape_fn((2, 2, 2), |(r, c, b)| (r + c + b) as f32 * 0.25),
        vec![450.0, 550.0],
        array![[0u32, 1], [1, 0]],
    )
    .unwrap();
    container::save(&original, &dir.join("F_fluocompact.npz")).unwrap();

    let json = r#"{
        "name": "F_fluocompact",
        "image": {"file": "F_fluocompact.npz", "key": "scene"},
        "labels": {"file": "F_fluocompact.npz", "key": "gt"},
        "label_values": ["sun", "fluo"],
        "rgb_bands": [0, 1, 1],
        "wavelengths": {"kind": "file", "file": "F_fluocompact.npz", "key": "wavelengths"}
    }"#;
    let d: DatasetDescriptor = serde_json::from_str(json).unwrap();
    let loaded = loader(vec![d]).get_scene("F_fluocompact", root).unwrap();
    assert_eq!(loaded.scene, original);
    assert!(loaded.ignored_labels.is_empty());
}

#[test]
fn structural_mismatches_are_corrupt_data() {
    let tmp = temp_dir();
    let root = tmp.path();
    let dir = dataset_dir(root, "Skewed");
    let mut npz = NpzWriter::new(File::create(dir.join("scene.npz")).unwrap());
    npz.add_array("cube", &Array3::<f32>::zeros((2, 2, 3))).unwrap();
    npz.add_array("gt", &array![[0u8, 1, 1], [0, 0, 1]]).unwrap();
    npz.add_array("cube2d", &array![[0.0f32, 1.0]]).unwrap();
    npz.finish().unwrap();

    let shape = descriptor(
        "Skewed",
        SourceFile::keyed("scene.npz", "cube"),
        Some(SourceFile::keyed("scene.npz", "gt")),
        2,
    );
    let mut flat = shape.clone();
    flat.name = "Flat".into();
    flat.folder = Some("Skewed".into());
    flat.image = SourceFile::keyed("scene.npz", "cube2d");
    flat.labels = None;
    let mut short_axis = shape.clone();
    short_axis.name = "ShortAxis".into();
    short_axis.folder = Some("Skewed".into());
    short_axis.labels = None;
    short_axis.wavelengths = WavelengthSource::Header;

    let loader = loader(vec![shape, flat, short_axis]);
    for name in ["Skewed", "Flat", "ShortAxis"] {
        let err = loader.get_scene(name, root).unwrap_err();
        assert!(matches!(err, SceneError::CorruptData(_)), "{name}: {err}");
    }
}

#[test]
fn unknown_extension_and_missing_file() {
    let tmp = temp_dir();
    let root = tmp.path();
    let dir = dataset_dir(root, "Odd");
    std::fs::write(dir.join("cube.xyz"), b"not a cube").unwrap();

    let odd = descriptor("Odd", SourceFile::new("cube.xyz"), None, 1);
    let mut gone = descriptor("Gone", SourceFile::new("cube.npy"), None, 1);
    gone.folder = Some("Odd".into());

    let loader = loader(vec![odd, gone]);
    assert!(matches!(
        loader.get_scene("Odd", root),
        Err(SceneError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        loader.get_scene("Gone", root),
        Err(SceneError::Io { .. })
    ));
}

#[test]
fn worker_delivers_scene_with_statistics() {
    let tmp = temp_dir();
    let root = tmp.path();
    write_nan_npz(root, "Speckled");

    let handle =
        spawn_scene_load(loader(vec![nan_descriptor("Speckled")]), "Speckled", root.to_path_buf())
            .unwrap();
    let ready = handle.wait().unwrap();

    let (stats, palette, names) = ready.class_spectra();
    assert_eq!(names.len(), 4);
    assert_eq!(palette.len(), 4);
    assert_eq!(stats.keys().collect::<Vec<_>>(), vec!["class 1", "class 2"]);
    let class1 = &stats["class 1"];
    assert_eq!(class1.pixels, 2);
    // pixels (0, 0) and (1, 1): bands 0..3 and 110..113
    assert_relative_eq!(class1.mean[0], 55.0);
    assert_relative_eq!(class1.std[2], 55.0);

    let (cube, wavelengths) = ready.spectra();
    assert_eq!(cube.dim().2, wavelengths.len());
    let (labels, _, ignored, _) = ready.label_counts();
    assert_eq!(labels[[1, 0]], 0);
    assert_eq!(ignored, &[0, 3]);
}

#[test]
fn failed_load_keeps_the_previous_scene() {
    let tmp = temp_dir();
    let root = tmp.path();
    write_nan_npz(root, "Speckled");
    let broken = dataset_dir(root, "Broken");
    std::fs::write(broken.join("scene.npz"), b"not a zip archive").unwrap();

    let descriptors = vec![nan_descriptor("Speckled"), nan_descriptor("Broken")];
    let mut state = SceneState::new(loader(descriptors), root.to_path_buf());
    state.request_load("Speckled").unwrap();
    assert!(state.wait());
    assert!(state.status_message.is_none());
    let first = state.current.as_ref().unwrap().loaded.scene.clone();

    for name in ["Broken", "Unknown"] {
        state.request_load(name).unwrap();
        assert!(state.wait());
        assert!(!state.loading);
        assert_eq!(state.current.as_ref().unwrap().loaded.scene, first);
        let msg = state.status_message.as_deref().unwrap();
        assert!(msg.starts_with(&format!("Error loading {name}:")), "{msg}");
    }
    assert_eq!(state.interpolated(first.wavelengths()).unwrap().unwrap(), first);
}

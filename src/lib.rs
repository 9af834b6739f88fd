//! Hyperspectral scene pipeline: loading heterogeneous datasets into one
//! canonical (cube, wavelengths, labels) form, synthesizing scenes from
//! reference spectra, resampling the spectral axis and summarizing classes.

pub mod color;
pub mod config;
pub mod container;
pub mod data;
pub mod error;
pub mod preview;
pub mod resample;
pub mod spectral;
pub mod state;
pub mod stats;
pub mod synth;
pub mod worker;

pub use data::loader::{get_scene, SceneLoader};
pub use data::model::{LoadedScene, Scene};
pub use error::{Result, SceneError};

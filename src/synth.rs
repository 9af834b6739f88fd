//! Synthetic scenes: two reference spectra composited through a binary mask.

use ndarray::{Array2, Array3, Axis, Zip};

use crate::data::model::Scene;
use crate::error::{Result, SceneError};

/// Fill a cube with `background` where `mask` is 0 and `foreground`
/// everywhere else.  Whole spectra are assigned per pixel.
pub fn synthesize(
    mask: &Array2<u8>,
    background: &[f64],
    foreground: &[f64],
) -> Result<Array3<f32>> {
    if background.len() != foreground.len() {
        return Err(SceneError::corrupt(format!(
            "spectra differ in length: {} vs {}",
            background.len(),
            foreground.len()
        )));
    }
    let background: Vec<f32> = background.iter().map(|&v| v as f32).collect();
    let foreground: Vec<f32> = foreground.iter().map(|&v| v as f32).collect();

    let (rows, cols) = mask.dim();
    let mut cube = Array3::<f32>::zeros((rows, cols, background.len()));
    Zip::from(cube.lanes_mut(Axis(2)))
        .and(mask)
        .for_each(|mut spectrum, &m| {
            let source = if m == 0 { &background } else { &foreground };
            for (dst, src) in spectrum.iter_mut().zip(source) {
                *dst = *src;
            }
        });
    Ok(cube)
}

/// Synthesize and wrap into a [`Scene`] whose label map is the mask
/// (0 = background, 1 = foreground).
pub fn compose_scene(
    mask: &Array2<u8>,
    wavelengths: &[f64],
    background: &[f64],
    foreground: &[f64],
) -> Result<Scene> {
    let cube = synthesize(mask, background, foreground)?;
    let labels = mask.mapv(|m| u32::from(m != 0));
    let pixels = labels.iter().filter(|&&l| l == 1).count();
    log::info!(
        "Synthesized {}x{} scene, {pixels} foreground pixel(s), {} bands",
        mask.nrows(),
        mask.ncols(),
        wavelengths.len()
    );
    Scene::new(cube, wavelengths.to_vec(), labels)
}

use ndarray::{Array3, Axis, Zip};

use crate::data::model::{check_axis, Scene};
use crate::error::{Result, SceneError};

// ---------------------------------------------------------------------------
// Target grids
// ---------------------------------------------------------------------------

/// `n` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
            out[n - 1] = stop;
            out
        }
    }
}

/// Values `start, start + step, …` strictly below `stop`.
pub fn arange(start: f64, stop: f64, step: f64) -> Result<Vec<f64>> {
    if !(step.is_finite() && step > 0.0) || !start.is_finite() || !stop.is_finite() {
        return Err(SceneError::InvalidAxis(format!(
            "cannot build a grid from {start} to {stop} with step {step}"
        )));
    }
    let n = ((stop - start) / step).ceil().max(0.0) as usize;
    Ok((0..n).map(|i| start + i as f64 * step).collect())
}

// ---------------------------------------------------------------------------
// Resampling
// ---------------------------------------------------------------------------

/// Interpolation weights for one target wavelength: value is
/// `s[lo] + t * (s[hi] - s[lo])`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bracket {
    lo: usize,
    hi: usize,
    t: f64,
}

fn bracket(wavelengths: &[f64], target: f64) -> Bracket {
    let last = wavelengths.len() - 1;
    if target <= wavelengths[0] {
        return Bracket { lo: 0, hi: 0, t: 0.0 };
    }
    if target >= wavelengths[last] {
        return Bracket { lo: last, hi: last, t: 0.0 };
    }
    // first sample strictly above target; 1..=last given the checks above
    let hi = wavelengths.partition_point(|&w| w <= target);
    let lo = hi - 1;
    let t = (target - wavelengths[lo]) / (wavelengths[hi] - wavelengths[lo]);
    Bracket { lo, hi, t }
}

/// Linearly interpolate every pixel spectrum of `cube` from `wavelengths`
/// onto `new_wavelengths`.
///
/// Targets outside the source range take the nearest edge sample; a target
/// equal to a source wavelength returns that sample exactly.
pub fn resample(
    cube: &Array3<f32>,
    wavelengths: &[f64],
    new_wavelengths: &[f64],
) -> Result<Array3<f32>> {
    check_axis(wavelengths, 2)?;
    let (rows, cols, bands) = cube.dim();
    if bands != wavelengths.len() {
        return Err(SceneError::InvalidAxis(format!(
            "{} wavelengths for a cube of {bands} bands",
            wavelengths.len()
        )));
    }
    if let Some(bad) = new_wavelengths.iter().find(|w| !w.is_finite()) {
        return Err(SceneError::InvalidAxis(format!(
            "target wavelength {bad} is not finite"
        )));
    }

    let brackets: Vec<Bracket> = new_wavelengths
        .iter()
        .map(|&w| bracket(wavelengths, w))
        .collect();

    let mut out = Array3::<f32>::zeros((rows, cols, new_wavelengths.len()));
    Zip::from(out.lanes_mut(Axis(2)))
        .and(cube.lanes(Axis(2)))
        .for_each(|mut target, source| {
            for (value, b) in target.iter_mut().zip(&brackets) {
                let lo = f64::from(source[b.lo]);
                let hi = f64::from(source[b.hi]);
                *value = if b.t == 0.0 {
                    source[b.lo]
                } else {
                    (lo + b.t * (hi - lo)) as f32
                };
            }
        });

    log::debug!(
        "Resampled {rows}x{cols} cube from {bands} to {} bands",
        new_wavelengths.len()
    );
    Ok(out)
}

/// Resample a whole scene; the label map is carried over unchanged.
pub fn resample_scene(scene: &Scene, new_wavelengths: &[f64]) -> Result<Scene> {
    let cube = resample(scene.cube(), scene.wavelengths(), new_wavelengths)?;
    Scene::new(cube, new_wavelengths.to_vec(), scene.labels().clone())
}

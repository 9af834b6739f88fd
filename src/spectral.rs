//! Physical radiance models used as reference spectra.

use crate::error::{Result, SceneError};

/// Planck constant (J·s).
pub const PLANCK: f64 = 6.62607004e-34;
/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Boltzmann constant (J/K).
pub const BOLTZMANN: f64 = 1.38064852e-23;

/// Effective photosphere temperature used for the reference "sun" spectrum.
pub const SUN_TEMPERATURE_K: f64 = 5778.0;

/// Nanometres → metres.
pub const NM_TO_M: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Planck's law
// ---------------------------------------------------------------------------

/// Spectral radiance of a black body, in W·sr⁻¹·m⁻³.
///
/// `wavelength_m` is in metres and `temperature_k` in kelvin; both must be
/// strictly positive and finite.
pub fn blackbody_radiance(wavelength_m: f64, temperature_k: f64) -> Result<f64> {
    if !(wavelength_m.is_finite() && wavelength_m > 0.0) {
        return Err(SceneError::Domain(format!(
            "wavelength must be positive, got {wavelength_m} m"
        )));
    }
    if !(temperature_k.is_finite() && temperature_k > 0.0) {
        return Err(SceneError::Domain(format!(
            "temperature must be positive, got {temperature_k} K"
        )));
    }

    let a = 2.0 * PLANCK * SPEED_OF_LIGHT.powi(2);
    let b = PLANCK * SPEED_OF_LIGHT / (wavelength_m * BOLTZMANN * temperature_k);
    Ok(a / (wavelength_m.powi(5) * b.exp_m1()))
}

/// Blackbody radiance sampled on a wavelength axis given in nanometres.
pub fn blackbody_spectrum(wavelengths_nm: &[f64], temperature_k: f64) -> Result<Vec<f64>> {
    wavelengths_nm
        .iter()
        .map(|&nm| blackbody_radiance(nm * NM_TO_M, temperature_k))
        .collect()
}

/// Rescale `spectrum` so that its maximum equals `fraction`.
///
/// Used to bring spectra from heterogeneous sources to comparable
/// magnitudes (the reference sun spectrum is scaled to a peak of 0.1).
pub fn scale_to_peak(spectrum: &[f64], fraction: f64) -> Result<Vec<f64>> {
    if !fraction.is_finite() {
        return Err(SceneError::Domain(format!(
            "peak fraction must be finite, got {fraction}"
        )));
    }
    let peak = spectrum.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(peak.is_finite() && peak > 0.0) {
        return Err(SceneError::Domain(format!(
            "cannot rescale a spectrum whose peak is {peak}"
        )));
    }
    let factor = fraction / peak;
    Ok(spectrum.iter().map(|v| v * factor).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn radiance_is_positive() {
        for &nm in &[100.0, 400.0, 550.0, 1000.0, 2500.0, 10_000.0] {
            for &t in &[300.0, 1000.0, SUN_TEMPERATURE_K, 10_000.0] {
                let l = blackbody_radiance(nm * NM_TO_M, t).unwrap();
                assert!(l > 0.0, "L({nm} nm, {t} K) = {l}");
            }
        }
    }

    #[test]
    fn radiance_decreases_beyond_wien_peak() {
        // Wien displacement: λ_max = b / T
        let t = SUN_TEMPERATURE_K;
        let peak_m = 2.897771955e-3 / t;
        let mut previous = blackbody_radiance(peak_m * 1.05, t).unwrap();
        for i in 2..40 {
            let wl = peak_m * (1.0 + 0.05 * i as f64);
            let l = blackbody_radiance(wl, t).unwrap();
            assert!(l < previous, "not decreasing at {wl} m");
            previous = l;
        }
    }

    #[test]
    fn matches_known_value() {
        // 500 nm, 5778 K ≈ 2.638e13 W·sr⁻¹·m⁻³
        let l = blackbody_radiance(500e-9, 5778.0).unwrap();
        assert_relative_eq!(l, 2.6376e13, max_relative = 1e-3);
    }

    #[test]
    fn rejects_non_physical_inputs() {
        assert!(matches!(blackbody_radiance(0.0, 5000.0), Err(SceneError::Domain(_))));
        assert!(matches!(blackbody_radiance(-1e-6, 5000.0), Err(SceneError::Domain(_))));
        assert!(matches!(blackbody_radiance(5e-7, 0.0), Err(SceneError::Domain(_))));
        assert!(matches!(blackbody_radiance(5e-7, -10.0), Err(SceneError::Domain(_))));
    }

    #[test]
    fn spectrum_converts_nanometres() {
        let s = blackbody_spectrum(&[500.0, 600.0], 5778.0).unwrap();
        assert_relative_eq!(s[0], blackbody_radiance(500e-9, 5778.0).unwrap());
        assert_relative_eq!(s[1], blackbody_radiance(600e-9, 5778.0).unwrap());
    }

    #[test]
    fn scale_to_peak_sets_maximum() {
        let s = scale_to_peak(&[1.0, 4.0, 2.0], 0.1).unwrap();
        assert_relative_eq!(s[1], 0.1);
        assert_relative_eq!(s[0], 0.025);
        assert!(scale_to_peak(&[0.0, 0.0], 0.1).is_err());
        assert!(scale_to_peak(&[], 0.1).is_err());
    }
}

//! Writes a reproducible synthetic scene: a block letter of fluorescent
//! material in front of a sunlit background.
//!
//! The background follows a 5778 K blackbody scaled to a small peak, the
//! letter a sum of Gaussian emission peaks with seeded noise.
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use ndarray::{Array1, Array2};
use ndarray_npy::WriteNpyExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use rusty_cube::resample::linspace;
use rusty_cube::spectral::{blackbody_spectrum, scale_to_peak, SUN_TEMPERATURE_K};
use rusty_cube::{container, synth};

#[derive(Parser, Debug)]
#[command(name = "generate_scene", about = "Write a synthetic letter-shaped scene container")]
struct Args {
    /// Letter drawn as the foreground (F, E, H, I, L, T)
    #[arg(long, default_value = "F")]
    letter: char,

    /// Image side length in pixels
    #[arg(long, default_value_t = 201)]
    size: usize,

    /// First wavelength (nm)
    #[arg(long, default_value_t = 400.0)]
    first: f64,

    /// Last wavelength (nm)
    #[arg(long, default_value_t = 800.0)]
    last: f64,

    /// Number of bands
    #[arg(long, default_value_t = 201)]
    bands: usize,

    /// Peak value of the scaled background spectrum
    #[arg(long, default_value_t = 0.1)]
    sun_peak: f64,

    /// Standard deviation of the noise added to the fluorescence spectrum
    #[arg(long, default_value_t = 0.002)]
    noise: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Also write mask.png, wavelengths.npy and fluo.npy into this directory
    #[arg(long)]
    write_inputs: Option<PathBuf>,

    #[arg(short, long, default_value = "F_fluocompact.npz")]
    output: PathBuf,
}

// ── Letter masks ─────────────────────────────────────────────────────────────

/// Strokes as (top, left, bottom, right) in fractions of the image side.
fn strokes(letter: char) -> Option<&'static [(f64, f64, f64, f64)]> {
    const STEM: (f64, f64, f64, f64) = (0.15, 0.28, 0.85, 0.42);
    let strokes: &'static [(f64, f64, f64, f64)] = match letter.to_ascii_uppercase() {
        'F' => &[STEM, (0.15, 0.28, 0.27, 0.74), (0.44, 0.28, 0.55, 0.64)],
        'E' => &[
            STEM,
            (0.15, 0.28, 0.27, 0.74),
            (0.44, 0.28, 0.55, 0.64),
            (0.73, 0.28, 0.85, 0.74),
        ],
        'L' => &[STEM, (0.73, 0.28, 0.85, 0.74)],
        'H' => &[STEM, (0.15, 0.60, 0.85, 0.74), (0.44, 0.28, 0.55, 0.74)],
        'I' => &[(0.15, 0.43, 0.85, 0.57)],
        'T' => &[(0.15, 0.22, 0.27, 0.78), (0.15, 0.43, 0.85, 0.57)],
        _ => return None,
    };
    Some(strokes)
}

fn letter_mask(letter: char, size: usize) -> Result<Array2<u8>> {
    let Some(strokes) = strokes(letter) else {
        bail!("no block shape for letter '{letter}'");
    };
    let mut mask = Array2::<u8>::zeros((size, size));
    let px = |f: f64| ((f * size as f64).round() as usize).min(size);
    for &(top, left, bottom, right) in strokes {
        mask.slice_mut(ndarray::s![px(top)..px(bottom), px(left)..px(right)])
            .fill(1);
    }
    Ok(mask)
}

// ── Spectra ──────────────────────────────────────────────────────────────────

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Emission of a compact fluorescent lamp: narrow mercury and phosphor lines.
fn fluorescence_spectrum<R: Rng>(
    wavelengths: &[f64],
    noise: &Normal<f64>,
    rng: &mut R,
) -> Vec<f64> {
    let peaks = [
        (436.0, 3.0, 0.35),
        (487.0, 6.0, 0.20),
        (546.0, 3.0, 0.80),
        (611.0, 4.0, 1.00),
        (710.0, 12.0, 0.05),
    ];
    wavelengths
        .iter()
        .map(|&wl| {
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(wl, mu, sigma, amp))
                .sum();
            (signal + noise.sample(rng)).max(0.0)
        })
        .collect()
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn write_inputs(dir: &Path, mask: &Array2<u8>, wavelengths: &[f64], fluo: &[f64]) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let (h, w) = mask.dim();
    let pixels: Vec<u8> = mask.iter().map(|&m| m * 255).collect();
    let img = image::GrayImage::from_raw(w as u32, h as u32, pixels)
        .context("mask buffer does not match its dimensions")?;
    img.save(dir.join("mask.png"))?;

    Array1::from(wavelengths.to_vec()).write_npy(File::create(dir.join("wavelengths.npy"))?)?;
    Array1::from(fluo.to_vec()).write_npy(File::create(dir.join("fluo.npy"))?)?;
    log::info!("Wrote synthesis inputs to {}", dir.display());
    Ok(())
}

fn run(args: Args) -> Result<()> {
    if args.bands < 2 {
        bail!("need at least two bands, got {}", args.bands);
    }
    let mut rng = StdRng::seed_from_u64(args.seed);
    let noise = Normal::new(0.0, args.noise)
        .with_context(|| format!("invalid noise level {}", args.noise))?;

    let mask = letter_mask(args.letter, args.size)?;
    let wavelengths = linspace(args.first, args.last, args.bands);
    let sun = scale_to_peak(&blackbody_spectrum(&wavelengths, SUN_TEMPERATURE_K)?, args.sun_peak)?;
    let fluo = fluorescence_spectrum(&wavelengths, &noise, &mut rng);

    if let Some(dir) = &args.write_inputs {
        write_inputs(dir, &mask, &wavelengths, &fluo)?;
    }

    let scene = synth::compose_scene(&mask, &wavelengths, &sun, &fluo)?;
    container::save(&scene, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!(
        "Wrote {}x{} scene with {} bands to {}",
        scene.rows(),
        scene.cols(),
        scene.bands(),
        args.output.display()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run(Args::parse()) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use ndarray::{Array2, Array3, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SceneError};

// ---------------------------------------------------------------------------
// Per-class spectra
// ---------------------------------------------------------------------------

/// Mean and population standard deviation of one class, per band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSpectrum {
    pub label: u32,
    pub pixels: usize,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

/// Class name → statistics, for every present, non-ignored label.
pub type ClassStatistics = BTreeMap<String, ClassSpectrum>;

/// Per-label accumulators for the two passes.
struct Accumulator {
    pixels: usize,
    sum: Vec<f64>,
    squares: Vec<f64>,
}

/// Compute the mean and standard deviation spectrum of each class.
///
/// Labels listed in `ignored` and labels without pixels are left out.  A
/// present label with no entry in `label_values` is an error.  Accumulation
/// is in `f64` with a separate pass for the deviations, so results do not
/// depend on pixel order beyond floating-point summation.
pub fn compute(
    cube: &Array3<f32>,
    labels: &Array2<u32>,
    label_values: &[String],
    ignored: &[u32],
) -> Result<ClassStatistics> {
    let (rows, cols, bands) = cube.dim();
    if labels.dim() != (rows, cols) {
        return Err(SceneError::corrupt(format!(
            "label map is {:?} but the cube is {rows}x{cols}",
            labels.dim()
        )));
    }

    let mut acc: BTreeMap<u32, Accumulator> = BTreeMap::new();

    // -- pass 1: counts and sums --
    Zip::from(cube.lanes(Axis(2)))
        .and(labels)
        .for_each(|spectrum, &label| {
            if ignored.contains(&label) {
                return;
            }
            let entry = acc.entry(label).or_insert_with(|| Accumulator {
                pixels: 0,
                sum: vec![0.0; bands],
                squares: vec![0.0; bands],
            });
            entry.pixels += 1;
            for (s, &v) in entry.sum.iter_mut().zip(spectrum) {
                *s += f64::from(v);
            }
        });

    let means: BTreeMap<u32, Vec<f64>> = acc
        .iter()
        .map(|(&label, a)| {
            let n = a.pixels as f64;
            (label, a.sum.iter().map(|s| s / n).collect())
        })
        .collect();

    // -- pass 2: squared deviations from the mean --
    Zip::from(cube.lanes(Axis(2)))
        .and(labels)
        .for_each(|spectrum, &label| {
            let (Some(a), Some(mean)) = (acc.get_mut(&label), means.get(&label)) else {
                return;
            };
            for ((sq, &v), m) in a.squares.iter_mut().zip(spectrum).zip(mean) {
                let d = f64::from(v) - m;
                *sq += d * d;
            }
        });

    let mut out = ClassStatistics::new();
    for (label, a) in acc {
        let name = label_values.get(label as usize).ok_or_else(|| {
            SceneError::corrupt(format!(
                "label {label} present in the map but only {} class names are defined",
                label_values.len()
            ))
        })?;
        let n = a.pixels as f64;
        let spectrum = ClassSpectrum {
            label,
            pixels: a.pixels,
            mean: means.get(&label).cloned().unwrap_or_default(),
            std: a.squares.iter().map(|sq| (sq / n).sqrt()).collect(),
        };
        if out.insert(name.clone(), spectrum).is_some() {
            return Err(SceneError::corrupt(format!(
                "class name '{name}' is used by more than one label"
            )));
        }
    }
    log::debug!("Computed statistics for {} class(es)", out.len());
    Ok(out)
}

/// Pixel count per label, leaving out `ignored`.
pub fn label_histogram(labels: &Array2<u32>, ignored: &[u32]) -> BTreeMap<u32, usize> {
    let mut counts = BTreeMap::new();
    for label in labels.iter().copied().filter(|l| !ignored.contains(l)) {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// One line of the long-format CSV.
#[derive(Debug, Serialize)]
struct StatRow<'a> {
    class: &'a str,
    label: u32,
    band: usize,
    wavelength: f64,
    mean: f64,
    std: f64,
}

/// Long-format CSV: one row per class and band.
pub fn write_csv<W: Write>(
    stats: &ClassStatistics,
    wavelengths: &[f64],
    writer: W,
) -> csv::Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for (class, spectrum) in stats {
        for (band, (&mean, &std)) in spectrum.mean.iter().zip(&spectrum.std).enumerate() {
            out.serialize(StatRow {
                class,
                label: spectrum.label,
                band,
                wavelength: wavelengths.get(band).copied().unwrap_or(f64::NAN),
                mean,
                std,
            })?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Write statistics next to their wavelength axis; `.csv` gives the long
/// table, anything else pretty JSON.
pub fn save(stats: &ClassStatistics, wavelengths: &[f64], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| SceneError::io(path, e))?;
    let writer = std::io::BufWriter::new(file);
    if crate::data::decoder::extension_of(path) == "csv" {
        write_csv(stats, wavelengths, writer).map_err(|e| SceneError::io(path, e.into()))?;
    } else {
        #[derive(Serialize)]
        struct Export<'a> {
            wavelengths: &'a [f64],
            classes: &'a ClassStatistics,
        }
        serde_json::to_writer_pretty(
            writer,
            &Export {
                wavelengths,
                classes: stats,
            },
        )
        .map_err(|e| SceneError::io(path, e.into()))?;
    }
    log::info!("Wrote statistics of {} class(es) to {}", stats.len(), path.display());
    Ok(())
}

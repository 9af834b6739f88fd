//! 1-D vectors (wavelength axes, reference spectra) stored as `.npy` or
//! CSV files.

use std::path::Path;

use super::decoder::{extension_of, npy::read_npy_any, open};
use crate::error::{Result, SceneError};

/// Read a 1-D vector.
///
/// * `.npy` – any numeric dtype, must be one-dimensional (or `(n, 1)`).
/// * `.csv` – header row; values come from `column`, or the first column.
pub fn read_vector(path: &Path, column: Option<&str>) -> Result<Vec<f64>> {
    match extension_of(path).as_str() {
        "npy" => {
            let bytes = std::fs::read(path).map_err(|e| SceneError::io(path, e))?;
            let array = read_npy_any(&bytes)?;
            let is_vector = match array.shape() {
                [_] => true,
                [_, 1] | [1, _] => true,
                _ => false,
            };
            if !is_vector {
                return Err(SceneError::corrupt(format!(
                    "{}: expected a 1-D array, got shape {:?}",
                    path.display(),
                    array.shape()
                )));
            }
            Ok(array.iter().copied().collect())
        }
        "csv" | "txt" => read_csv_column(path, column),
        other => Err(SceneError::UnsupportedFormat(format!(".{other} (expected .npy or .csv)"))),
    }
}

/// CSV layout: header row with column names, one value per row.
fn read_csv_column(path: &Path, column: Option<&str>) -> Result<Vec<f64>> {
    let mut reader = csv::Reader::from_reader(open(path)?);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SceneError::corrupt(format!("{}: reading CSV headers: {e}", path.display())))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let idx = match column {
        Some(name) => headers.iter().position(|h| h == name).ok_or_else(|| {
            SceneError::corrupt(format!("{}: CSV missing '{name}' column", path.display()))
        })?,
        None => 0,
    };

    let mut values = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result
            .map_err(|e| {
                SceneError::corrupt(format!("{}: CSV row {row_no}: {e}", path.display()))
            })?;
        let cell = record.get(idx).unwrap_or("").trim();
        let v = cell.parse::<f64>().map_err(|_| {
            SceneError::corrupt(format!(
                "{}: row {row_no}, '{cell}' is not a number",
                path.display()
            ))
        })?;
        values.push(v);
    }
    Ok(values)
}

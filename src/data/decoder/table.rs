//! Parquet "pixel table": one row per pixel.
//!
//! Expected schema:
//! - `row`, `col`: integer pixel coordinates
//! - `spectrum`: List<Float64> or List<Float32> (optional) – one spectrum per pixel
//! - `label`: integer class index (optional)
//!
//! Files written from a Pandas/Polars frame (`df.to_parquet()` /
//! `df.write_parquet()`) with those columns decode directly.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Float32Array, Float64Array, Int64Array, LargeListArray, ListArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use ndarray::{ArrayD, IxDyn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::{open, FormatDecoder};
use crate::data::model::RawData;
use crate::error::{Result, SceneError};

pub const SPECTRUM_COLUMN: &str = "spectrum";
pub const LABEL_COLUMN: &str = "label";

pub struct ParquetDecoder;

/// Pixels gathered from every record batch before the arrays are sized.
#[derive(Default)]
struct PixelRows {
    coords: Vec<(usize, usize)>,
    spectra: Vec<Option<Vec<f64>>>,
    labels: Vec<Option<i64>>,
    has_spectrum: bool,
    has_label: bool,
}

impl FormatDecoder for ParquetDecoder {
    fn name(&self) -> &'static str {
        "Parquet pixel table"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["parquet", "pq"]
    }

    fn decode(&self, path: &Path) -> Result<RawData> {
        let pq_err = |e: parquet::errors::ParquetError| {
            SceneError::corrupt(format!("{}: {e}", path.display()))
        };
        let builder = ParquetRecordBatchReaderBuilder::try_new(open(path)?).map_err(pq_err)?;
        let reader = builder.build().map_err(pq_err)?;

        let mut pixels = PixelRows::default();
        for batch_result in reader {
            let batch = batch_result
                .map_err(|e| SceneError::corrupt(format!("{}: {e}", path.display())))?;
            let schema = batch.schema();

            let column = |name: &str| -> Option<Arc<dyn Array>> {
                schema.index_of(name).ok().map(|i| Arc::clone(batch.column(i)))
            };
            let rows = integer_column(column("row"), "row")?;
            let cols = integer_column(column("col"), "col")?;
            let spectrum = column(SPECTRUM_COLUMN);
            let label = match column(LABEL_COLUMN) {
                Some(c) => Some(integer_column(Some(c), LABEL_COLUMN)?),
                None => None,
            };
            if spectrum.is_none() && label.is_none() {
                return Err(SceneError::corrupt(format!(
                    "{}: pixel table needs a '{SPECTRUM_COLUMN}' or '{LABEL_COLUMN}' column",
                    path.display()
                )));
            }
            pixels.has_spectrum |= spectrum.is_some();
            pixels.has_label |= label.is_some();

            for i in 0..batch.num_rows() {
                let (r, c) = (rows.value(i), cols.value(i));
                if rows.is_null(i) || cols.is_null(i) || r < 0 || c < 0 {
                    return Err(SceneError::corrupt(format!(
                        "{}: row {i} has an invalid pixel coordinate",
                        path.display()
                    )));
                }
                pixels.coords.push((r as usize, c as usize));
                pixels.spectra.push(match &spectrum {
                    Some(col) => extract_f64_list(col, i)?,
                    None => None,
                });
                pixels.labels.push(match &label {
                    Some(col) if !col.is_null(i) => Some(col.value(i)),
                    _ => None,
                });
            }
        }
        pixels.into_raw()
    }
}

impl PixelRows {
    fn into_raw(self) -> Result<RawData> {
        let n_rows = self.coords.iter().map(|&(r, _)| r + 1).max().unwrap_or(0);
        let n_cols = self.coords.iter().map(|&(_, c)| c + 1).max().unwrap_or(0);
        let mut raw = RawData::default();

        if self.has_spectrum {
            let bands = self.spectra.iter().flatten().map(Vec::len).next().unwrap_or(0);
            let mut cube = ArrayD::from_elem(IxDyn(&[n_rows, n_cols, bands]), f64::NAN);
            for (&(r, c), spectrum) in self.coords.iter().zip(&self.spectra) {
                let Some(spectrum) = spectrum else { continue };
                if spectrum.len() != bands {
                    return Err(SceneError::corrupt(format!(
                        "pixel ({r}, {c}) has {} bands, expected {bands}",
                        spectrum.len()
                    )));
                }
                for (b, v) in spectrum.iter().enumerate() {
                    cube[[r, c, b]] = *v;
                }
            }
            raw.arrays.insert(SPECTRUM_COLUMN.to_string(), cube);
        }

        if self.has_label {
            let mut labels = ArrayD::zeros(IxDyn(&[n_rows, n_cols]));
            for (&(r, c), label) in self.coords.iter().zip(&self.labels) {
                if let Some(l) = label {
                    labels[[r, c]] = *l as f64;
                }
            }
            raw.arrays.insert(LABEL_COLUMN.to_string(), labels);
        }
        Ok(raw)
    }
}

// -- Arrow helpers --

/// Cast any integer column to Int64.
fn integer_column(col: Option<Arc<dyn Array>>, name: &str) -> Result<Int64Array> {
    let col =
        col.ok_or_else(|| SceneError::corrupt(format!("pixel table missing '{name}' column")))?;
    if !col.data_type().is_integer() {
        return Err(SceneError::corrupt(format!(
            "column '{name}' must be integer, got {:?}",
            col.data_type()
        )));
    }
    let cast_col = cast(&col, &DataType::Int64)
        .map_err(|e| SceneError::corrupt(format!("column '{name}': {e}")))?;
    cast_col
        .as_any()
        .downcast_ref::<Int64Array>()
        .cloned()
        .ok_or_else(|| SceneError::corrupt(format!("column '{name}' is not Int64 after cast")))
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row;
/// `None` for a null entry.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Option<Vec<f64>>> {
    if col.is_null(row) {
        return Ok(None);
    }

    let values_array = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| SceneError::corrupt("expected ListArray"))?
            .value(row),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .ok_or_else(|| SceneError::corrupt("expected LargeListArray"))?
            .value(row),
        other => {
            return Err(SceneError::corrupt(format!(
                "'{SPECTRUM_COLUMN}' must be a List or LargeList column, got {other:?}"
            )))
        }
    };

    // The inner array can be Float64 or Float32; null entries read as NaN.
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(Some(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect()))
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(Some(
            f32_arr
                .iter()
                .map(|v| v.map(f64::from).unwrap_or(f64::NAN))
                .collect(),
        ))
    } else {
        Err(SceneError::corrupt(format!(
            "list inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float32Builder, Int32Array, ListBuilder, UInt8Array};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use tempfile::tempdir;

    fn write_table(path: &Path, with_missing_pixel: bool) {
        // 2x2 image, 3 bands; optionally leave pixel (1, 1) out
        let coords: Vec<(i32, i32)> = if with_missing_pixel {
            vec![(0, 0), (0, 1), (1, 0)]
        } else {
            vec![(0, 0), (0, 1), (1, 0), (1, 1)]
        };
        let mut spectra = ListBuilder::new(Float32Builder::new());
        for &(r, c) in &coords {
            for b in 0..3 {
                spectra.values().append_value((r * 10 + c) as f32 + b as f32 * 0.5);
            }
            spectra.append(true);
        }
        let spectrum_array = spectra.finish();
        let labels: Vec<u8> = coords.iter().map(|&(r, c)| (r * 2 + c) as u8).collect();

        let schema = Arc::new(Schema::new(vec![
            Field::new("row", DataType::Int32, false),
            Field::new("col", DataType::Int32, false),
            Field::new(
                "spectrum",
                DataType::List(Arc::new(Field::new("item", DataType::Float32, true))),
                true,
            ),
            Field::new("label", DataType::UInt8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int32Array::from(coords.iter().map(|c| c.0).collect::<Vec<_>>())),
                Arc::new(Int32Array::from(coords.iter().map(|c| c.1).collect::<Vec<_>>())),
                Arc::new(spectrum_array),
                Arc::new(UInt8Array::from(labels)),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn pixel_table_decodes_cube_and_labels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("full.parquet");
        write_table(&path, false);
        let mut raw = ParquetDecoder.decode(&path).unwrap();
        let cube = raw.take(Some("spectrum")).unwrap();
        assert_eq!(cube.shape(), &[2, 2, 3]);
        assert_eq!(cube[[1, 0, 2]], 11.0);
        let labels = raw.take(Some("label")).unwrap();
        assert_eq!(labels.shape(), &[2, 2]);
        assert_eq!(labels[[1, 1]], 3.0);
    }

    #[test]
    fn missing_pixels_are_nan_and_unlabeled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sparse.parquet");
        write_table(&path, true);
        let mut raw = ParquetDecoder.decode(&path).unwrap();
        let cube = raw.take(Some("spectrum")).unwrap();
        assert_eq!(cube.shape(), &[2, 2, 3]);
        assert!(cube[[1, 1, 0]].is_nan());
        let labels = raw.take(Some("label")).unwrap();
        assert_eq!(labels[[1, 1]], 0.0);
    }
}

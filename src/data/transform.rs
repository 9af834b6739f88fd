use ndarray::{ArrayD, Axis, IxDyn, Slice};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SceneError};

// ---------------------------------------------------------------------------
// Declarative per-dataset structural fixes
// ---------------------------------------------------------------------------

/// Where an embedded array sits along one axis of its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    /// Fixed offset from the start of the axis.
    Start(usize),
    /// Flush with the end of the axis.
    End,
}

impl Align {
    fn offset(self, inner: usize, outer: usize) -> Option<usize> {
        match self {
            Align::Start(n) if n.checked_add(inner).is_some_and(|end| end <= outer) => Some(n),
            Align::End => outer.checked_sub(inner),
            _ => None,
        }
    }
}

/// One structural fix applied to a decoded array.  A dataset lists the fixes
/// for its image and its label map; the loader applies them in order without
/// knowing which dataset it is handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    /// Reorder axes; `axes[i]` is the source axis of output axis `i`.
    Transpose { axes: Vec<usize> },
    /// Keep `rows × cols` pixels starting at (`row`, `col`).
    Crop {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    /// Place the array inside a zero-filled frame the size of the cube's
    /// spatial footprint (label maps that cover only part of the sensor).
    Embed { row: Align, col: Align },
    /// Add a constant to every value (e.g. so that "unlabeled" becomes 0).
    ShiftLabels { by: i64 },
}

impl Transform {
    /// Apply to `array`.  `footprint` is the cube's (rows, cols), known only
    /// when transforming a label map.
    pub fn apply(
        &self,
        array: ArrayD<f64>,
        footprint: Option<(usize, usize)>,
    ) -> Result<ArrayD<f64>> {
        match self {
            Transform::Transpose { axes } => transpose(array, axes),
            Transform::Crop {
                row,
                col,
                rows,
                cols,
            } => crop(array, *row, *col, *rows, *cols),
            Transform::Embed { row, col } => {
                let (rows, cols) = footprint.ok_or_else(|| {
                    SceneError::corrupt(
                        "embed needs the cube footprint; only label maps can be embedded",
                    )
                })?;
                embed(array, *row, *col, rows, cols)
            }
            Transform::ShiftLabels { by } => {
                let by = *by as f64;
                Ok(array.mapv_into(|v| v + by))
            }
        }
    }
}

/// Apply `transforms` in order.
pub fn apply_all(
    mut array: ArrayD<f64>,
    transforms: &[Transform],
    footprint: Option<(usize, usize)>,
) -> Result<ArrayD<f64>> {
    for t in transforms {
        log::debug!("applying {t:?} to array of shape {:?}", array.shape());
        array = t.apply(array, footprint)?;
    }
    Ok(array)
}

fn transpose(array: ArrayD<f64>, axes: &[usize]) -> Result<ArrayD<f64>> {
    let ndim = array.ndim();
    let mut seen = vec![false; ndim];
    let is_permutation = axes.len() == ndim
        && axes.iter().all(|&a| a < ndim && !std::mem::replace(&mut seen[a], true));
    if !is_permutation {
        return Err(SceneError::corrupt(format!(
            "cannot transpose a {ndim}-D array with axes {axes:?}"
        )));
    }
    Ok(array
        .permuted_axes(IxDyn(axes))
        .as_standard_layout()
        .into_owned())
}

fn crop(
    array: ArrayD<f64>,
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
) -> Result<ArrayD<f64>> {
    let shape = array.shape();
    let fits = |start: usize, len: usize, axis: usize| {
        shape.len() >= 2 && start.checked_add(len).is_some_and(|end| end <= shape[axis])
    };
    if !fits(row, rows, 0) || !fits(col, cols, 1) {
        return Err(SceneError::corrupt(format!(
            "crop {rows}x{cols} at ({row}, {col}) exceeds array of shape {shape:?}"
        )));
    }
    let mut view = array.view();
    view.slice_axis_inplace(Axis(0), Slice::from(row..row + rows));
    view.slice_axis_inplace(Axis(1), Slice::from(col..col + cols));
    Ok(view.to_owned())
}

fn embed(
    array: ArrayD<f64>,
    row: Align,
    col: Align,
    rows: usize,
    cols: usize,
) -> Result<ArrayD<f64>> {
    let shape = array.shape().to_vec();
    if shape.len() < 2 {
        return Err(SceneError::corrupt(format!(
            "cannot embed an array of shape {shape:?}"
        )));
    }
    let (r0, c0) = match (row.offset(shape[0], rows), col.offset(shape[1], cols)) {
        (Some(r), Some(c)) => (r, c),
        _ => {
            return Err(SceneError::corrupt(format!(
                "array of shape {shape:?} does not fit at ({row:?}, {col:?}) \
                 in a {rows}x{cols} frame"
            )))
        }
    };

    let mut frame_shape = shape.clone();
    frame_shape[0] = rows;
    frame_shape[1] = cols;
    let mut frame = ArrayD::<f64>::zeros(IxDyn(&frame_shape));
    {
        let mut target = frame.view_mut();
        target.slice_axis_inplace(Axis(0), Slice::from(r0..r0 + shape[0]));
        target.slice_axis_inplace(Axis(1), Slice::from(c0..c0 + shape[1]));
        target.assign(&array);
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, Array2};

    fn counting(shape: &[usize]) -> ArrayD<f64> {
        let n: usize = shape.iter().product();
        Array::from_shape_vec(IxDyn(shape), (0..n).map(|v| v as f64).collect()).unwrap()
    }

    #[test]
    fn transpose_moves_bands_last() {
        // (bands, rows, cols) → (rows, cols, bands)
        let a = counting(&[3, 2, 4]);
        let t = Transform::Transpose { axes: vec![1, 2, 0] };
        let out = t.apply(a.clone(), None).unwrap();
        assert_eq!(out.shape(), &[2, 4, 3]);
        assert_eq!(out[[1, 3, 2]], a[[2, 1, 3]]);
    }

    #[test]
    fn transpose_rejects_bad_axes() {
        let t = Transform::Transpose { axes: vec![0, 0, 1] };
        assert!(t.apply(counting(&[2, 2, 2]), None).is_err());
        let t = Transform::Transpose { axes: vec![1, 0] };
        assert!(t.apply(counting(&[2, 2, 2]), None).is_err());
    }

    #[test]
    fn crop_keeps_window() {
        let t = Transform::Crop {
            row: 1,
            col: 2,
            rows: 2,
            cols: 1,
        };
        let out = t.apply(counting(&[4, 4]), None).unwrap();
        assert_eq!(out.shape(), &[2, 1]);
        assert_eq!(out[[0, 0]], 6.0);
        assert_eq!(out[[1, 0]], 10.0);

        let too_big = Transform::Crop {
            row: 3,
            col: 0,
            rows: 2,
            cols: 1,
        };
        assert!(too_big.apply(counting(&[4, 4]), None).is_err());
    }

    #[test]
    fn embed_bottom_aligned_with_column_offset() {
        let labels = Array2::from_elem((2, 2), 5.0).into_dyn();
        let t = Transform::Embed {
            row: Align::End,
            col: Align::Start(1),
        };
        let out = t.apply(labels, Some((4, 4))).unwrap();
        assert_eq!(out.shape(), &[4, 4]);
        assert_eq!(out.sum(), 20.0);
        assert_eq!(out[[3, 1]], 5.0);
        assert_eq!(out[[2, 2]], 5.0);
        assert_eq!(out[[1, 1]], 0.0);
        assert_eq!(out[[3, 3]], 0.0);
    }

    #[test]
    fn embed_requires_footprint_and_fit() {
        let t = Transform::Embed {
            row: Align::Start(0),
            col: Align::Start(3),
        };
        assert!(t.apply(counting(&[2, 2]), None).is_err());
        assert!(t.apply(counting(&[2, 2]), Some((4, 4))).is_err());
    }

    #[test]
    fn offsets_near_usize_max_are_rejected() {
        let crop = Transform::Crop {
            row: usize::MAX,
            col: 0,
            rows: 2,
            cols: 1,
        };
        assert!(matches!(
            crop.apply(counting(&[4, 4]), None),
            Err(SceneError::CorruptData(_))
        ));
        let embed = Transform::Embed {
            row: Align::Start(usize::MAX),
            col: Align::End,
        };
        assert!(matches!(
            embed.apply(counting(&[2, 2]), Some((4, 4))),
            Err(SceneError::CorruptData(_))
        ));
    }

    #[test]
    fn shift_labels_adds_offset() {
        let t = Transform::ShiftLabels { by: 1 };
        let out = t.apply(counting(&[1, 3]), None).unwrap();
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn transforms_deserialize_from_json() {
        let json = r#"[
            {"op": "transpose", "axes": [1, 2, 0]},
            {"op": "embed", "row": "end", "col": {"start": 596}},
            {"op": "shift_labels", "by": 1}
        ]"#;
        let parsed: Vec<Transform> = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed[1],
            Transform::Embed {
                row: Align::End,
                col: Align::Start(596)
            }
        );
    }
}

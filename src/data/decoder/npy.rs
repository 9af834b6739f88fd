//! NumPy `.npy` arrays and `.npz` archives.

use std::io::{Read, Seek};
use std::path::Path;

use ndarray::{ArrayD, IxDyn, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpyExt};

use super::{open, FormatDecoder};
use crate::data::model::RawData;
use crate::error::{Result, SceneError};

/// Read an in-memory `.npy` of any numeric dtype as `f64`.
pub fn read_npy_any(bytes: &[u8]) -> Result<ArrayD<f64>> {
    macro_rules! attempt {
        ($($ty:ty),+) => {
            $(
                if let Ok(a) = ArrayD::<$ty>::read_npy(bytes) {
                    return Ok(a.mapv(|v| v as f64));
                }
            )+
        };
    }
    attempt!(f64, f32, i64, i32, i16, i8, u64, u32, u16, u8);
    Err(SceneError::corrupt(
        "not a .npy array of a supported numeric dtype",
    ))
}

/// Read entry `name` of an open `.npz` archive as `f64`, whatever its dtype.
pub(crate) fn npz_entry_any<R: Read + Seek>(
    npz: &mut NpzReader<R>,
    name: &str,
) -> Result<ArrayD<f64>> {
    macro_rules! attempt {
        ($($ty:ty),+) => {
            $(
                if let Ok(a) = npz.by_name::<OwnedRepr<$ty>, IxDyn>(name) {
                    return Ok(a.mapv(|v| v as f64));
                }
            )+
        };
    }
    attempt!(f64, f32, i64, i32, i16, i8, u64, u32, u16, u8);
    Err(SceneError::corrupt(format!(
        "npz entry '{name}' is not a numeric array"
    )))
}

/// Archive entry name without the `.npy` suffix NumPy appends.
pub(crate) fn entry_key(name: &str) -> &str {
    name.strip_suffix(".npy").unwrap_or(name)
}

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

pub struct NpyDecoder;

impl FormatDecoder for NpyDecoder {
    fn name(&self) -> &'static str {
        "NumPy array"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["npy"]
    }

    fn decode(&self, path: &Path) -> Result<RawData> {
        let bytes = std::fs::read(path).map_err(|e| SceneError::io(path, e))?;
        let array = read_npy_any(&bytes)
            .map_err(|e| SceneError::corrupt(format!("{}: {e}", path.display())))?;
        Ok(RawData::single(array))
    }
}

/// `.npz` archive: one named array per entry.  Scene containers written by
/// [`container::save`](crate::container::save) decode to `scene`,
/// `wavelengths` and `gt`.
pub struct NpzDecoder;

impl FormatDecoder for NpzDecoder {
    fn name(&self) -> &'static str {
        "NumPy archive"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["npz"]
    }

    fn decode(&self, path: &Path) -> Result<RawData> {
        let npz_err = |e: ndarray_npy::ReadNpzError| {
            SceneError::corrupt(format!("{}: {e}", path.display()))
        };
        let mut npz = NpzReader::new(open(path)?).map_err(npz_err)?;
        let mut raw = RawData::default();
        for name in npz.names().map_err(npz_err)? {
            let array = npz_entry_any(&mut npz, &name)?;
            raw.arrays.insert(entry_key(&name).to_string(), array);
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use ndarray_npy::{NpzWriter, WriteNpyExt};
    use tempfile::tempdir;

    #[test]
    fn reads_any_numeric_dtype() {
        let a: Array2<u16> = array![[1, 2], [3, 4]];
        let mut bytes = Vec::new();
        a.write_npy(&mut bytes).unwrap();
        let out = read_npy_any(&bytes).unwrap();
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out[[1, 0]], 3.0);

        let b: Array2<f32> = array![[0.5]];
        let mut bytes = Vec::new();
        b.write_npy(&mut bytes).unwrap();
        assert_eq!(read_npy_any(&bytes).unwrap()[[0, 0]], 0.5);

        assert!(read_npy_any(b"garbage").is_err());
    }

    #[test]
    fn npz_entries_become_named_arrays() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pair.npz");
        {
            let mut npz = NpzWriter::new(std::fs::File::create(&path).unwrap());
            npz.add_array("img", &array![[1.0f64, 2.0]]).unwrap();
            npz.add_array("gt", &array![[1i64, 0]]).unwrap();
            npz.finish().unwrap();
        }
        let mut raw = NpzDecoder.decode(&path).unwrap();
        assert_eq!(raw.names(), vec!["gt", "img"]);
        assert_eq!(raw.take(Some("img")).unwrap()[[0, 1]], 2.0);
        assert_eq!(raw.take(Some("gt")).unwrap()[[0, 0]], 1.0);
    }
}

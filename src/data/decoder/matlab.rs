//! MATLAB level-5 MAT-file reader.
//!
//! Layout reminder:
//! ```text
//!  [128-byte header: text | subsys offset | version | endian "IM"/"MI"]
//!  [data element]*      tag = (type: u32, byte count: u32), payload, pad to 8
//!     miCOMPRESSED  →   zlib stream holding one more data element
//!     miMATRIX      →   array flags | dimensions | name | real part [| imag]
//! ```
//! Small data elements pack the tag into 4 bytes (count in the upper half)
//! followed by up to 4 payload bytes.  Arrays are stored column-major.

use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;
use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use super::{decode_numbers, FormatDecoder, NumKind};
use crate::data::model::RawData;
use crate::error::{Result, SceneError};

const HEADER_LEN: usize = 128;

// Data element types
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

// Array classes holding plain numbers (mxDOUBLE_CLASS ..= mxUINT64_CLASS)
const NUMERIC_CLASSES: std::ops::RangeInclusive<u32> = 6..=15;
const FLAG_COMPLEX: u32 = 0x0800;

pub struct MatDecoder;

impl FormatDecoder for MatDecoder {
    fn name(&self) -> &'static str {
        "MAT-file"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["mat"]
    }

    fn decode(&self, path: &Path) -> Result<RawData> {
        let bytes = std::fs::read(path).map_err(|e| SceneError::io(path, e))?;
        parse_mat(&bytes)
    }
}

/// Parse a complete level-5 MAT-file held in memory.
pub fn parse_mat(bytes: &[u8]) -> Result<RawData> {
    if bytes.len() < HEADER_LEN {
        return Err(SceneError::corrupt("MAT-file shorter than its header"));
    }
    if bytes.starts_with(b"MATLAB 7.3") {
        return Err(SceneError::UnsupportedFormat(
            ".mat (v7.3 / HDF5-based MAT-files)".into(),
        ));
    }
    let big_endian = match &bytes[126..128] {
        b"IM" => false,
        b"MI" => true,
        _ => {
            return Err(SceneError::UnsupportedFormat(
                ".mat (not a level-5 MAT-file)".into(),
            ))
        }
    };

    let mut raw = RawData::default();
    let mut cursor = Cursor::new(bytes, big_endian);
    cursor.pos = HEADER_LEN;

    while cursor.remaining() >= 8 {
        let (ty, payload) = cursor.element()?;
        let variable = match ty {
            MI_MATRIX => parse_matrix(payload, big_endian)?,
            MI_COMPRESSED => {
                let inflated = inflate(payload)?;
                let mut inner = Cursor::new(&inflated, big_endian);
                let (inner_ty, inner_payload) = inner.element()?;
                if inner_ty != MI_MATRIX {
                    log::debug!("skipping compressed element of type {inner_ty}");
                    continue;
                }
                parse_matrix(inner_payload, big_endian)?
            }
            other => {
                log::debug!("skipping top-level element of type {other}");
                None
            }
        };
        if let Some((name, array)) = variable {
            raw.arrays.insert(name, array);
        }
    }
    Ok(raw)
}

fn inflate(payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(payload)
        .read_to_end(&mut out)
        .map_err(|e| SceneError::corrupt(format!("bad compressed MAT element: {e}")))?;
    Ok(out)
}

/// Decode one `miMATRIX` payload; `None` for non-numeric arrays.
fn parse_matrix(payload: &[u8], big_endian: bool) -> Result<Option<(String, ArrayD<f64>)>> {
    if payload.is_empty() {
        return Ok(None);
    }
    let mut c = Cursor::new(payload, big_endian);

    let (_, flags) = c.element()?;
    let flags = c.word(flags, 0)?;
    let class = flags & 0xFF;

    let (dims_ty, dims) = c.element()?;
    let dims: Vec<usize> = decode_numbers(num_kind(dims_ty)?, dims, big_endian)?
        .into_iter()
        .map(|d| d as usize)
        .collect();

    let (_, name) = c.element()?;
    let name = String::from_utf8_lossy(name).trim_end_matches('\0').to_string();

    if !NUMERIC_CLASSES.contains(&class) {
        log::debug!("skipping MAT variable '{name}' of class {class}");
        return Ok(None);
    }

    let (real_ty, real) = c.element()?;
    let values = decode_numbers(num_kind(real_ty)?, real, big_endian)?;
    if flags & FLAG_COMPLEX != 0 {
        log::warn!("MAT variable '{name}' is complex; keeping the real part only");
    }

    let expected = dims.iter().try_fold(1usize, |n, &d| n.checked_mul(d));
    if expected != Some(values.len()) {
        return Err(SceneError::corrupt(format!(
            "MAT variable '{name}' has {} values for dimensions {dims:?}",
            values.len()
        )));
    }
    let array = ArrayD::from_shape_vec(IxDyn(&dims).f(), values)
        .map_err(|e| SceneError::corrupt(format!("MAT variable '{name}': {e}")))?
        .as_standard_layout()
        .into_owned();
    Ok(Some((name, array)))
}

fn num_kind(ty: u32) -> Result<NumKind> {
    Ok(match ty {
        MI_INT8 => NumKind::I8,
        MI_UINT8 => NumKind::U8,
        MI_INT16 => NumKind::I16,
        MI_UINT16 => NumKind::U16,
        MI_INT32 => NumKind::I32,
        MI_UINT32 => NumKind::U32,
        MI_SINGLE => NumKind::F32,
        MI_DOUBLE => NumKind::F64,
        MI_INT64 => NumKind::I64,
        MI_UINT64 => NumKind::U64,
        other => {
            return Err(SceneError::corrupt(format!(
                "unexpected MAT data type {other} for numeric data"
            )))
        }
    })
}

// ---------------------------------------------------------------------------
// Byte cursor over data elements
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], big_endian: bool) -> Self {
        Cursor {
            data,
            pos: 0,
            big_endian,
        }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(SceneError::corrupt(format!(
                "MAT element needs {n} bytes at offset {}, only {} left",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        self.word(bytes, 0)
    }

    /// The `index`-th u32 of `bytes` in file byte order.
    fn word(&self, bytes: &[u8], index: usize) -> Result<u32> {
        let chunk = bytes
            .get(index * 4..index * 4 + 4)
            .ok_or_else(|| SceneError::corrupt("truncated MAT word"))?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(chunk);
        Ok(if self.big_endian {
            u32::from_be_bytes(buf)
        } else {
            u32::from_le_bytes(buf)
        })
    }

    /// Read one data element and return its type and payload.
    fn element(&mut self) -> Result<(u32, &'a [u8])> {
        let first = self.u32()?;
        let small_len = (first >> 16) as usize;
        if small_len != 0 {
            if small_len > 4 {
                return Err(SceneError::corrupt("small MAT element longer than 4 bytes"));
            }
            let payload = self.take(4)?;
            return Ok((first & 0xFFFF, &payload[..small_len]));
        }

        let len = self.u32()? as usize;
        let payload = self.take(len)?;
        // Elements are 8-byte aligned; compressed ones are not padded.
        if first != MI_COMPRESSED {
            let pad = (8 - len % 8) % 8;
            self.pos = (self.pos + pad).min(self.data.len());
        }
        Ok((first, payload))
    }
}

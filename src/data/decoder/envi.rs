//! ENVI raster: a text `.hdr` header next to a flat binary file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, IxDyn};

use super::{decode_numbers, FormatDecoder, NumKind};
use crate::data::model::RawData;
use crate::error::{Result, SceneError};

/// Extensions tried, in order, when looking for the binary next to a header.
const DATA_EXTENSIONS: &[&str] = &["", "img", "raw", "dat", "bsq", "bil", "bip"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleave {
    /// band, line, sample
    Bsq,
    /// line, band, sample
    Bil,
    /// line, sample, band
    Bip,
}

/// The header fields the decoder uses.
#[derive(Debug, Clone, PartialEq)]
pub struct EnviHeader {
    pub samples: usize,
    pub lines: usize,
    pub bands: usize,
    pub header_offset: usize,
    pub data_type: NumKind,
    pub interleave: Interleave,
    pub big_endian: bool,
    /// Band centres in nanometres, if listed.
    pub wavelengths: Option<Vec<f64>>,
}

/// Split an ENVI header into lower-cased keys and raw values; `{...}` values
/// may span several lines.
fn header_fields(text: &str) -> Result<BTreeMap<String, String>> {
    let mut lines = text.lines();
    match lines.next() {
        Some(first) if first.trim_start().starts_with("ENVI") => {}
        _ => return Err(SceneError::corrupt("ENVI header must start with 'ENVI'")),
    }

    let mut fields = BTreeMap::new();
    let mut pending: Option<(String, String)> = None;
    for line in lines {
        if let Some((key, mut value)) = pending.take() {
            value.push(' ');
            value.push_str(line.trim());
            if line.contains('}') {
                fields.insert(key, value);
            } else {
                pending = Some((key, value));
            }
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim().to_string();
        if value.starts_with('{') && !value.contains('}') {
            pending = Some((key, value));
        } else {
            fields.insert(key, value);
        }
    }
    if let Some((key, _)) = pending {
        return Err(SceneError::corrupt(format!("unterminated '{{' in ENVI field '{key}'")));
    }
    Ok(fields)
}

fn required(fields: &BTreeMap<String, String>, key: &str) -> Result<usize> {
    fields
        .get(key)
        .ok_or_else(|| SceneError::corrupt(format!("ENVI header is missing '{key}'")))?
        .parse()
        .map_err(|_| SceneError::corrupt(format!("ENVI field '{key}' is not an integer")))
}

fn brace_list(value: &str) -> Result<Vec<f64>> {
    value
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| SceneError::corrupt(format!("bad ENVI list value '{s}'")))
        })
        .collect()
}

/// Parse the text of a `.hdr` file.
pub fn parse_header(text: &str) -> Result<EnviHeader> {
    let fields = header_fields(text)?;

    let data_type = match required(&fields, "data type")? {
        1 => NumKind::U8,
        2 => NumKind::I16,
        3 => NumKind::I32,
        4 => NumKind::F32,
        5 => NumKind::F64,
        12 => NumKind::U16,
        13 => NumKind::U32,
        14 => NumKind::I64,
        15 => NumKind::U64,
        other => {
            return Err(SceneError::UnsupportedFormat(format!(
                ".hdr (ENVI data type {other})"
            )))
        }
    };

    let interleave = match fields
        .get("interleave")
        .map(|s| s.to_ascii_lowercase())
        .as_deref()
    {
        None | Some("bsq") => Interleave::Bsq,
        Some("bil") => Interleave::Bil,
        Some("bip") => Interleave::Bip,
        Some(other) => {
            return Err(SceneError::corrupt(format!("unknown ENVI interleave '{other}'")))
        }
    };

    let wavelengths = match fields.get("wavelength") {
        Some(list) => {
            let units = fields
                .get("wavelength units")
                .map(|u| u.to_ascii_lowercase())
                .unwrap_or_default();
            let scale = if units.starts_with("micro") || units == "um" || units == "µm" {
                1000.0
            } else {
                1.0
            };
            Some(brace_list(list)?.into_iter().map(|w| w * scale).collect())
        }
        None => None,
    };

    Ok(EnviHeader {
        samples: required(&fields, "samples")?,
        lines: required(&fields, "lines")?,
        bands: required(&fields, "bands")?,
        header_offset: fields
            .get("header offset")
            .map(|_| required(&fields, "header offset"))
            .transpose()?
            .unwrap_or(0),
        data_type,
        interleave,
        big_endian: fields.get("byte order").map(|s| s.trim() == "1").unwrap_or(false),
        wavelengths,
    })
}

fn find_data_file(header_path: &Path) -> Result<PathBuf> {
    DATA_EXTENSIONS
        .iter()
        .map(|ext| header_path.with_extension(ext))
        .find(|p| p.is_file())
        .ok_or_else(|| {
            SceneError::corrupt(format!(
                "no binary data file found next to {}",
                header_path.display()
            ))
        })
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// ENVI image → `(lines, samples, bands)`, wavelengths from the header.
pub struct EnviDecoder;

impl FormatDecoder for EnviDecoder {
    fn name(&self) -> &'static str {
        "ENVI"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["hdr"]
    }

    fn decode(&self, path: &Path) -> Result<RawData> {
        let text = std::fs::read_to_string(path).map_err(|e| SceneError::io(path, e))?;
        let header = parse_header(&text)?;
        let data_path = find_data_file(path)?;
        let bytes = std::fs::read(&data_path).map_err(|e| SceneError::io(&data_path, e))?;

        let (lines, samples, bands) = (header.lines, header.samples, header.bands);
        let too_large = || {
            SceneError::corrupt(format!(
                "{}: {lines}x{samples}x{bands} cube does not fit in memory",
                path.display()
            ))
        };
        let count = lines
            .checked_mul(samples)
            .and_then(|n| n.checked_mul(bands))
            .ok_or_else(too_large)?;
        let needed = count.checked_mul(header.data_type.size()).ok_or_else(too_large)?;
        let end = header.header_offset.checked_add(needed).ok_or_else(too_large)?;
        let body = bytes
            .get(header.header_offset..end)
            .ok_or_else(|| {
                SceneError::corrupt(format!(
                    "{} holds {} bytes, expected {} after a {}-byte offset",
                    data_path.display(),
                    bytes.len(),
                    needed,
                    header.header_offset
                ))
            })?;
        let values = decode_numbers(header.data_type, body, header.big_endian)?;

        let (file_shape, to_lsb): ([usize; 3], [usize; 3]) = match header.interleave {
            Interleave::Bsq => ([bands, lines, samples], [1, 2, 0]),
            Interleave::Bil => ([lines, bands, samples], [0, 2, 1]),
            Interleave::Bip => ([lines, samples, bands], [0, 1, 2]),
        };
        let array = ArrayD::from_shape_vec(IxDyn(&file_shape), values)
            .map_err(|e| SceneError::corrupt(format!("{}: {e}", data_path.display())))?
            .permuted_axes(IxDyn(&to_lsb))
            .as_standard_layout()
            .into_owned();

        if let Some(w) = &header.wavelengths {
            if w.len() != bands {
                log::warn!(
                    "{} lists {} wavelengths for {bands} bands; ignoring them",
                    path.display(),
                    w.len()
                );
            }
        }

        let mut raw = RawData::single(array);
        raw.wavelengths = header.wavelengths.filter(|w| w.len() == bands);
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HEADER: &str = "ENVI
description = {
  test scene}
samples = 3
lines = 2
bands = 2
header offset = 0
file type = ENVI Standard
data type = 12
interleave = bil
byte order = 0
wavelength units = Micrometers
wavelength = { 0.45,
 0.55 }
";

    #[test]
    fn parses_multiline_header() {
        let h = parse_header(HEADER).unwrap();
        assert_eq!((h.samples, h.lines, h.bands), (3, 2, 2));
        assert_eq!(h.data_type, NumKind::U16);
        assert_eq!(h.interleave, Interleave::Bil);
        assert!(!h.big_endian);
        let w = h.wavelengths.unwrap();
        assert!((w[0] - 450.0).abs() < 1e-9 && (w[1] - 550.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_envi_text() {
        assert!(parse_header("samples = 3\n").is_err());
        assert!(parse_header("ENVI\nsamples = 3\n").is_err());
    }

    #[test]
    fn decodes_bil_to_lines_samples_bands() {
        let dir = tempdir().unwrap();
        let hdr = dir.path().join("scene.hdr");
        std::fs::write(&hdr, HEADER).unwrap();

        // value = 100*line + 10*band + sample, stored line-band-sample
        let mut bytes = Vec::new();
        for line in 0..2u16 {
            for band in 0..2u16 {
                for sample in 0..3u16 {
                    bytes.extend_from_slice(&(100 * line + 10 * band + sample).to_le_bytes());
                }
            }
        }
        std::fs::write(dir.path().join("scene.img"), bytes).unwrap();

        let mut raw = EnviDecoder.decode(&hdr).unwrap();
        assert_eq!(raw.wavelengths.as_ref().map(Vec::len), Some(2));
        let a = raw.take(None).unwrap();
        assert_eq!(a.shape(), &[2, 3, 2]);
        assert_eq!(a[[1, 2, 1]], 112.0);
        assert_eq!(a[[0, 1, 0]], 1.0);
    }

    #[test]
    fn overflowing_dimensions_are_corrupt() {
        let dir = tempdir().unwrap();
        let hdr = dir.path().join("scene.hdr");
        std::fs::write(dir.path().join("scene.img"), [0u8; 8]).unwrap();

        let huge = HEADER
            .replace("samples = 3", "samples = 4294967296")
            .replace("lines = 2", "lines = 4294967296");
        std::fs::write(&hdr, huge).unwrap();
        assert!(matches!(EnviDecoder.decode(&hdr), Err(SceneError::CorruptData(_))));

        let far = HEADER.replace("header offset = 0", &format!("header offset = {}", usize::MAX));
        std::fs::write(&hdr, far).unwrap();
        assert!(matches!(EnviDecoder.decode(&hdr), Err(SceneError::CorruptData(_))));
    }
}

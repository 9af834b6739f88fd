//! Raster image decoders: multi-page TIFF cubes and single-channel PNG
//! label maps.

use std::io::BufReader;
use std::path::Path;

use image::{DynamicImage, ImageFormat};
use ndarray::{ArrayD, IxDyn};
use tiff::decoder::{Decoder, DecodingResult, Limits};

use super::{open, FormatDecoder};
use crate::data::model::RawData;
use crate::error::{Result, SceneError};

// ---------------------------------------------------------------------------
// TIFF
// ---------------------------------------------------------------------------

/// Multi-page TIFF: every page is one band.
///
/// Output shapes:
/// * several pages → `(pages, rows, cols)` (or `(pages, rows, cols, samples)`),
/// * one page with n > 1 samples per pixel → `(rows, cols, n)`,
/// * one single-sample page → `(rows, cols)`.
pub struct TiffDecoder;

impl FormatDecoder for TiffDecoder {
    fn name(&self) -> &'static str {
        "TIFF"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["tif", "tiff"]
    }

    fn decode(&self, path: &Path) -> Result<RawData> {
        let tiff_err = |e: tiff::TiffError| SceneError::corrupt(format!("{}: {e}", path.display()));

        let reader = BufReader::new(open(path)?);
        let mut decoder = Decoder::new(reader)
            .map_err(tiff_err)?
            .with_limits(Limits::unlimited());

        let mut values: Vec<f64> = Vec::new();
        let mut page_dims: Option<(usize, usize, usize)> = None;
        let mut pages = 0usize;

        loop {
            let (width, height) = decoder.dimensions().map_err(tiff_err)?;
            let (width, height) = (width as usize, height as usize);
            let page = decoding_result_to_f64(decoder.read_image().map_err(tiff_err)?)?;

            let pixels = width * height;
            if pixels == 0 || page.len() % pixels != 0 {
                return Err(SceneError::corrupt(format!(
                    "TIFF page {pages} holds {} values for {width}x{height} pixels",
                    page.len()
                )));
            }
            let dims = (height, width, page.len() / pixels);
            match page_dims {
                Some(first) if first != dims => {
                    return Err(SceneError::corrupt(format!(
                        "TIFF page {pages} is {dims:?} but page 0 is {first:?}"
                    )))
                }
                _ => page_dims = Some(dims),
            }
            values.extend(page);
            pages += 1;

            if !decoder.more_images() {
                break;
            }
            decoder.next_image().map_err(tiff_err)?;
        }

        let (rows, cols, samples) = page_dims.unwrap_or_default();
        let shape: Vec<usize> = match (pages, samples) {
            (1, 1) => vec![rows, cols],
            (1, s) => vec![rows, cols, s],
            (p, 1) => vec![p, rows, cols],
            (p, s) => vec![p, rows, cols, s],
        };
        log::debug!("TIFF {}: {pages} page(s) → {shape:?}", path.display());

        let array = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| SceneError::corrupt(format!("{}: {e}", path.display())))?;
        Ok(RawData::single(array))
    }
}

#[allow(unreachable_patterns)]
fn decoding_result_to_f64(result: DecodingResult) -> Result<Vec<f64>> {
    Ok(match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        _ => return Err(SceneError::corrupt("unsupported TIFF sample type")),
    })
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

/// Single-channel PNG decoded to its raw integer values, `(rows, cols)`.
///
/// Grey images with an alpha channel drop the alpha; RGB(A) images are
/// accepted only when every pixel is grey (R = G = B).
pub struct PngDecoder;

impl FormatDecoder for PngDecoder {
    fn name(&self) -> &'static str {
        "PNG"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["png"]
    }

    fn decode(&self, path: &Path) -> Result<RawData> {
        let bytes = std::fs::read(path).map_err(|e| SceneError::io(path, e))?;
        let img = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .map_err(|e| SceneError::corrupt(format!("{}: {e}", path.display())))?;
        let (rows, cols) = (img.height() as usize, img.width() as usize);

        let values: Vec<f64> = match img {
            DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(f64::from).collect(),
            DynamicImage::ImageLuma16(buf) => buf.into_raw().into_iter().map(f64::from).collect(),
            DynamicImage::ImageLumaA8(buf) => buf.pixels().map(|p| f64::from(p.0[0])).collect(),
            DynamicImage::ImageLumaA16(buf) => buf.pixels().map(|p| f64::from(p.0[0])).collect(),
            rgb8 @ (DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_)) => {
                let rgba = rgb8.to_rgba8();
                let rgb = rgba.pixels().map(|p| [p.0[0] as u16, p.0[1] as u16, p.0[2] as u16]);
                grey_or_err(rgb, path)?
            }
            other => {
                let rgba = other.to_rgba16();
                grey_or_err(rgba.pixels().map(|p| [p.0[0], p.0[1], p.0[2]]), path)?
            }
        };

        let array = ArrayD::from_shape_vec(IxDyn(&[rows, cols]), values)
            .map_err(|e| SceneError::corrupt(format!("{}: {e}", path.display())))?;
        Ok(RawData::single(array))
    }
}

fn grey_or_err(pixels: impl Iterator<Item = [u16; 3]>, path: &Path) -> Result<Vec<f64>> {
    pixels
        .map(|[r, g, b]| {
            if r == g && g == b {
                Ok(f64::from(r))
            } else {
                Err(SceneError::corrupt(format!(
                    "{}: expected a single-channel label image, found colour pixels",
                    path.display()
                )))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use tempfile::tempdir;
    use tiff::encoder::{colortype, TiffEncoder};

    #[test]
    fn multi_page_tiff_is_bands_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cube.tif");
        {
            let file = std::fs::File::create(&path).unwrap();
            let mut enc = TiffEncoder::new(file).unwrap();
            for band in 0..3 {
                // 2 rows x 4 cols
                let page: Vec<f32> = (0..8).map(|i| (band * 100 + i) as f32).collect();
                enc.write_image::<colortype::Gray32Float>(4, 2, &page).unwrap();
            }
        }
        let mut raw = TiffDecoder.decode(&path).unwrap();
        let a = raw.take(None).unwrap();
        assert_eq!(a.shape(), &[3, 2, 4]);
        assert_eq!(a[[2, 1, 3]], 207.0);
        assert_eq!(a[[0, 0, 1]], 1.0);
    }

    #[test]
    fn single_page_tiff_is_two_dimensional() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gt.tif");
        {
            let file = std::fs::File::create(&path).unwrap();
            let mut enc = TiffEncoder::new(file).unwrap();
            enc.write_image::<colortype::Gray8>(3, 2, &[0, 1, 2, 3, 4, 5]).unwrap();
        }
        let mut raw = TiffDecoder.decode(&path).unwrap();
        let a = raw.take(None).unwrap();
        assert_eq!(a.shape(), &[2, 3]);
        assert_eq!(a[[1, 0]], 3.0);
    }

    #[test]
    fn grey_png_keeps_raw_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gt.png");
        let mut img = GrayImage::new(3, 2);
        img.put_pixel(2, 1, Luma([6]));
        img.save(&path).unwrap();

        let mut raw = PngDecoder.decode(&path).unwrap();
        let a = raw.take(None).unwrap();
        assert_eq!(a.shape(), &[2, 3]);
        assert_eq!(a[[1, 2]], 6.0);
        assert_eq!(a.sum(), 6.0);
    }

    #[test]
    fn colour_png_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("colour.png");
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.save(&path).unwrap();
        assert!(matches!(PngDecoder.decode(&path), Err(SceneError::CorruptData(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("does-not-exist.png");
        assert!(matches!(PngDecoder.decode(&path), Err(SceneError::Io { .. })));
    }
}

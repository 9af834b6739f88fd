use std::path::Path;

use image::{Rgb, RgbImage};
use ndarray::{Array2, Array3, Axis};

use crate::color::Palette;
use crate::error::{Result, SceneError};

// ---------------------------------------------------------------------------
// Quick-look images
// ---------------------------------------------------------------------------

/// False-colour image from three bands, each stretched from its own minimum
/// to its maximum.  A constant band renders black.
pub fn rgb_preview(cube: &Array3<f32>, bands: [usize; 3]) -> Result<RgbImage> {
    let (rows, cols, n_bands) = cube.dim();
    if let Some(&b) = bands.iter().find(|&&b| b >= n_bands) {
        return Err(SceneError::corrupt(format!(
            "preview band {b} out of range for a cube of {n_bands} bands"
        )));
    }

    let channels: Vec<Array2<u8>> = bands
        .iter()
        .map(|&b| stretch(&cube.index_axis(Axis(2), b).to_owned()))
        .collect();

    let mut img = RgbImage::new(cols as u32, rows as u32);
    for r in 0..rows {
        for c in 0..cols {
            let px = [channels[0][[r, c]], channels[1][[r, c]], channels[2][[r, c]]];
            img.put_pixel(c as u32, r as u32, Rgb(px));
        }
    }
    Ok(img)
}

fn stretch(band: &Array2<f32>) -> Array2<u8> {
    let (lo, hi) = band
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = hi - lo;
    if !(span > 0.0) {
        return Array2::zeros(band.dim());
    }
    band.mapv(|v| (((v - lo) / span) * 255.0).round() as u8)
}

/// Label map painted with the palette.
pub fn label_image(labels: &Array2<u32>, palette: &Palette) -> RgbImage {
    let (rows, cols) = labels.dim();
    let mut img = RgbImage::new(cols as u32, rows as u32);
    for ((r, c), &label) in labels.indexed_iter() {
        img.put_pixel(c as u32, r as u32, Rgb(palette.color_for(label)));
    }
    img
}

pub fn save_png(img: &RgbImage, path: &Path) -> Result<()> {
    img.save(path)
        .map_err(|e| SceneError::io(path, std::io::Error::other(e)))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};

    #[test]
    fn bands_are_stretched_independently() {
        let cube = Array::from_shape_vec((1, 2, 2), vec![0.0f32, 5.0, 2.0, 5.0]).unwrap();
        let img = rgb_preview(&cube, [0, 1, 0]).unwrap();
        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(1, 0), &Rgb([255, 0, 255]));
    }

    #[test]
    fn out_of_range_band_is_rejected() {
        let cube = Array3::<f32>::zeros((1, 1, 2));
        assert!(rgb_preview(&cube, [0, 1, 2]).is_err());
    }

    #[test]
    fn labels_use_palette_colours() {
        let palette = Palette::for_labels(3);
        let img = label_image(&array![[0u32, 2]], &palette);
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(1, 0), &Rgb(palette.color_for(2)));
    }
}

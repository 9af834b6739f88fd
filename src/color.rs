use palette::{Hsl, IntoColor, Srgb};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_colors(n: usize) -> Vec<[u8; 3]> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            [
                (rgb.red * 255.0).round() as u8,
                (rgb.green * 255.0).round() as u8,
                (rgb.blue * 255.0).round() as u8,
            ]
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Palette: label index → RGB
// ---------------------------------------------------------------------------

/// Display colour for every label index of a scene.  Consumers read it; the
/// pipeline never changes it once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    colors: Vec<[u8; 3]>,
}

impl Palette {
    /// Fallback for indices beyond the palette.
    pub const DEFAULT_COLOR: [u8; 3] = [128, 128, 128];

    /// Default palette for `n_labels` classes: label 0 ("undefined") is
    /// black, the others get evenly spaced hues.
    pub fn for_labels(n_labels: usize) -> Self {
        let mut colors = Vec::with_capacity(n_labels);
        if n_labels > 0 {
            colors.push([0, 0, 0]);
            colors.extend(generate_colors(n_labels - 1));
        }
        Palette { colors }
    }

    /// Use explicit colours, padding missing entries with generated ones.
    pub fn from_colors(mut colors: Vec<[u8; 3]>, n_labels: usize) -> Self {
        if colors.len() < n_labels {
            let generated = Palette::for_labels(n_labels);
            colors.extend_from_slice(&generated.colors[colors.len()..]);
        }
        Palette { colors }
    }

    /// Colour of label `index`.
    pub fn color_for(&self, index: u32) -> [u8; 3] {
        self.colors
            .get(index as usize)
            .copied()
            .unwrap_or(Self::DEFAULT_COLOR)
    }

    /// Colour as floats in `[0, 1]`, the form plotting front ends expect.
    pub fn normalized(&self, index: u32) -> [f32; 3] {
        let [r, g, b] = self.color_for(index);
        [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Legend entries (label name → colour) for the given class names.
    pub fn legend_entries(&self, label_values: &[String]) -> Vec<(String, [u8; 3])> {
        label_values
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), self.color_for(i as u32)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_label_is_black() {
        let p = Palette::for_labels(5);
        assert_eq!(p.len(), 5);
        assert_eq!(p.color_for(0), [0, 0, 0]);
        assert_ne!(p.color_for(1), p.color_for(2));
    }

    #[test]
    fn out_of_range_uses_default() {
        let p = Palette::for_labels(2);
        assert_eq!(p.color_for(7), Palette::DEFAULT_COLOR);
    }

    #[test]
    fn explicit_colors_are_padded() {
        let p = Palette::from_colors(vec![[1, 2, 3]], 3);
        assert_eq!(p.len(), 3);
        assert_eq!(p.color_for(0), [1, 2, 3]);
        assert_eq!(p.color_for(2), Palette::for_labels(3).color_for(2));
    }

    #[test]
    fn first_hue_is_red() {
        let c = generate_colors(3);
        assert_eq!(c.len(), 3);
        assert!(c[0][0] > c[0][1] && c[0][0] > c[0][2]);
    }
}

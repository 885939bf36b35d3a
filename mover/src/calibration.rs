use std::fs;
use std::path::Path;

use anyhow::Context;
use nalgebra::{Matrix2, Vector2};

/// Pixel-to-robot plane mapping. The calibration procedure stores a 2x3
/// affine transform as six whitespace-separated values:
/// a11 a12 tx a21 a22 ty.
pub struct Calibration {
    linear: Matrix2<f64>,
    translation: Vector2<f64>,
}

impl Calibration {
    pub fn load(path: &Path) -> anyhow::Result<Calibration> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read calibration file {}", path.display()))?;
        let values = content
            .split_whitespace()
            .map(|v| v.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .context("Calibration file contains non-numeric values")?;
        if values.len() != 6 {
            anyhow::bail!("Calibration file must contain 6 values, found {}", values.len());
        }

        Ok(Calibration {
            linear: Matrix2::new(values[0], values[1], values[3], values[4]),
            translation: Vector2::new(values[2], values[5]),
        })
    }

    pub fn pixel_to_robot(&self, pixel: Vector2<i64>) -> Vector2<f64> {
        self.linear * pixel.cast::<f64>() + self.translation
    }
}

//! Foreground masks and their row projection profiles.

use crate::image::{scale, ImageError, ImageHandle, PixelDepth};

/// Foreground pixel positions of a (possibly reduced) page.
#[derive(Debug, Clone)]
pub(crate) struct ForegroundMask {
    width: u32,
    height: u32,
    /// `(x, y)` of every foreground pixel, row-major.
    points: Vec<(u32, u32)>,
}

impl ForegroundMask {
    /// Build the mask of `image` reduced by `reduction`.
    ///
    /// Binary images are OR-reduced: a reduced pixel is foreground when any
    /// pixel of its block is. Everything else is converted to gray, scaled
    /// down and thresholded.
    pub(crate) fn from_image(
        image: &ImageHandle,
        reduction: u32,
        threshold: u8,
    ) -> Result<Self, ImageError> {
        if reduction <= 1 {
            return Ok(Self::thresholded(image, threshold));
        }
        if image.depth() == PixelDepth::Bit1 {
            return Ok(Self::or_reduced(image, reduction, threshold));
        }

        let factor = 1.0 / reduction as f32;
        let reduced = scale(&image.to_gray(), factor, factor)?;
        Ok(Self::thresholded(&reduced, threshold))
    }

    fn thresholded(image: &ImageHandle, threshold: u8) -> Self {
        let (width, height) = image.dimensions();
        let mut points = Vec::new();
        for y in 0..height {
            for x in 0..width {
                if image.gray_at(x, y) < threshold {
                    points.push((x, y));
                }
            }
        }
        Self {
            width,
            height,
            points,
        }
    }

    fn or_reduced(image: &ImageHandle, reduction: u32, threshold: u8) -> Self {
        let width = image.width().div_ceil(reduction);
        let height = image.height().div_ceil(reduction);
        let mut grid = vec![false; width as usize * height as usize];

        for y in 0..image.height() {
            let row = (y / reduction) as usize * width as usize;
            for x in 0..image.width() {
                if image.gray_at(x, y) < threshold {
                    grid[row + (x / reduction) as usize] = true;
                }
            }
        }

        let points = grid
            .iter()
            .enumerate()
            .filter(|&(_, &set)| set)
            .map(|(i, _)| ((i % width as usize) as u32, (i / width as usize) as u32))
            .collect();
        Self {
            width,
            height,
            points,
        }
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn foreground_count(&self) -> usize {
        self.points.len()
    }

    /// Rows trimmed from the top and bottom of the profile so that every
    /// scored row sees the full width at any angle up to `max_angle`.
    pub(crate) fn margin_for(&self, max_angle: f64) -> usize {
        let tan = max_angle.abs().to_radians().tan();
        (tan * self.width as f64 / 2.0).ceil() as usize + 1
    }

    /// Differential square sum of the row profile after shearing by
    /// `angle_degrees`.
    ///
    /// Each foreground pixel `(x, y)` lands on row `y + round(tan(angle) * (x - cx))`.
    /// Only rows in `[margin, height - margin)` are scored; use the same
    /// margin for every angle being compared.
    pub(crate) fn differential_square_sum(&self, angle_degrees: f64, margin: usize) -> f64 {
        let height = self.height as usize;
        if height <= 2 * margin || self.points.is_empty() {
            return 0.0;
        }

        let tan = angle_degrees.to_radians().tan();
        let cx = (self.width as f64 - 1.0) / 2.0;
        let shifts: Vec<i64> = (0..self.width)
            .map(|x| (tan * (x as f64 - cx)).round() as i64)
            .collect();

        let len = height + 2 * margin;
        let last = len as i64 - 1;
        let mut profile = vec![0u32; len];
        for &(x, y) in &self.points {
            let row = (y as i64 + shifts[x as usize] + margin as i64).clamp(0, last);
            profile[row as usize] += 1;
        }

        // Original-frame rows [margin, height - margin) sit at [2 * margin, height)
        (2 * margin..height)
            .map(|i| {
                let diff = profile[i] as f64 - profile[i - 1] as f64;
                diff * diff
            })
            .sum()
    }
}

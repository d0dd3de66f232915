//! Scaling by independent horizontal and vertical factors.
//!
//! Continuous-tone images go through the `image` crate's triangle filter,
//! which averages neighbouring pixels when shrinking. Binary and palette
//! images are sampled nearest-neighbour so their pixel values stay valid.
//! All functions return new handles without modifying the input.

use image::imageops::FilterType;

use super::{ImageError, ImageHandle, PixelDepth, Resolution};

/// Scale an image by `sx` horizontally and `sy` vertically.
///
/// Output dimensions are `round(width * sx)` and `round(height * sy)`,
/// never less than one pixel. A known resolution is scaled by the same
/// factors so the physical page size is preserved.
///
/// # Arguments
///
/// * `image` - The source image
/// * `sx` - Horizontal factor, below 1.0 shrinks
/// * `sy` - Vertical factor, below 1.0 shrinks
///
/// # Errors
///
/// Returns `ImageError::InvalidScale` if a factor is not finite and positive.
pub fn scale(image: &ImageHandle, sx: f32, sy: f32) -> Result<ImageHandle, ImageError> {
    if !(sx.is_finite() && sy.is_finite() && sx > 0.0 && sy > 0.0) {
        return Err(ImageError::InvalidScale { sx, sy });
    }

    let width = scaled_length(image.width(), sx);
    let height = scaled_length(image.height(), sy);
    let resolution = scaled_resolution(image.resolution(), sx, sy);
    resample(image, width, height, resolution)
}

/// Scale an image to exact dimensions.
///
/// # Errors
///
/// Returns `ImageError::InvalidDimensions` if either target dimension is zero.
pub fn scale_to_size(image: &ImageHandle, width: u32, height: u32) -> Result<ImageHandle, ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions { width, height });
    }

    let sx = width as f32 / image.width() as f32;
    let sy = height as f32 / image.height() as f32;
    let resolution = scaled_resolution(image.resolution(), sx, sy);
    resample(image, width, height, resolution)
}

fn resample(
    image: &ImageHandle,
    width: u32,
    height: u32,
    resolution: Resolution,
) -> Result<ImageHandle, ImageError> {
    // Fast path: nothing to resample
    if image.dimensions() == (width, height) {
        return Ok(image.clone());
    }

    if image.depth() == PixelDepth::Bit1 || image.colormap().is_some() {
        return Ok(nearest(image, width, height, resolution));
    }

    let resized = image
        .to_dynamic()
        .resize_exact(width, height, FilterType::Triangle);
    let mut out = ImageHandle::from_dynamic(resized, resolution)?;
    out.copy_tags_from(image);
    Ok(out)
}

fn nearest(image: &ImageHandle, width: u32, height: u32, resolution: Resolution) -> ImageHandle {
    let (src_w, src_h) = image.dimensions();
    let x_ratio = src_w as f64 / width as f64;
    let y_ratio = src_h as f64 / height as f64;

    let columns: Vec<u32> = (0..width)
        .map(|x| (((x as f64 + 0.5) * x_ratio) as u32).min(src_w - 1))
        .collect();

    let mut out = image.blank_like(width, height, resolution);
    for y in 0..height {
        let src_y = (((y as f64 + 0.5) * y_ratio) as u32).min(src_h - 1);
        for (x, &src_x) in columns.iter().enumerate() {
            out.set_pixel(x as u32, y, image.get_pixel(src_x, src_y));
        }
    }
    out
}

fn scaled_length(length: u32, factor: f32) -> u32 {
    ((length as f64 * factor as f64).round() as u32).max(1)
}

fn scaled_resolution(resolution: Resolution, sx: f32, sy: f32) -> Resolution {
    if !resolution.is_known() {
        return resolution;
    }
    Resolution::new(
        scaled_length(resolution.x, sx),
        scaled_length(resolution.y, sy),
    )
}


// ============================================================================
// Property-Based Tests
// ============================================================================

//! Image rotation with sampling and bilinear interpolation.
//!
//! Two methods are available:
//! - **Sampling**: nearest source pixel, required for binary and palette
//!   images whose values cannot be blended
//! - **Bilinear**: weighted blend of the four nearest pixels, for gray and
//!   color images
//!
//! # Algorithm
//!
//! The rotation uses inverse mapping: for each pixel in the output image we
//! calculate which source position lands on it and sample there. With pixel
//! centres at half-integer offsets and `a = -angle`:
//! ```text
//! dx = dst_x + 0.5 - dst_w / 2
//! dy = dst_y + 0.5 - dst_h / 2
//! src_x = dx * cos(a) - dy * sin(a) + src_w / 2 - 0.5
//! src_y = dx * sin(a) + dy * cos(a) + src_h / 2 - 0.5
//! ```
//! Output pixels whose source position falls outside the image take the
//! background value of the depth.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::image::{pack_channels, unpack_channels, ImageHandle, PixelDepth};

/// Angles below this magnitude (degrees) are treated as no rotation.
const NO_ROTATION_EPSILON: f64 = 0.001;

/// How output pixels are computed from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotateMethod {
    /// Nearest source pixel.
    Sampling,
    /// Bilinear interpolation; falls back to sampling for 1 bpp and
    /// colormapped images.
    #[default]
    Bilinear,
}

impl RotateMethod {
    /// The method actually usable for `image`.
    fn resolve(self, image: &ImageHandle) -> RotateMethod {
        if image.depth() == PixelDepth::Bit1 || image.colormap().is_some() {
            RotateMethod::Sampling
        } else {
            self
        }
    }
}

/// Compute the dimensions of the bounding box for a rotated image.
///
/// When an image is rotated, the corners extend beyond the original bounds.
/// This function calculates the minimum bounding box that contains the
/// entire rotated image.
///
/// # Arguments
///
/// * `width` - Original image width
/// * `height` - Original image height
/// * `angle_degrees` - Rotation angle in degrees; the sign does not matter
///
/// # Returns
///
/// Tuple of (new_width, new_height) for the rotated bounding box.
pub fn compute_rotated_bounds(width: u32, height: u32, angle_degrees: f64) -> (u32, u32) {
    // Normalize angle to handle 360, 720, etc.
    let angle_normalized = angle_degrees % 360.0;
    let abs_angle = angle_normalized.abs();

    if abs_angle < NO_ROTATION_EPSILON || (360.0 - abs_angle).abs() < NO_ROTATION_EPSILON {
        return (width, height);
    }
    if (abs_angle - 90.0).abs() < NO_ROTATION_EPSILON || (abs_angle - 270.0).abs() < NO_ROTATION_EPSILON {
        return (height, width);
    }
    if (abs_angle - 180.0).abs() < NO_ROTATION_EPSILON {
        return (width, height);
    }

    let angle_rad = angle_degrees.to_radians();
    let cos = angle_rad.cos().abs();
    let sin = angle_rad.sin().abs();

    let w = width as f64;
    let h = height as f64;

    let new_w = (w * cos + h * sin).round() as u32;
    let new_h = (w * sin + h * cos).round() as u32;

    (new_w.max(1), new_h.max(1))
}

/// Rotate an image to undo a counter-clockwise skew of `angle_degrees`.
///
/// Uses bilinear interpolation where the depth allows it and sampling
/// otherwise. See [`rotate_with_method`].
pub fn rotate(image: &ImageHandle, angle_degrees: f64) -> ImageHandle {
    rotate_with_method(image, angle_degrees, RotateMethod::default())
}

/// Rotate an image clockwise by `angle_degrees` about its centre.
///
/// The output canvas is expanded to the rotated bounding box and exposed
/// border pixels are filled with the background: a clear bit for 1 bpp,
/// white for gray and RGB, opaque white for RGBA and the lightest entry for
/// palette images. Resolution, palette, format tag and text carry over.
///
/// # Arguments
///
/// * `image` - Source image; never modified
/// * `angle_degrees` - Skew to undo, in degrees
/// * `method` - Requested interpolation; binary and palette images always
///   use sampling
///
/// # Returns
///
/// A new image. For `|angle_degrees| < 0.001` this is a plain copy.
pub fn rotate_with_method(image: &ImageHandle, angle_degrees: f64, method: RotateMethod) -> ImageHandle {
    // Fast path: no rotation needed
    if angle_degrees.abs() < NO_ROTATION_EPSILON {
        return image.clone();
    }

    let method = method.resolve(image);
    let (src_w, src_h) = image.dimensions();
    let (dst_w, dst_h) = compute_rotated_bounds(src_w, src_h, angle_degrees);
    debug!(
        angle = angle_degrees,
        ?method,
        src_width = src_w,
        src_height = src_h,
        dst_width = dst_w,
        dst_height = dst_h,
        "Rotating image"
    );

    let angle_rad = -angle_degrees.to_radians();
    let cos = angle_rad.cos();
    let sin = angle_rad.sin();

    let src_cx = src_w as f64 / 2.0 - 0.5;
    let src_cy = src_h as f64 / 2.0 - 0.5;
    let dst_cx = dst_w as f64 / 2.0 - 0.5;
    let dst_cy = dst_h as f64 / 2.0 - 0.5;

    let fill = image.background_value();
    let mut output = image.blank_like(dst_w, dst_h, image.resolution());

    for dst_y in 0..dst_h {
        let dy = dst_y as f64 - dst_cy;
        for dst_x in 0..dst_w {
            let dx = dst_x as f64 - dst_cx;

            let src_x = dx * cos - dy * sin + src_cx;
            let src_y = dx * sin + dy * cos + src_cy;

            let value = match method {
                RotateMethod::Sampling => sample_nearest(image, src_x, src_y),
                RotateMethod::Bilinear => sample_bilinear(image, src_x, src_y),
            };
            output.set_pixel(dst_x, dst_y, value.unwrap_or(fill));
        }
    }

    output
}

/// True when `(x, y)` lies within the footprint of some source pixel.
#[inline]
fn inside(image: &ImageHandle, x: f64, y: f64) -> bool {
    x >= -0.5 && y >= -0.5 && x < image.width() as f64 - 0.5 && y < image.height() as f64 - 0.5
}

#[inline]
fn sample_nearest(image: &ImageHandle, x: f64, y: f64) -> Option<u32> {
    if !inside(image, x, y) {
        return None;
    }
    let px = ((x + 0.5).floor() as u32).min(image.width() - 1);
    let py = ((y + 0.5).floor() as u32).min(image.height() - 1);
    Some(image.get_pixel(px, py))
}

/// Bilinear blend of the four nearest pixels, clamping neighbours at the
/// image edge.
fn sample_bilinear(image: &ImageHandle, x: f64, y: f64) -> Option<u32> {
    if !inside(image, x, y) {
        return None;
    }

    let max_x = image.width() as i64 - 1;
    let max_y = image.height() as i64 - 1;
    let x0f = x.floor();
    let y0f = y.floor();
    let fx = x - x0f;
    let fy = y - y0f;

    let clamp_x = |v: i64| v.clamp(0, max_x) as u32;
    let clamp_y = |v: i64| v.clamp(0, max_y) as u32;
    let (x0, x1) = (clamp_x(x0f as i64), clamp_x(x0f as i64 + 1));
    let (y0, y1) = (clamp_y(y0f as i64), clamp_y(y0f as i64 + 1));

    let depth = image.depth();
    let p00 = unpack_channels(image.get_pixel(x0, y0), depth);
    let p10 = unpack_channels(image.get_pixel(x1, y0), depth);
    let p01 = unpack_channels(image.get_pixel(x0, y1), depth);
    let p11 = unpack_channels(image.get_pixel(x1, y1), depth);

    let mut result = [0u8; 4];
    for i in 0..4 {
        let v = p00[i] as f64 * (1.0 - fx) * (1.0 - fy)
            + p10[i] as f64 * fx * (1.0 - fy)
            + p01[i] as f64 * (1.0 - fx) * fy
            + p11[i] as f64 * fx * fy;
        result[i] = v.clamp(0.0, 255.0).round() as u8;
    }

    Some(pack_channels(result, depth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ImageFormat;
    use crate::image::{Colormap, Resolution};

    /// Gray test image with a gradient pattern.
    fn test_image(width: u32, height: u32) -> ImageHandle {
        let pixels: Vec<u8> = (0..height)
            .flat_map(|y| (0..width).map(move |x| ((x + y) * 8) as u8))
            .collect();
        ImageHandle::from_gray(width, height, &pixels, Resolution::uniform(300)).unwrap()
    }

    fn filled(width: u32, height: u32, depth: PixelDepth, value: u32) -> ImageHandle {
        let mut img = ImageHandle::new(width, height, depth, Resolution::UNKNOWN).unwrap();
        for y in 0..height {
            for x in 0..width {
                img.set_pixel(x, y, value);
            }
        }
        img
    }

    #[test]
    fn test_no_rotation() {
        let img = test_image(100, 50);
        let result = rotate(&img, 0.0);
        assert_eq!(result, img);
    }

    #[test]
    fn test_tiny_rotation_fast_path() {
        let img = test_image(100, 50);
        let result = rotate(&img, 0.0005);
        assert_eq!(result, img);
    }

    #[test]
    fn test_90_degree_rotation_bounds() {
        assert_eq!(compute_rotated_bounds(100, 50, 90.0), (50, 100));
        assert_eq!(compute_rotated_bounds(100, 50, 270.0), (50, 100));
    }

    #[test]
    fn test_180_degree_rotation_bounds() {
        assert_eq!(compute_rotated_bounds(100, 50, 180.0), (100, 50));
    }

    #[test]
    fn test_45_degree_rotation_bounds() {
        let (w, h) = compute_rotated_bounds(100, 100, 45.0);
        // Diagonal of 100x100 square is ~141.4
        assert!(w > 140 && w < 143, "width was {}", w);
        assert!(h > 140 && h < 143, "height was {}", h);
    }

    #[test]
    fn test_opposite_rotations_same_bounds() {
        assert_eq!(
            compute_rotated_bounds(100, 80, 3.5),
            compute_rotated_bounds(100, 80, -3.5)
        );
    }

    #[test]
    fn test_large_rotation_angles() {
        assert_eq!(compute_rotated_bounds(100, 50, 720.0), (100, 50));
        assert_eq!(compute_rotated_bounds(100, 50, 450.0), (50, 100));
    }

    #[test]
    fn test_bounds_never_zero() {
        for angle in [0.5, 1.0, 7.0, 45.0, 89.0, 90.0, 179.0, 359.0] {
            let (w, h) = compute_rotated_bounds(1, 1, angle);
            assert!(w > 0 && h > 0, "angle {}", angle);
        }
    }

    #[test]
    fn test_rotation_expands_canvas() {
        let img = test_image(200, 300);
        let result = rotate(&img, 5.0);
        assert_eq!(result.dimensions(), compute_rotated_bounds(200, 300, 5.0));
        assert!(result.width() > img.width());
        assert!(result.height() > img.height());
    }

    #[test]
    fn test_input_is_untouched() {
        let img = test_image(40, 30);
        let copy = img.clone();
        let _ = rotate(&img, 3.0);
        assert_eq!(img, copy);
    }

    #[test]
    fn test_90_degree_rotation_moves_pixels_clockwise() {
        let img = test_image(5, 3);
        for method in [RotateMethod::Sampling, RotateMethod::Bilinear] {
            let result = rotate_with_method(&img, 90.0, method);
            assert_eq!(result.dimensions(), (3, 5));
            for y in 0..3 {
                for x in 0..5 {
                    assert_eq!(
                        result.get_pixel(2 - y, x),
                        img.get_pixel(x, y),
                        "{method:?} at ({x}, {y})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_exposed_corners_use_background() {
        let cases = [
            (PixelDepth::Bit8, 0u32, 0xFFu32),
            (PixelDepth::Bit24, 0, 0x00FF_FFFF),
            (PixelDepth::Bit32, 0x0000_00FF, 0xFFFF_FFFF),
            (PixelDepth::Bit1, 1, 0),
        ];
        for (depth, ink, background) in cases {
            let img = filled(60, 40, depth, ink);
            let result = rotate(&img, 6.0);
            let (w, h) = result.dimensions();
            for (x, y) in [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)] {
                assert_eq!(result.get_pixel(x, y), background, "{depth:?} at ({x}, {y})");
            }
            assert_eq!(result.get_pixel(w / 2, h / 2), ink, "{depth:?} centre");
        }
    }

    #[test]
    fn test_palette_fill_uses_lightest_entry() {
        let palette = Colormap::new(vec![[0, 0, 0], [250, 250, 250], [90, 10, 10]]);
        let mut img = ImageHandle::new(30, 30, PixelDepth::Bit8, Resolution::UNKNOWN)
            .unwrap()
            .with_colormap(palette.clone())
            .unwrap();
        for y in 0..30 {
            for x in 0..30 {
                img.set_pixel(x, y, 2);
            }
        }
        let result = rotate(&img, 4.0);
        assert_eq!(result.colormap(), Some(&palette));
        assert_eq!(result.get_pixel(0, 0), 1);
        assert_eq!(result.get_pixel(result.width() / 2, result.height() / 2), 2);
    }

    #[test]
    fn test_binary_values_stay_binary() {
        let mut img = ImageHandle::new(41, 23, PixelDepth::Bit1, Resolution::UNKNOWN).unwrap();
        for x in 0..41 {
            img.set_pixel(x, 11, 1);
        }
        let result = rotate_with_method(&img, 2.5, RotateMethod::Bilinear);
        assert_eq!(result.depth(), PixelDepth::Bit1);
        let ink: u32 = (0..result.height())
            .flat_map(|y| (0..result.width()).map(move |x| (x, y)))
            .map(|(x, y)| result.get_pixel(x, y))
            .sum();
        assert!((35..=50).contains(&ink), "ink pixels: {ink}");
    }

    #[test]
    fn test_metadata_preserved() {
        let mut img = test_image(50, 50).with_input_format(ImageFormat::Tiff);
        img.set_text(Some("page 7".to_string()));
        let result = rotate(&img, 2.0);
        assert_eq!(result.resolution(), Resolution::uniform(300));
        assert_eq!(result.input_format(), Some(ImageFormat::Tiff));
        assert_eq!(result.text(), Some("page 7"));
    }

    #[test]
    fn test_small_image_rotation() {
        for (w, h) in [(1, 1), (4, 4), (100, 1), (1, 100)] {
            let img = test_image(w, h);
            let result = rotate(&img, 30.0);
            assert!(result.width() > 0 && result.height() > 0);
        }
    }

    #[test]
    fn test_rotate_back_restores_centre() {
        let img = test_image(80, 60);
        let there = rotate(&img, 3.0);
        let back = rotate(&there, -3.0);
        let (cx, cy) = (back.width() / 2, back.height() / 2);
        let original = img.get_pixel(40, 30) as i32;
        let restored = back.get_pixel(cx, cy) as i32;
        assert!((original - restored).abs() <= 16, "{original} vs {restored}");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

//! Deskew Core - skew detection and correction for scanned pages
//!
//! This crate provides the preprocessing step an OCR pipeline runs before
//! recognition: measure how far the text lines of a scanned page are rotated
//! away from the pixel rows, and rotate the page back.
//!
//! # Module Structure
//!
//! - `image` - The owned [`ImageHandle`] raster type, conversions and scaling
//! - `codec` - Reading TIFF/PNM/PNG/JPEG files and writing by file extension
//! - `skew` - Differential-square-sum skew estimation
//! - `transform` - Rotation with canvas expansion and background fill
//! - `deskew` - The [`Deskewer`] driver sequencing read, estimate, rotate, write
//!
//! # Coordinate System
//!
//! - Angles are in degrees, positive = counter-clockwise skew of the content
//! - Origin is the top-left corner, y grows downwards

pub mod codec;
pub mod deskew;
pub mod error;
pub mod image;
pub mod skew;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_support;

pub use codec::{read, write, DecodeError, EncodeError, ImageFormat, WriteOptions};
pub use deskew::{
    probe_capabilities, reduction_for_dpi, DeskewConfig, DeskewReport, Deskewed, Deskewer,
    LOW_RESOLUTION_DPI,
};
pub use error::{DeskewError, EXIT_DEPENDENCY, EXIT_INPUT, EXIT_OUTPUT};
pub use image::{scale, Colormap, ImageError, ImageHandle, PixelDepth, Resolution};
pub use skew::{SkewEstimate, SkewEstimator, SkewOptions};
pub use transform::{compute_rotated_bounds, rotate, rotate_with_method, RotateMethod};

//! Owned raster images.
//!
//! This module provides:
//! - [`ImageHandle`], the single-owner raster buffer every other module works on
//! - Depth-aware conversions (gray, binary, palette expansion, `image` crate bridge)
//! - Scaling for both enlargement and the estimator's downsampling
//!
//! # Buffer Layout
//!
//! Pixels are stored row-major. Every scanline is padded to a 32-bit word
//! boundary, so a row occupies `ceil(width * depth / 32) * 4` bytes. Padding
//! bytes are always zero.
//!
//! | Depth | Pixel encoding                                   |
//! |-------|--------------------------------------------------|
//! | 1     | packed MSB-first, bit set = foreground (black)   |
//! | 8     | gray value, or palette index with a colormap     |
//! | 24    | R, G, B                                          |
//! | 32    | R, G, B, A                                       |
//!
//! # Ownership
//!
//! A handle has exactly one owner. Transforms borrow their input and return a
//! new handle; the input stays untouched and owned by the caller.
//! [`ImageHandle::release`] consumes a handle, so a double release or a use
//! after release does not compile. Every other exit path releases the buffer
//! through `Drop`.

mod convert;
mod handle;
mod scale;

pub use convert::{luminance, BINARY_THRESHOLD};
pub(crate) use convert::{pack_channels, unpack_channels};
pub use handle::{bytes_per_line, Colormap, ImageError, ImageHandle, PixelDepth, Resolution};
pub use scale::{scale, scale_to_size};

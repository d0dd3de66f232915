//! Raster codec boundary.
//!
//! This module provides:
//! - Decoding TIFF, PNM (PBM/PGM/PPM), PNG and JPEG files into an [`ImageHandle`]
//! - Encoding an [`ImageHandle`] in the format implied by the output extension
//! - Resolution and description metadata from embedded EXIF/TIFF tags
//!
//! # Format Detection
//!
//! Input format is detected from the file's magic bytes; the extension of an
//! input file is ignored. Output format is chosen from the extension alone.
//!
//! # Atomic Writes
//!
//! Output is encoded into a temporary file next to the target and renamed
//! over it only once the encoder succeeded, so a failed write never leaves a
//! truncated file behind.
//!
//! [`ImageHandle`]: crate::image::ImageHandle

mod error;
mod format;
mod metadata;
mod read;
mod write;

pub use error::{DecodeError, EncodeError};
pub use format::ImageFormat;
pub use metadata::{read_metadata, EmbeddedMetadata};
pub use read::{decode_bytes, read};
pub use write::{write, WriteOptions, DEFAULT_JPEG_QUALITY};

//! Decoding files and in-memory buffers into image handles.

use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageReader};
use tracing::{debug, info, instrument};

use super::{read_metadata, DecodeError, ImageFormat};
use crate::image::ImageHandle;

/// Gray level splitting decoded bilevel sources back into 1 bpp.
const BILEVEL_THRESHOLD: u8 = 128;

/// Origin reported in errors for [`decode_bytes`] callers without a file.
pub(crate) const MEMORY_ORIGIN: &str = "<memory>";

/// Read and decode an image file.
///
/// The format is detected from the file content. Resolution and the
/// `ImageDescription` text are taken from embedded tags when present.
///
/// # Arguments
///
/// * `path` - File to read
///
/// # Errors
///
/// - `DecodeError::NotFound` if the file does not exist
/// - `DecodeError::Unreadable` for any other I/O failure
/// - `DecodeError::UnsupportedFormat` if the content is not TIFF/PNM/PNG/JPEG
/// - `DecodeError::Corrupt` if the content fails to decode
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read(path: &Path) -> Result<ImageHandle, DecodeError> {
    let bytes = std::fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => DecodeError::NotFound {
            path: path.to_path_buf(),
        },
        _ => DecodeError::Unreadable {
            path: path.to_path_buf(),
            source,
        },
    })?;
    debug!(bytes = bytes.len(), "Read input file");

    decode_bytes(&bytes, path)
}

/// Decode an image held in memory.
///
/// `origin` is only used to name the source in errors; pass any descriptive
/// path (e.g. `Path::new("<memory>")`).
///
/// # Errors
///
/// Same as [`read`], minus the I/O variants.
pub fn decode_bytes(bytes: &[u8], origin: &Path) -> Result<ImageHandle, DecodeError> {
    let format = ImageFormat::detect(bytes).ok_or_else(|| DecodeError::UnsupportedFormat {
        path: origin.to_path_buf(),
    })?;

    let decoder = ImageReader::with_format(Cursor::new(bytes), format.to_image_format())
        .into_decoder()
        .map_err(|e| decode_failure(origin, e))?;

    // PBM is decoded to 0/255 gray by the backend; fold it back to one bit
    let bilevel = decoder.original_color_type() == ExtendedColorType::L1
        || (format == ImageFormat::Pnm && (bytes.starts_with(b"P1") || bytes.starts_with(b"P4")));

    let dynamic = DynamicImage::from_decoder(decoder).map_err(|e| decode_failure(origin, e))?;

    let metadata = read_metadata(bytes, format);

    let mut handle =
        ImageHandle::from_dynamic(dynamic, metadata.resolution).map_err(|e| DecodeError::Corrupt {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
    if bilevel {
        handle = handle.binarize(BILEVEL_THRESHOLD);
    }
    handle.set_text(metadata.description);
    let handle = handle.with_input_format(format);

    info!(
        format = %format,
        width = handle.width(),
        height = handle.height(),
        depth = handle.depth().bits(),
        xres = handle.resolution().x,
        yres = handle.resolution().y,
        "Decoded image"
    );
    Ok(handle)
}

fn decode_failure(origin: &Path, err: image::ImageError) -> DecodeError {
    let path = PathBuf::from(origin);
    match err {
        image::ImageError::Unsupported(_) => DecodeError::UnsupportedFormat { path },
        other => DecodeError::Corrupt {
            path,
            message: other.to_string(),
        },
    }
}

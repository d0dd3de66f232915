//! Supported file formats.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// The four raster format families the codec reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    /// TIFF, the usual scanner output.
    Tiff,
    /// Netpbm: PBM (1 bpp), PGM (gray) or PPM (color).
    Pnm,
    /// PNG.
    Png,
    /// JPEG (baseline).
    Jpeg,
}

impl ImageFormat {
    /// Every supported format.
    pub const ALL: [ImageFormat; 4] = [
        ImageFormat::Tiff,
        ImageFormat::Pnm,
        ImageFormat::Png,
        ImageFormat::Jpeg,
    ];

    /// Short human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Tiff => "TIFF",
            ImageFormat::Pnm => "PNM",
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
        }
    }

    /// Map a file extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            "pnm" | "pbm" | "pgm" | "ppm" => Some(ImageFormat::Pnm),
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }

    /// The format implied by a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Detect the format from a file's leading magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        image::guess_format(bytes)
            .ok()
            .and_then(Self::from_image_format)
    }

    pub(crate) fn to_image_format(self) -> image::ImageFormat {
        match self {
            ImageFormat::Tiff => image::ImageFormat::Tiff,
            ImageFormat::Pnm => image::ImageFormat::Pnm,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }

    fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Tiff => Some(ImageFormat::Tiff),
            image::ImageFormat::Pnm => Some(ImageFormat::Pnm),
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//! Error types for reading and writing image files.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error types for image decoding operations.
///
/// Every variant names the file it concerns.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input file does not exist.
    #[error("Input file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The input file exists but could not be opened or read.
    #[error("Cannot read {}: {source}", path.display())]
    Unreadable { path: PathBuf, source: io::Error },

    /// The content is not one of the supported formats.
    #[error("Invalid or unsupported image format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// The content is truncated or corrupted.
    #[error("Corrupted or incomplete image file {}: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },
}

impl DecodeError {
    /// The file the error concerns.
    pub fn path(&self) -> &Path {
        match self {
            DecodeError::NotFound { path }
            | DecodeError::Unreadable { path, .. }
            | DecodeError::UnsupportedFormat { path }
            | DecodeError::Corrupt { path, .. } => path,
        }
    }

    /// True when the file itself could not be opened, as opposed to its
    /// content failing to decode.
    pub fn is_open_failure(&self) -> bool {
        matches!(self, DecodeError::NotFound { .. } | DecodeError::Unreadable { .. })
    }
}

/// Error types for image encoding operations.
///
/// Every variant names the file it concerns.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The output extension does not name a supported format.
    #[error("Unsupported output format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// Creating, writing or renaming the output file failed.
    #[error("Cannot write {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// The encoder rejected the image.
    #[error("Encoding {} failed: {message}", path.display())]
    Encoder { path: PathBuf, message: String },
}

impl EncodeError {
    /// The file the error concerns.
    pub fn path(&self) -> &Path {
        match self {
            EncodeError::UnsupportedFormat { path }
            | EncodeError::Io { path, .. }
            | EncodeError::Encoder { path, .. } => path,
        }
    }
}

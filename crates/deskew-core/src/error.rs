//! Top-level error type and process exit codes.

use thiserror::Error;

use crate::codec::{DecodeError, EncodeError};

/// Exit code when the input file cannot be opened or decoded.
pub const EXIT_INPUT: u8 = 2;

/// Exit code when a required codec capability is unavailable.
pub const EXIT_DEPENDENCY: u8 = 3;

/// Exit code when the output file cannot be written.
pub const EXIT_OUTPUT: u8 = 5;

/// Errors from the deskew driver.
#[derive(Debug, Error)]
pub enum DeskewError {
    /// The input file is missing or unreadable.
    #[error(transparent)]
    Input(DecodeError),

    /// The input file was read but its content could not be decoded.
    #[error(transparent)]
    Decode(DecodeError),

    /// The output could not be written.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The linked codec backend lacks a required format.
    #[error("Required image codec unavailable: {0}")]
    Dependency(String),
}

impl DeskewError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            DeskewError::Input(_) | DeskewError::Decode(_) => EXIT_INPUT,
            DeskewError::Encode(_) => EXIT_OUTPUT,
            DeskewError::Dependency(_) => EXIT_DEPENDENCY,
        }
    }
}

impl From<DecodeError> for DeskewError {
    fn from(err: DecodeError) -> Self {
        if err.is_open_failure() {
            DeskewError::Input(err)
        } else {
            DeskewError::Decode(err)
        }
    }
}

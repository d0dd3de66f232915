//! The deskew driver.
//!
//! [`Deskewer`] sequences read, estimate, rotate and write, applying the
//! resolution policy and the decision whether a measured skew is worth
//! correcting.
//!
//! # Resolution Policy
//!
//! Pages scanned below [`LOW_RESOLUTION_DPI`] are searched at full
//! resolution; anything finer uses the estimator's default reduction.
//! An unknown resolution counts as low.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::codec::{self, ImageFormat, WriteOptions};
use crate::error::DeskewError;
use crate::image::ImageHandle;
use crate::skew::{SkewEstimate, SkewEstimator, SkewOptions};
use crate::transform::rotate;

/// Scans below this many pixels per inch are searched at full resolution.
pub const LOW_RESOLUTION_DPI: u32 = 150;

/// Smallest skew, in degrees, that is worth a rotation.
pub const DEFAULT_MIN_DESKEW_ANGLE: f64 = 0.1;

/// Search reduction for a scan resolution: 1 (full resolution) below
/// [`LOW_RESOLUTION_DPI`], otherwise 0 (estimator default).
pub fn reduction_for_dpi(dpi: u32) -> u32 {
    if dpi < LOW_RESOLUTION_DPI {
        1
    } else {
        0
    }
}

/// Check that the codec backend can read and write every supported format.
///
/// # Errors
///
/// Returns `DeskewError::Dependency` naming every missing capability.
pub fn probe_capabilities() -> Result<(), DeskewError> {
    let missing: Vec<String> = ImageFormat::ALL
        .iter()
        .flat_map(|format| {
            let backend = format.to_image_format();
            let mut gaps = Vec::new();
            if !backend.reading_enabled() {
                gaps.push(format!("{format} reader"));
            }
            if !backend.writing_enabled() {
                gaps.push(format!("{format} writer"));
            }
            gaps
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DeskewError::Dependency(missing.join(", ")))
    }
}

/// Driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskewConfig {
    /// Estimator tunables.
    pub skew: SkewOptions,
    /// Encoder options for the output file.
    pub write: WriteOptions,
    /// Confident estimates smaller than this (degrees) are left uncorrected.
    pub min_deskew_angle: f64,
}

impl Default for DeskewConfig {
    fn default() -> Self {
        Self {
            skew: SkewOptions::default(),
            write: WriteOptions::default(),
            min_deskew_angle: DEFAULT_MIN_DESKEW_ANGLE,
        }
    }
}

/// A deskewed page.
#[derive(Debug, Clone, PartialEq)]
pub struct Deskewed {
    /// The corrected page, or a copy of the input when no rotation was
    /// warranted.
    pub image: ImageHandle,
    /// The measurement the decision was based on.
    pub estimate: SkewEstimate,
    /// Whether a rotation was applied.
    pub rotated: bool,
}

/// Summary of one file processed by [`Deskewer::deskew_file`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeskewReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Resolution the policy was applied to; 0 when unknown.
    pub dpi: u32,
    /// Reduction requested from the estimator.
    pub reduction: u32,
    pub estimate: SkewEstimate,
    pub rotated: bool,
    /// Output dimensions.
    pub width: u32,
    pub height: u32,
}

/// Skew detection and correction with a fixed configuration.
///
/// A `Deskewer` is immutable after construction and can be shared by
/// reference across threads; every call works on its own images.
#[derive(Debug, Clone)]
pub struct Deskewer {
    config: DeskewConfig,
    estimator: SkewEstimator,
}

impl Deskewer {
    /// Create a driver after checking the codec backend.
    ///
    /// # Errors
    ///
    /// Returns `DeskewError::Dependency` if a supported format cannot be
    /// read or written by the linked backend.
    pub fn new(config: DeskewConfig) -> Result<Self, DeskewError> {
        probe_capabilities()?;
        Ok(Self {
            config,
            estimator: SkewEstimator::new(config.skew),
        })
    }

    pub fn config(&self) -> &DeskewConfig {
        &self.config
    }

    /// Measure the skew of `image` without correcting it.
    pub fn estimate(&self, image: &ImageHandle, reduction: u32) -> SkewEstimate {
        self.estimator.estimate(image, reduction)
    }

    /// Measure and, when warranted, correct the skew of `image`.
    ///
    /// A rotation is applied only for estimates at least as confident as
    /// `min_confidence` and at least `min_deskew_angle` degrees off. The
    /// returned image is always a new handle; `image` is not modified.
    pub fn deskew(&self, image: &ImageHandle, reduction: u32) -> Deskewed {
        let estimate = self.estimate(image, reduction);
        let warranted = estimate.is_confident(self.config.skew.min_confidence)
            && estimate.angle.abs() >= self.config.min_deskew_angle;

        if !warranted {
            debug!(
                angle = estimate.angle,
                confidence = estimate.confidence,
                "No correction needed"
            );
            return Deskewed {
                image: image.clone(),
                estimate,
                rotated: false,
            };
        }

        info!(
            angle = estimate.angle,
            confidence = estimate.confidence,
            "Correcting skew"
        );
        Deskewed {
            image: rotate(image, estimate.angle),
            estimate,
            rotated: true,
        }
    }

    /// Deskew `infile` into `outfile`.
    ///
    /// The resolution policy uses `dpi` when given, otherwise the lower of
    /// the decoded image's two resolutions.
    ///
    /// # Errors
    ///
    /// - `DeskewError::Input` if `infile` cannot be opened
    /// - `DeskewError::Decode` if its content cannot be decoded
    /// - `DeskewError::Encode` if `outfile` cannot be written
    #[instrument(skip_all, fields(input = %infile.display(), output = %outfile.display()))]
    pub fn deskew_file(
        &self,
        infile: &Path,
        outfile: &Path,
        dpi: Option<u32>,
    ) -> Result<DeskewReport, DeskewError> {
        let image = codec::read(infile)?;
        let dpi = effective_dpi(&image, dpi);
        let reduction = reduction_for_dpi(dpi);
        debug!(dpi, reduction, "Resolution policy applied");

        let deskewed = self.deskew(&image, reduction);
        image.release();

        codec::write(outfile, &deskewed.image, &self.config.write)?;

        let report = DeskewReport {
            input: infile.to_path_buf(),
            output: outfile.to_path_buf(),
            dpi,
            reduction,
            estimate: deskewed.estimate,
            rotated: deskewed.rotated,
            width: deskewed.image.width(),
            height: deskewed.image.height(),
        };
        deskewed.image.release();

        info!(
            angle = report.estimate.angle,
            confidence = report.estimate.confidence,
            rotated = report.rotated,
            "Deskewed file"
        );
        Ok(report)
    }

    /// Measure the skew of a file without writing anything.
    ///
    /// # Errors
    ///
    /// - `DeskewError::Input` if `path` cannot be opened
    /// - `DeskewError::Decode` if its content cannot be decoded
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn find_skew_file(&self, path: &Path, dpi: Option<u32>) -> Result<SkewEstimate, DeskewError> {
        let image = codec::read(path)?;
        let reduction = reduction_for_dpi(effective_dpi(&image, dpi));
        let estimate = self.estimate(&image, reduction);
        image.release();
        Ok(estimate)
    }
}

fn effective_dpi(image: &ImageHandle, explicit: Option<u32>) -> u32 {
    explicit
        .or_else(|| image.resolution().min_dpi())
        .unwrap_or(0)
}

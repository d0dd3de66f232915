//! Sweep-and-search over candidate angles.

use tracing::{debug, instrument, warn};

use super::options::{SkewEstimate, SkewOptions, MIN_MASK_SIZE, MIN_VALID_MAX_SCORE};
use super::profile::ForegroundMask;
use crate::image::ImageHandle;

/// Estimates the skew of scanned pages.
///
/// The estimator holds only its immutable options, so one instance can be
/// shared between threads.
#[derive(Debug, Clone, Default)]
pub struct SkewEstimator {
    options: SkewOptions,
}

/// Outcome of the coarse sweep.
#[derive(Debug, Clone, Copy)]
struct Sweep {
    angle: f64,
    max_score: f64,
    min_score: f64,
}

impl SkewEstimator {
    pub fn new(options: SkewOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SkewOptions {
        &self.options
    }

    /// Measure the skew of `image`.
    ///
    /// # Arguments
    ///
    /// * `image` - The page; never modified
    /// * `reduction` - Reduction for the binary search (1, 2, 4 or 8), or 0
    ///   for the configured default
    ///
    /// # Returns
    ///
    /// The estimate. Images too small to search, pages without foreground
    /// and estimates below `min_confidence` all report an angle of 0; this
    /// never fails.
    #[instrument(skip_all, fields(width = image.width(), height = image.height(), reduction = reduction))]
    pub fn estimate(&self, image: &ImageHandle, reduction: u32) -> SkewEstimate {
        let options = &self.options;
        let (width, height) = image.dimensions();
        if width < MIN_MASK_SIZE || height < MIN_MASK_SIZE {
            debug!("Image too small to estimate skew");
            return SkewEstimate::default();
        }

        let (sweep_reduction, search_reduction) = options.reductions(reduction);
        let sweep_reduction = fit_reduction(width, height, sweep_reduction);
        let search_reduction = fit_reduction(width, height, search_reduction);

        let sweep_mask = match ForegroundMask::from_image(image, sweep_reduction, options.binary_threshold) {
            Ok(mask) => mask,
            Err(err) => {
                warn!(error = %err, "Could not prepare image for skew estimation");
                return SkewEstimate::default();
            }
        };
        if sweep_mask.foreground_count() == 0 {
            debug!("No foreground pixels");
            return SkewEstimate::default();
        }

        let sweep = self.sweep(&sweep_mask);
        let confidence = if sweep.max_score < MIN_VALID_MAX_SCORE {
            0.0
        } else {
            sweep.max_score / sweep.min_score.max(1.0)
        };
        debug!(
            sweep_reduction,
            angle = sweep.angle,
            max_score = sweep.max_score,
            min_score = sweep.min_score,
            confidence,
            "Sweep finished"
        );

        if confidence < options.min_confidence {
            debug!(confidence, "Confidence too low, reporting no skew");
            return SkewEstimate {
                angle: 0.0,
                confidence,
                reduction: 0,
            };
        }

        let angle = if search_reduction == sweep_reduction {
            self.binary_search(&sweep_mask, sweep.angle)
        } else {
            match ForegroundMask::from_image(image, search_reduction, options.binary_threshold) {
                Ok(mask) => self.binary_search(&mask, sweep.angle),
                Err(err) => {
                    warn!(error = %err, "Could not prepare image for the fine search");
                    sweep.angle
                }
            }
        };

        let estimate = SkewEstimate {
            angle,
            confidence,
            reduction: if search_reduction > 1 { search_reduction } else { 0 },
        };
        debug!(angle, confidence, search_reduction, "Skew estimated");
        estimate
    }

    fn range(&self) -> f64 {
        self.options.sweep_range.abs()
    }

    fn sweep_delta(&self) -> f64 {
        let delta = self.options.sweep_delta.abs();
        if delta > 0.0 {
            delta
        } else {
            self.range().max(1.0)
        }
    }

    /// Score every step of the sweep range. Ties go to the angle nearer 0.
    fn sweep(&self, mask: &ForegroundMask) -> Sweep {
        let range = self.range();
        let delta = self.sweep_delta();
        let margin = mask.margin_for(range);
        let steps = (range / delta).round() as i64;

        // Visit candidates by increasing magnitude so a strict comparison
        // keeps the smallest angle among equal scores.
        let candidates = std::iter::once(0.0).chain((1..=steps).flat_map(|k| {
            let angle = (k as f64 * delta).min(range);
            [-angle, angle]
        }));

        let mut sweep = Sweep {
            angle: 0.0,
            max_score: f64::NEG_INFINITY,
            min_score: f64::INFINITY,
        };
        for angle in candidates {
            let score = mask.differential_square_sum(angle, margin);
            if score > sweep.max_score {
                sweep.max_score = score;
                sweep.angle = angle;
            }
            sweep.min_score = sweep.min_score.min(score);
        }
        sweep
    }

    /// Refine `start` by repeatedly trying `centre ± step` and halving the
    /// step. The centre wins ties.
    fn binary_search(&self, mask: &ForegroundMask, start: f64) -> f64 {
        let range = self.range();
        let margin = mask.margin_for(range);
        let min_delta = self.options.min_search_delta.abs().max(f64::EPSILON);

        let mut centre = start;
        let mut centre_score = mask.differential_square_sum(centre, margin);
        let mut step = self.sweep_delta() / 2.0;

        while step >= min_delta {
            let mut best = (centre, centre_score);
            for candidate in [centre - step, centre + step] {
                if candidate.abs() > range {
                    continue;
                }
                let score = mask.differential_square_sum(candidate, margin);
                let better = score > best.1
                    || (score == best.1 && best.0 != centre && candidate.abs() < best.0.abs());
                if better {
                    best = (candidate, score);
                }
            }
            (centre, centre_score) = best;
            step /= 2.0;
        }

        centre.clamp(-range, range)
    }
}

/// Lower `reduction` until the reduced image is at least
/// [`MIN_MASK_SIZE`] on both sides.
fn fit_reduction(width: u32, height: u32, mut reduction: u32) -> u32 {
    while reduction > 1 && (width / reduction < MIN_MASK_SIZE || height / reduction < MIN_MASK_SIZE) {
        reduction /= 2;
    }
    reduction
}


// ============================================================================
// Property-Based Tests
// ============================================================================

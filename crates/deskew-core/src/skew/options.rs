//! Estimator tunables and result type.

use serde::{Deserialize, Serialize};

/// Sweeps whose best score is below this carry no usable signal.
pub const MIN_VALID_MAX_SCORE: f64 = 10_000.0;

/// Smallest reduced mask (per side) worth searching.
pub const MIN_MASK_SIZE: u32 = 16;

/// Largest supported reduction factor.
const MAX_REDUCTION: u32 = 8;

/// Tunables for [`SkewEstimator`](super::SkewEstimator).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkewOptions {
    /// Half-width of the swept angle range, in degrees.
    pub sweep_range: f64,
    /// Step between swept angles, in degrees.
    pub sweep_delta: f64,
    /// The binary search stops once its step falls below this, in degrees.
    pub min_search_delta: f64,
    /// Reduction factor for the sweep (1, 2, 4 or 8).
    pub sweep_reduction: u32,
    /// Reduction factor for the binary search when the caller passes 0.
    pub search_reduction: u32,
    /// Estimates below this confidence report an angle of 0.
    pub min_confidence: f64,
    /// Gray values below this are foreground.
    pub binary_threshold: u8,
}

impl Default for SkewOptions {
    fn default() -> Self {
        Self {
            sweep_range: 7.0,
            sweep_delta: 1.0,
            min_search_delta: 0.01,
            sweep_reduction: 4,
            search_reduction: 2,
            min_confidence: 3.0,
            binary_threshold: crate::image::BINARY_THRESHOLD,
        }
    }
}

impl SkewOptions {
    /// Resolve the `(sweep, search)` reduction pair for a requested search
    /// reduction, where 0 selects the configured default.
    ///
    /// Factors are rounded down to a power of two and capped at 8. The sweep
    /// never runs at a finer reduction than the search.
    pub(crate) fn reductions(&self, requested: u32) -> (u32, u32) {
        let search = match requested {
            0 => normalize_reduction(self.search_reduction),
            r => normalize_reduction(r),
        };
        let sweep = normalize_reduction(self.sweep_reduction).max(search);
        (sweep, search)
    }
}

fn normalize_reduction(factor: u32) -> u32 {
    match factor {
        0 => 1,
        f => (1u32 << (31 - f.leading_zeros())).min(MAX_REDUCTION),
    }
}

/// Result of one estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SkewEstimate {
    /// Skew in degrees, positive = counter-clockwise. Zero when the
    /// confidence is too low to trust.
    pub angle: f64,
    /// Best sweep score over the worst; 0 when there was no usable signal.
    pub confidence: f64,
    /// Reduction factor the binary search ran at, or 0 for full resolution
    /// (or when no search ran).
    pub reduction: u32,
}

impl SkewEstimate {
    /// True when the estimate is trustworthy at the given threshold.
    pub fn is_confident(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

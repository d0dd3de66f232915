//! Skew estimation by differential square sums.
//!
//! A page of text has dark horizontal bands (lines) separated by light gaps.
//! Projecting the foreground onto rows gives a profile whose row-to-row
//! differences are largest when the projection direction matches the text
//! direction. The estimator searches for the angle that maximises the sum of
//! squared differences.
//!
//! # Search Strategy
//!
//! 1. **Sweep**: score every `sweep_delta` step in `[-sweep_range, sweep_range]`
//!    on a strongly reduced mask
//! 2. **Binary search**: refine around the sweep winner at a finer reduction,
//!    halving the step until it drops below `min_search_delta`
//!
//! The ratio between the best and the worst sweep score is the confidence.
//! Low-confidence and degenerate inputs produce an angle of 0 rather than an
//! error.

mod options;
mod profile;
mod search;

pub use options::{SkewEstimate, SkewOptions, MIN_MASK_SIZE, MIN_VALID_MAX_SCORE};
pub use search::SkewEstimator;

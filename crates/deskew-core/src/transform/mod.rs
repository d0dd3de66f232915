//! Corrective rotation.
//!
//! This module rotates a page back by a measured skew angle. Rotation never
//! modifies its input: it returns a new, independently owned image on an
//! expanded canvas so no content is clipped.
//!
//! # Coordinate System
//!
//! - `rotate(image, angle)` turns the content clockwise by `angle` degrees,
//!   which undoes a counter-clockwise skew of `angle`
//! - Rotation is about the image centre, using pixel-centre coordinates
//! - Origin is top-left corner

mod rotation;

pub use rotation::{compute_rotated_bounds, rotate, rotate_with_method, RotateMethod};

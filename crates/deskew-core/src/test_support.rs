//! Synthetic pages for tests.

use crate::image::{ImageHandle, PixelDepth, Resolution};
use crate::transform::rotate;

const MARGIN: u32 = 40;
const LINE_HEIGHT: u32 = 8;
const LINE_PITCH: u32 = 24;

/// An 8 bpp white page with rows of black "words", like a page of text.
///
/// Word and gap lengths come from a fixed LCG, so pages are reproducible.
pub(crate) fn text_page(width: u32, height: u32) -> ImageHandle {
    let mut page = ImageHandle::new(width, height, PixelDepth::Bit8, Resolution::uniform(300))
        .expect("non-zero page size");

    let mut state: u32 = 12345;
    let mut next = |modulus: u32| {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        (state >> 16) % modulus
    };

    let right = width.saturating_sub(MARGIN);
    let mut top = MARGIN;
    while top + LINE_HEIGHT + MARGIN <= height {
        let mut x = MARGIN;
        while x < right {
            let word = 20 + next(41);
            let end = (x + word).min(right);
            for y in top..top + LINE_HEIGHT {
                for px in x..end {
                    page.set_pixel(px, y, 0);
                }
            }
            x = end + 10 + next(7);
        }
        top += LINE_PITCH;
    }
    page
}

/// [`text_page`] rotated with [`rotate`], so its content is skewed by `-angle`.
pub(crate) fn skewed_page(width: u32, height: u32, angle: f64) -> ImageHandle {
    rotate(&text_page(width, height), angle)
}

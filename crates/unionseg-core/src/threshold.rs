//! Grey-level thresholding: a per-pixel black/white map.
//!
//! Not part of segmentation itself, but it shares the grey-level metric
//! and is a common preprocessing step before the exact predicate.

use crate::color::{grey, grey_level};
use crate::raster::RgbRaster;
use crate::types::SegmentError;

/// Map every pixel to black if its grey level is below `level`, white
/// otherwise.
///
/// `level == 0` turns everything white; `level == 255` leaves only pure
/// white pixels white.
///
/// # Errors
///
/// Returns [`SegmentError::Allocation`] if the output raster cannot be
/// allocated.
pub fn threshold(input: &RgbRaster, level: u8) -> Result<RgbRaster, SegmentError> {
    let mut output = RgbRaster::new(input.width(), input.height())?;
    for (i, pixel) in input.pixels().enumerate() {
        let value = if grey_level(pixel) < level { 0 } else { 255 };
        output.put(i, grey(value));
    }
    Ok(output)
}

//! Synthetic test images.

use crate::color::grey;
use crate::raster::RgbRaster;
use crate::types::SegmentError;

/// Radial grey gradient centred on the image.
///
/// Inside `radius` a pixel at distance `d` from the center gets grey
/// level `255 - floor(d)`; outside it is black. The center is
/// `(width / 2, height / 2)` in integer pixels.
///
/// Useful as a default input: it has many concentric one-level rings, so
/// the exact predicate produces ring-shaped regions.
///
/// # Errors
///
/// Returns [`SegmentError::Allocation`] or [`SegmentError::DimensionOverflow`]
/// if the raster cannot be created.
pub fn disk(width: u32, height: u32, radius: u32) -> Result<RgbRaster, SegmentError> {
    let mut raster = RgbRaster::new(width, height)?;
    let (cx, cy) = (i64::from(width / 2), i64::from(height / 2));
    let r2 = i64::from(radius) * i64::from(radius);

    for y in 0..height {
        for x in 0..width {
            let dx = i64::from(x) - cx;
            let dy = i64::from(y) - cy;
            let d2 = dx * dx + dy * dy;
            let level = if d2 >= r2 {
                0
            } else {
                #[allow(
                    clippy::cast_precision_loss,
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss
                )]
                let distance = (d2 as f64).sqrt() as i64;
                u8::try_from((255 - distance).max(0)).unwrap_or(0)
            };
            raster.set_pixel(x, y, grey(level));
        }
    }

    Ok(raster)
}

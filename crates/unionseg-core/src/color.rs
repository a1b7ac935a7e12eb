//! Color metrics: grey level, HSV transform, and perceptual distance.
//!
//! The distance weights (1 per hue degree, 5 per unit of saturation,
//! 10 per unit of value) are empirical. Changing them changes which
//! neighbors merge under a given tolerance.

use image::Rgb;

/// Weight applied to the absolute saturation difference.
pub const SATURATION_WEIGHT: f64 = 5.0;

/// Weight applied to the absolute value difference.
pub const VALUE_WEIGHT: f64 = 10.0;

/// A color in hue/saturation/value form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    /// Hue in whole degrees, `0..360`.
    pub hue: u16,
    /// Saturation in `[0, 1]`.
    pub saturation: f64,
    /// Value (brightest channel) in `[0, 255]`.
    pub value: f64,
}

/// Unweighted mean of the three channels, rounded down.
#[must_use]
pub fn grey_level(pixel: Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    let sum = u16::from(r) + u16::from(g) + u16::from(b);
    // sum / 3 <= 255
    u8::try_from(sum / 3).unwrap_or(u8::MAX)
}

/// A pixel with all three channels set to `level`.
#[must_use]
pub const fn grey(level: u8) -> Rgb<u8> {
    Rgb([level, level, level])
}

/// Convert an RGB pixel to HSV.
///
/// Hue follows the brightest channel (red, then green, then blue on
/// ties), is truncated toward zero to whole degrees, and wrapped into
/// `0..360`. Achromatic pixels get hue 0.
#[must_use]
pub fn to_hsv(pixel: Rgb<u8>) -> Hsv {
    let [r, g, b] = pixel.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);

    let (rf, gf, bf) = (f64::from(r), f64::from(g), f64::from(b));
    let delta = f64::from(max) - f64::from(min);

    let hue = if max == min {
        0
    } else {
        let raw = if max == r {
            60.0 * ((gf - bf) / delta)
        } else if max == g {
            60.0 * ((bf - rf) / delta + 2.0)
        } else {
            60.0 * ((rf - gf) / delta + 4.0)
        };
        // |raw| <= 300, so the cast cannot overflow.
        #[allow(clippy::cast_possible_truncation)]
        let mut degrees = raw as i32;
        if degrees < 0 {
            degrees += 360;
        }
        u16::try_from(degrees % 360).unwrap_or(0)
    };

    let saturation = if max == 0 {
        0.0
    } else {
        1.0 - f64::from(min) / f64::from(max)
    };

    Hsv {
        hue,
        saturation,
        value: f64::from(max),
    }
}

/// Signed hue difference wrapped into `[-180, 180]`.
#[must_use]
pub fn hue_difference(a: u16, b: u16) -> i32 {
    let mut diff = i32::from(a) - i32::from(b);
    while diff > 180 {
        diff -= 360;
    }
    while diff < -180 {
        diff += 360;
    }
    diff
}

/// Perceptual distance between two pixels.
///
/// `|hue difference| + 5 * |saturation difference| + 10 * |value difference|`,
/// with hue in degrees, saturation in `[0, 1]` and value in `[0, 255]`.
/// Zero for identical colors; symmetric.
#[must_use]
pub fn hsv_distance(a: Rgb<u8>, b: Rgb<u8>) -> f64 {
    let ha = to_hsv(a);
    let hb = to_hsv(b);

    let hue = f64::from(hue_difference(ha.hue, hb.hue).abs());
    let saturation = (ha.saturation - hb.saturation).abs();
    let value = (ha.value - hb.value).abs();

    SATURATION_WEIGHT.mul_add(saturation, VALUE_WEIGHT.mul_add(value, hue))
}

/// Whether all three channels are equal.
#[must_use]
pub const fn is_achromatic(pixel: Rgb<u8>) -> bool {
    let [r, g, b] = pixel.0;
    r == g && g == b
}

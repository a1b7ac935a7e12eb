//! Shared types for the unionseg segmentation engine.

use serde::{Deserialize, Serialize};

use crate::forest::ForestKind;
use crate::predicate::PredicateKind;

/// Re-export `RgbImage` so downstream crates can hand decoded images to
/// the engine without depending on `image` directly.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of pixels, or `None` if it does not fit in `usize`.
    #[must_use]
    pub fn pixel_count(self) -> Option<usize> {
        let w = usize::try_from(self.width).ok()?;
        let h = usize::try_from(self.height).ok()?;
        w.checked_mul(h)
    }
}

/// How each region is recolored once the forest is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegionColoring {
    /// Every pixel takes the truncated mean color of its region.
    #[default]
    Average,

    /// Every region gets a uniformly random color.
    ///
    /// With `seed: None` the thread-local generator is used and the
    /// colors differ between runs; the partition itself never does.
    Random {
        /// Seed for a reproducible palette.
        seed: Option<u64>,
    },
}

/// Configuration for a segmentation run.
///
/// # Tolerance invariant
///
/// When `predicate` is [`PredicateKind::Hsv`], the tolerance must be
/// finite and non-negative. [`validate`](Self::validate) enforces this
/// and every entry point calls it before touching the image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Which adjacency test decides whether two neighbors share a region.
    pub predicate: PredicateKind,

    /// How regions are recolored.
    pub coloring: RegionColoring,

    /// Which union-find implementation backs the merge.
    pub forest: ForestKind,
}

impl SegmentConfig {
    /// Default tolerance for the HSV predicate.
    pub const DEFAULT_TOLERANCE: f64 = 20.0;
    /// Default threshold level for the grey-level filter.
    pub const DEFAULT_THRESHOLD: u8 = 128;

    /// Check the configuration for values the engine cannot use.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidTolerance`] if the HSV tolerance is
    /// negative, NaN, or infinite.
    pub fn validate(&self) -> Result<(), SegmentError> {
        match self.predicate {
            PredicateKind::ExactGrey => Ok(()),
            PredicateKind::Hsv { tolerance } => validate_tolerance(tolerance),
        }
    }
}

/// Reject tolerances the fuzzy predicate cannot compare against.
pub(crate) fn validate_tolerance(tolerance: f64) -> Result<(), SegmentError> {
    if tolerance.is_finite() && tolerance >= 0.0 {
        Ok(())
    } else {
        Err(SegmentError::InvalidTolerance(tolerance))
    }
}

/// Errors that can occur while loading or segmenting an image.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The decoded image is not 8-bit RGB without alpha.
    #[error(
        "unsupported pixel format: {channels} channels, {bits_per_sample} bits per sample, alpha={has_alpha} (expected 3 channels, 8 bits, no alpha)"
    )]
    UnsupportedFormat {
        /// Number of channels in the decoded image.
        channels: u8,
        /// Bits per channel sample.
        bits_per_sample: u16,
        /// Whether the image carries an alpha channel.
        has_alpha: bool,
    },

    /// A row stride cannot hold one row of pixels.
    #[error("row stride {stride} is smaller than the {required} bytes needed for width {width}")]
    StrideTooSmall {
        /// Requested stride in bytes.
        stride: usize,
        /// Minimum stride (`width * 3`).
        required: usize,
        /// Raster width in pixels.
        width: u32,
    },

    /// The pixel buffer is shorter than the layout requires.
    #[error("pixel buffer holds {actual} bytes but the layout needs {required}")]
    BufferTooSmall {
        /// Bytes required by width, height, and stride.
        required: usize,
        /// Bytes actually supplied.
        actual: usize,
    },

    /// Width times height (or the byte size) overflows `usize`.
    #[error("raster dimensions {width}x{height} overflow addressable memory")]
    DimensionOverflow {
        /// Raster width in pixels.
        width: u32,
        /// Raster height in pixels.
        height: u32,
    },

    /// Source and output rasters differ in size.
    #[error(
        "output raster is {}x{} but the source is {}x{}",
        output.width,
        output.height,
        input.width,
        input.height
    )]
    DimensionMismatch {
        /// Dimensions of the source raster.
        input: Dimensions,
        /// Dimensions of the output raster.
        output: Dimensions,
    },

    /// The HSV tolerance is negative or not a finite number.
    #[error("tolerance must be a finite non-negative number, got {0}")]
    InvalidTolerance(f64),

    /// A working buffer could not be allocated.
    #[error("failed to allocate {what} for {count} elements")]
    Allocation {
        /// Which buffer failed.
        what: &'static str,
        /// Number of elements requested.
        count: usize,
    },
}

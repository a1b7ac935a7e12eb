//! unionseg-core: union-find color segmentation (sans-IO).
//!
//! Partitions an RGB image into regions of 4-connected, similar-colored
//! pixels and recolors every region uniformly:
//! build forest -> merge similar neighbors -> aggregate mean color ->
//! propagate to members (or give each region a random color).
//!
//! Similarity is pluggable ([`Predicate`]): exact equality of grey level,
//! or an HSV distance within a tolerance. The disjoint-set forest is
//! pluggable too ([`DisjointSet`]), so the union-by-rank forest with path
//! compression can be compared against a naive baseline.
//!
//! This crate has **no I/O dependencies**. It decodes from and operates
//! on in-memory buffers; reading files and writing results lives in
//! `unionseg-cli`.

pub mod color;
pub mod diagnostics;
pub mod forest;
pub mod pattern;
pub mod predicate;
pub mod raster;
pub mod segment;
pub mod threshold;
pub mod types;

pub use diagnostics::{Clock, SegmentDiagnostics, segment_with_diagnostics};
pub use forest::{BaselineForest, DisjointSet, Forest, ForestKind};
pub use pattern::disk;
pub use predicate::{Predicate, PredicateKind};
pub use raster::{FormatPolicy, RgbRaster, decode_rgb};
pub use segment::{
    Segmentation, segment, segment_exact, segment_fuzzy, segment_into, segment_random_with,
};
pub use threshold::threshold;
pub use types::{Dimensions, RegionColoring, SegmentConfig, SegmentError};

/// Decode `image_bytes` and segment them in one call.
///
/// # Errors
///
/// Returns [`SegmentError::EmptyInput`] if `image_bytes` is empty,
/// [`SegmentError::ImageDecode`] if the format is unrecognized,
/// [`SegmentError::UnsupportedFormat`] if the pixels are not 8-bit RGB and
/// `policy` is [`FormatPolicy::Strict`], and any error [`segment()`]
/// returns.
pub fn process(
    image_bytes: &[u8],
    policy: FormatPolicy,
    config: &SegmentConfig,
) -> Result<Segmentation, SegmentError> {
    let input = decode_rgb(image_bytes, policy)?;
    segment(&input, config)
}

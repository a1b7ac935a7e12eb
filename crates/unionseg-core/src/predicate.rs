//! Similarity predicates: decide whether two neighboring pixels belong to
//! the same region.
//!
//! This module defines the [`Predicate`] trait for pluggable adjacency
//! tests and the [`PredicateKind`] enum for selecting one at runtime.
//!
//! # Strategy pattern
//!
//! The segmentation driver only asks "do these two neighbors match?".
//! The hard grey-level test and the fuzzy HSV test answer it differently,
//! and new tests can be added here without touching the driver.

use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::color::{grey_level, hsv_distance};

/// Selects which similarity test the merge pass uses.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PredicateKind {
    /// Neighbors match when their grey levels are exactly equal.
    #[default]
    ExactGrey,

    /// Neighbors match when their HSV distance is at most `tolerance`.
    Hsv {
        /// Largest distance still considered the same region.
        tolerance: f64,
    },
}

impl PredicateKind {
    /// Short human-readable name, used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ExactGrey => "exact-grey",
            Self::Hsv { .. } => "hsv",
        }
    }
}

/// Trait for similarity tests between two adjacent pixels.
///
/// Implementations must be symmetric: `matches(a, b) == matches(b, a)`.
pub trait Predicate {
    /// Whether `a` and `b` belong in the same region.
    fn matches(&self, a: Rgb<u8>, b: Rgb<u8>) -> bool;
}

impl Predicate for PredicateKind {
    fn matches(&self, a: Rgb<u8>, b: Rgb<u8>) -> bool {
        match *self {
            Self::ExactGrey => grey_level(a) == grey_level(b),
            Self::Hsv { tolerance } => hsv_distance(a, b) <= tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::grey;

    #[test]
    fn default_is_exact_grey() {
        assert_eq!(PredicateKind::default(), PredicateKind::ExactGrey);
    }

    #[test]
    fn exact_grey_compares_means_not_channels() {
        let exact = PredicateKind::ExactGrey;
        // Different colors, same mean (30).
        assert!(exact.matches(Rgb([90, 0, 0]), Rgb([0, 0, 90])));
        assert!(exact.matches(grey(10), grey(10)));
        assert!(!exact.matches(grey(10), grey(11)));
    }

    #[test]
    fn exact_grey_absorbs_truncation() {
        // 30/3 = 10 and 32/3 = 10.
        assert!(PredicateKind::ExactGrey.matches(Rgb([10, 10, 10]), Rgb([10, 11, 11])));
    }

    #[test]
    fn hsv_zero_tolerance_needs_zero_distance() {
        let fuzzy = PredicateKind::Hsv { tolerance: 0.0 };
        assert!(fuzzy.matches(Rgb([200, 100, 100]), Rgb([200, 100, 100])));
        assert!(!fuzzy.matches(grey(10), grey(11)));
    }

    #[test]
    fn hsv_zero_tolerance_merges_zero_distance_channel_noise() {
        // Hue truncates to 0 for all three, saturation is 1 and value 255,
        // although the green and blue channels differ.
        let fuzzy = PredicateKind::Hsv { tolerance: 0.0 };
        let pure = Rgb([255, 0, 0]);
        assert!(fuzzy.matches(pure, Rgb([255, 1, 0])));
        assert!(fuzzy.matches(pure, Rgb([255, 0, 1])));
        assert!(fuzzy.matches(Rgb([255, 1, 0]), Rgb([255, 0, 1])));
    }

    #[test]
    fn hsv_tolerance_is_inclusive() {
        // Greys one level apart are exactly 10 apart.
        assert!(PredicateKind::Hsv { tolerance: 10.0 }.matches(grey(10), grey(11)));
        assert!(!PredicateKind::Hsv { tolerance: 9.999 }.matches(grey(10), grey(11)));
    }

    #[test]
    fn predicates_are_symmetric() {
        let samples = [
            Rgb([0, 0, 0]),
            Rgb([255, 0, 10]),
            Rgb([255, 9, 0]),
            Rgb([12, 200, 77]),
            grey(128),
        ];
        let kinds = [
            PredicateKind::ExactGrey,
            PredicateKind::Hsv { tolerance: 8.0 },
            PredicateKind::Hsv { tolerance: 500.0 },
        ];
        for kind in kinds {
            for &a in &samples {
                for &b in &samples {
                    assert_eq!(kind.matches(a, b), kind.matches(b, a));
                }
            }
        }
    }

    #[test]
    fn names() {
        assert_eq!(PredicateKind::ExactGrey.name(), "exact-grey");
        assert_eq!(PredicateKind::Hsv { tolerance: 1.0 }.name(), "hsv");
    }
}

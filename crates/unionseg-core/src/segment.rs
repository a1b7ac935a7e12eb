//! Segmentation driver: build a pixel forest, merge similar neighbors,
//! and recolor each region.
//!
//! # Steps
//!
//! 1. **Build**: one forest element per pixel, row-major.
//! 2. **Merge**: scan indices in row-major order; test the right neighbor
//!    (except in the last column), then the bottom neighbor (except in the
//!    last row); union on a match. The order is fixed so that the surviving
//!    root of each region is reproducible.
//! 3. **Aggregate**: sum the *source* colors of every region at its root,
//!    then write the truncated mean into the root's *output* pixel.
//! 4. **Propagate**: copy each root's output color to every member.
//!
//! The random-color mode replaces steps 3 and 4 with a single pass that
//! gives each root a random color the first time it is seen.
//!
//! The source raster is only read. The output raster is either returned
//! by value or borrowed mutably, so no other writer can observe a
//! half-colored buffer.

use image::Rgb;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::forest::DisjointSet;
use crate::predicate::{Predicate, PredicateKind};
use crate::raster::RgbRaster;
use crate::types::{
    Dimensions, RegionColoring, SegmentConfig, SegmentError, validate_tolerance,
};

/// Result of a segmentation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    /// Recolored image, same size as the input.
    pub output: RgbRaster,
    /// Number of regions (forest roots) found.
    pub region_count: usize,
}

/// Segment with the exact grey-level predicate and average coloring.
///
/// # Errors
///
/// Returns [`SegmentError::Allocation`] if a working buffer cannot be
/// allocated.
pub fn segment_exact(input: &RgbRaster) -> Result<RgbRaster, SegmentError> {
    segment(input, &SegmentConfig::default()).map(|s| s.output)
}

/// Segment with the HSV predicate at `tolerance` and average coloring.
///
/// # Errors
///
/// Returns [`SegmentError::InvalidTolerance`] if `tolerance` is negative or
/// not finite, and [`SegmentError::Allocation`] if a working buffer cannot
/// be allocated.
pub fn segment_fuzzy(input: &RgbRaster, tolerance: f64) -> Result<RgbRaster, SegmentError> {
    validate_tolerance(tolerance)?;
    let config = SegmentConfig {
        predicate: PredicateKind::Hsv { tolerance },
        ..SegmentConfig::default()
    };
    segment(input, &config).map(|s| s.output)
}

/// Segment `input` into a newly allocated output raster.
///
/// # Errors
///
/// Returns [`SegmentError::InvalidTolerance`] for an unusable HSV
/// tolerance and [`SegmentError::Allocation`] /
/// [`SegmentError::DimensionOverflow`] if buffers cannot be created.
pub fn segment(input: &RgbRaster, config: &SegmentConfig) -> Result<Segmentation, SegmentError> {
    config.validate()?;
    let mut output = RgbRaster::new(input.width(), input.height())?;
    let region_count = segment_into(input, &mut output, config)?;
    Ok(Segmentation {
        output,
        region_count,
    })
}

/// Segment `input`, writing every pixel of `output`.
///
/// Returns the number of regions. Row padding in `output` is left as is.
///
/// # Errors
///
/// Returns [`SegmentError::DimensionMismatch`] if the rasters differ in
/// size, [`SegmentError::InvalidTolerance`] for an unusable HSV tolerance,
/// and [`SegmentError::Allocation`] if the forest or accumulators cannot be
/// allocated.
pub fn segment_into(
    input: &RgbRaster,
    output: &mut RgbRaster,
    config: &SegmentConfig,
) -> Result<usize, SegmentError> {
    config.validate()?;
    check_dimensions(input.dimensions(), output.dimensions())?;

    let mut forest = config.forest.make_set(input.pixel_count())?;
    merge(&mut forest, input, &config.predicate);

    match config.coloring {
        RegionColoring::Average => {
            let regions = aggregate(&mut forest, input, output)?;
            propagate(&mut forest, output);
            Ok(regions)
        }
        RegionColoring::Random { seed } => colorize_seeded(&mut forest, output, seed),
    }
}

/// Segment with `predicate` and give every region a color drawn from `rng`.
///
/// # Errors
///
/// Returns [`SegmentError::InvalidTolerance`] for an unusable HSV
/// tolerance and [`SegmentError::Allocation`] if buffers cannot be created.
pub fn segment_random_with<R: Rng + ?Sized>(
    input: &RgbRaster,
    predicate: PredicateKind,
    rng: &mut R,
) -> Result<Segmentation, SegmentError> {
    let config = SegmentConfig {
        predicate,
        ..SegmentConfig::default()
    };
    config.validate()?;

    let mut output = RgbRaster::new(input.width(), input.height())?;
    let mut forest = config.forest.make_set(input.pixel_count())?;
    merge(&mut forest, input, &config.predicate);
    let region_count = colorize_random(&mut forest, &mut output, rng)?;
    Ok(Segmentation {
        output,
        region_count,
    })
}

pub(crate) const fn check_dimensions(
    input: Dimensions,
    output: Dimensions,
) -> Result<(), SegmentError> {
    if input.width == output.width && input.height == output.height {
        Ok(())
    } else {
        Err(SegmentError::DimensionMismatch { input, output })
    }
}

/// Union every pair of 4-adjacent pixels that `predicate` accepts.
///
/// Returns the number of unions that actually merged two sets.
pub(crate) fn merge<F, P>(forest: &mut F, source: &RgbRaster, predicate: &P) -> usize
where
    F: DisjointSet + ?Sized,
    P: Predicate + ?Sized,
{
    let width = source.width() as usize;
    let count = forest.len();
    let mut merged = 0;

    for i in 0..count {
        let here = source.get(i);

        let last_column = (i + 1) % width == 0;
        if !last_column && predicate.matches(here, source.get(i + 1)) && forest.union(i, i + 1) {
            merged += 1;
        }

        let last_row = i + width >= count;
        if !last_row
            && predicate.matches(here, source.get(i + width))
            && forest.union(i, i + width)
        {
            merged += 1;
        }
    }

    merged
}

/// Running channel sums for one region, keyed by its root index.
#[derive(Debug, Clone, Copy, Default)]
struct RegionAccumulator {
    red: u64,
    green: u64,
    blue: u64,
    count: u64,
}

impl RegionAccumulator {
    fn add(&mut self, pixel: Rgb<u8>) {
        let [r, g, b] = pixel.0;
        self.red += u64::from(r);
        self.green += u64::from(g);
        self.blue += u64::from(b);
        self.count += 1;
    }

    /// Per-channel mean, truncated toward zero.
    fn mean(&self) -> Rgb<u8> {
        let channel = |sum: u64| u8::try_from(sum / self.count).unwrap_or(u8::MAX);
        Rgb([channel(self.red), channel(self.green), channel(self.blue)])
    }
}

/// Write each region's mean source color into its root's output pixel.
///
/// Returns the number of regions.
pub(crate) fn aggregate<F>(
    forest: &mut F,
    source: &RgbRaster,
    output: &mut RgbRaster,
) -> Result<usize, SegmentError>
where
    F: DisjointSet + ?Sized,
{
    let count = forest.len();
    let mut slots: Vec<RegionAccumulator> = Vec::new();
    slots
        .try_reserve_exact(count)
        .map_err(|_| SegmentError::Allocation {
            what: "region accumulators",
            count,
        })?;
    slots.resize(count, RegionAccumulator::default());

    for i in 0..count {
        let root = forest.find(i);
        slots[root].add(source.get(i));
    }

    let mut regions = 0;
    for (root, slot) in slots.iter().enumerate() {
        if slot.count == 0 {
            continue;
        }
        output.put(root, slot.mean());
        regions += 1;
    }

    Ok(regions)
}

/// Copy every root's output color to the members of its set.
pub(crate) fn propagate<F>(forest: &mut F, output: &mut RgbRaster)
where
    F: DisjointSet + ?Sized,
{
    for i in 0..forest.len() {
        let root = forest.find(i);
        if root != i {
            let color = output.get(root);
            output.put(i, color);
        }
    }
}

/// Random coloring from a fixed `seed`, or the thread-local generator.
pub(crate) fn colorize_seeded<F>(
    forest: &mut F,
    output: &mut RgbRaster,
    seed: Option<u64>,
) -> Result<usize, SegmentError>
where
    F: DisjointSet + ?Sized,
{
    match seed {
        Some(seed) => colorize_random(forest, output, &mut StdRng::seed_from_u64(seed)),
        None => colorize_random(forest, output, &mut rand::rng()),
    }
}

/// Give each root a random color the first time it is reached and copy it
/// to every member.
///
/// Returns the number of regions.
pub(crate) fn colorize_random<F, R>(
    forest: &mut F,
    output: &mut RgbRaster,
    rng: &mut R,
) -> Result<usize, SegmentError>
where
    F: DisjointSet + ?Sized,
    R: Rng + ?Sized,
{
    let count = forest.len();
    let mut colored: Vec<bool> = Vec::new();
    colored
        .try_reserve_exact(count)
        .map_err(|_| SegmentError::Allocation {
            what: "region color flags",
            count,
        })?;
    colored.resize(count, false);

    let mut regions = 0;
    for i in 0..count {
        let root = forest.find(i);
        if !colored[root] {
            output.put(root, Rgb(rng.random::<[u8; 3]>()));
            colored[root] = true;
            regions += 1;
        }
        let color = output.get(root);
        output.put(i, color);
    }

    Ok(regions)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{HashMap, HashSet, VecDeque};

    use image::RgbImage;

    use super::*;
    use crate::color::grey;
    use crate::forest::{BaselineForest, Forest, ForestKind};

    fn raster_from(width: u32, height: u32, pixels: &[Rgb<u8>]) -> RgbRaster {
        let img = RgbImage::from_fn(width, height, |x, y| pixels[(y * width + x) as usize]);
        RgbRaster::from(img)
    }

    fn random_raster(width: u32, height: u32, levels: &[u8], seed: u64) -> RgbRaster {
        let mut rng = StdRng::seed_from_u64(seed);
        let pixels: Vec<_> = (0..width * height)
            .map(|_| {
                let level = levels[rng.random_range(0..levels.len())];
                Rgb([level, level.saturating_add(rng.random_range(0..3)), level])
            })
            .collect();
        raster_from(width, height, &pixels)
    }

    /// Relabel roots so equal partitions compare equal.
    fn canonical(representatives: &[usize]) -> Vec<usize> {
        let mut first_seen = HashMap::new();
        representatives
            .iter()
            .map(|&root| {
                let next = first_seen.len();
                *first_seen.entry(root).or_insert(next)
            })
            .collect()
    }

    /// Label 4-connected components by breadth-first flood fill.
    fn flood_fill_labels(raster: &RgbRaster, predicate: &PredicateKind) -> Vec<usize> {
        let width = raster.width() as usize;
        let count = raster.pixel_count();
        let mut labels = vec![usize::MAX; count];
        let mut next = 0;

        for start in 0..count {
            if labels[start] != usize::MAX {
                continue;
            }
            labels[start] = next;
            let mut queue = VecDeque::from([start]);
            while let Some(i) = queue.pop_front() {
                let mut neighbors = Vec::new();
                if i % width != 0 {
                    neighbors.push(i - 1);
                }
                if (i + 1) % width != 0 {
                    neighbors.push(i + 1);
                }
                if i >= width {
                    neighbors.push(i - width);
                }
                if i + width < count {
                    neighbors.push(i + width);
                }
                for n in neighbors {
                    if labels[n] == usize::MAX && predicate.matches(raster.get(i), raster.get(n)) {
                        labels[n] = next;
                        queue.push_back(n);
                    }
                }
            }
            next += 1;
        }

        labels
    }

    fn forest_partition(raster: &RgbRaster, predicate: &PredicateKind) -> Vec<usize> {
        let mut forest = Forest::make_set(raster.pixel_count()).unwrap();
        merge(&mut forest, raster, predicate);
        canonical(&forest.representatives())
    }

    // --- scenarios ---

    #[test]
    fn uniform_grey_square_is_one_region() {
        let input = raster_from(2, 2, &[grey(77); 4]);
        let result = segment(&input, &SegmentConfig::default()).unwrap();
        assert_eq!(result.region_count, 1);
        assert!(result.output.pixels().all(|p| p == grey(77)));
    }

    #[test]
    fn distinct_greys_stay_separate() {
        let input = raster_from(2, 1, &[grey(10), grey(200)]);
        let result = segment(&input, &SegmentConfig::default()).unwrap();
        assert_eq!(result.region_count, 2);
        assert_eq!(result.output.pixel(0, 0), Some(grey(10)));
        assert_eq!(result.output.pixel(1, 0), Some(grey(200)));
    }

    #[test]
    fn fuzzy_zero_tolerance_merges_zero_distance_pixels() {
        let input = raster_from(3, 1, &[Rgb([255, 0, 0]), Rgb([255, 1, 0]), Rgb([255, 0, 1])]);
        let output = segment_fuzzy(&input, 0.0).unwrap();
        // Mean of (255, 0, 0), (255, 1, 0), (255, 0, 1) truncates to (255, 0, 0).
        assert!(output.pixels().all(|p| p == Rgb([255, 0, 0])));
    }

    #[test]
    fn fuzzy_tolerance_below_every_distance_keeps_singletons() {
        // Greys 10 apart in level are 100 apart in HSV distance.
        let pixels: Vec<_> = (0..9u8).map(|i| grey(i * 10)).collect();
        let input = raster_from(3, 3, &pixels);
        let config = SegmentConfig {
            predicate: PredicateKind::Hsv { tolerance: 99.0 },
            ..SegmentConfig::default()
        };
        let result = segment(&input, &config).unwrap();
        assert_eq!(result.region_count, 9);
        assert_eq!(result.output, input);
    }

    #[test]
    fn fuzzy_large_tolerance_merges_everything() {
        let input = random_raster(6, 5, &[0, 90, 255], 11);
        let config = SegmentConfig {
            predicate: PredicateKind::Hsv { tolerance: 10_000.0 },
            ..SegmentConfig::default()
        };
        let result = segment(&input, &config).unwrap();
        assert_eq!(result.region_count, 1);
    }

    // --- aggregation and propagation ---

    #[test]
    fn region_color_is_truncated_mean_of_sources() {
        // All three have grey level 33, so they form one region.
        let input = raster_from(
            3,
            1,
            &[Rgb([100, 0, 0]), Rgb([0, 50, 50]), Rgb([0, 0, 100])],
        );
        let output = segment_exact(&input).unwrap();
        // (100/3, 50/3, 150/3) = (33, 16, 50)
        assert!(output.pixels().all(|p| p == Rgb([33, 16, 50])));
    }

    #[test]
    fn every_pixel_matches_its_root_after_propagation() {
        let input = random_raster(9, 7, &[20, 21, 120], 3);
        let mut forest = Forest::make_set(input.pixel_count()).unwrap();
        merge(&mut forest, &input, &PredicateKind::ExactGrey);
        let mut output = RgbRaster::new(9, 7).unwrap();
        aggregate(&mut forest, &input, &mut output).unwrap();
        propagate(&mut forest, &mut output);

        for i in 0..input.pixel_count() {
            let root = forest.find(i);
            assert_eq!(output.get(i), output.get(root), "pixel {i} not propagated");
        }
    }

    #[test]
    fn aggregate_counts_one_region_per_root() {
        let input = raster_from(4, 1, &[grey(1), grey(1), grey(9), grey(1)]);
        let mut forest = Forest::make_set(4).unwrap();
        merge(&mut forest, &input, &PredicateKind::ExactGrey);
        let mut output = RgbRaster::new(4, 1).unwrap();
        assert_eq!(aggregate(&mut forest, &input, &mut output).unwrap(), 3);
    }

    // --- merge ---

    #[test]
    fn merge_does_not_wrap_across_rows() {
        // Right edge of row 0 equals left edge of row 1; they are not adjacent.
        let input = raster_from(2, 2, &[grey(1), grey(5), grey(5), grey(9)]);
        let partition = forest_partition(&input, &PredicateKind::ExactGrey);
        assert_eq!(partition, vec![0, 1, 2, 3]);
    }

    #[test]
    fn merge_counts_effective_unions() {
        let input = raster_from(2, 2, &[grey(4); 4]);
        let mut forest = Forest::make_set(4).unwrap();
        // Four adjacent pairs, but only three unions are needed for one set.
        assert_eq!(merge(&mut forest, &input, &PredicateKind::ExactGrey), 3);
    }

    #[test]
    fn exact_partition_matches_flood_fill() {
        for seed in 0..20 {
            let input = random_raster(4, 4, &[10, 11, 60], seed);
            let predicate = PredicateKind::ExactGrey;
            assert_eq!(
                forest_partition(&input, &predicate),
                flood_fill_labels(&input, &predicate),
                "seed {seed}"
            );
        }
    }

    #[test]
    fn fuzzy_partition_matches_flood_fill() {
        for seed in 0..20 {
            let input = random_raster(5, 4, &[10, 12, 200], seed);
            let predicate = PredicateKind::Hsv { tolerance: 25.0 };
            assert_eq!(
                forest_partition(&input, &predicate),
                flood_fill_labels(&input, &predicate),
                "seed {seed}"
            );
        }
    }

    #[test]
    fn baseline_forest_gives_identical_output() {
        let input = random_raster(12, 9, &[0, 1, 2, 200], 5);
        let optimized = segment(&input, &SegmentConfig::default()).unwrap();
        let baseline = segment(
            &input,
            &SegmentConfig {
                forest: ForestKind::Baseline,
                ..SegmentConfig::default()
            },
        )
        .unwrap();
        assert_eq!(optimized, baseline);

        let mut forest = BaselineForest::make_set(input.pixel_count()).unwrap();
        merge(&mut forest, &input, &PredicateKind::ExactGrey);
        assert_eq!(
            canonical(&forest.representatives()),
            forest_partition(&input, &PredicateKind::ExactGrey)
        );
    }

    #[test]
    fn repeated_runs_are_identical() {
        let input = random_raster(8, 8, &[30, 31, 90], 9);
        let first = segment_fuzzy(&input, 12.0).unwrap();
        let second = segment_fuzzy(&input, 12.0).unwrap();
        assert_eq!(first, second);
    }

    // --- random coloring ---

    #[test]
    fn random_coloring_is_uniform_within_regions() {
        let input = raster_from(
            3,
            2,
            &[grey(0), grey(0), grey(50), grey(0), grey(50), grey(50)],
        );
        let mut rng = StdRng::seed_from_u64(42);
        let result = segment_random_with(&input, PredicateKind::ExactGrey, &mut rng).unwrap();
        assert_eq!(result.region_count, 2);

        let out = &result.output;
        assert_eq!(out.get(0), out.get(1));
        assert_eq!(out.get(0), out.get(3));
        assert_eq!(out.get(2), out.get(4));
        assert_eq!(out.get(2), out.get(5));
    }

    #[test]
    fn random_coloring_colors_black_regions_too() {
        // A region whose random color happens to be achromatic must still be
        // colored exactly once; the colored flag, not the pixel, decides.
        let input = raster_from(2, 2, &[grey(0); 4]);
        let mut forest = Forest::make_set(4).unwrap();
        merge(&mut forest, &input, &PredicateKind::ExactGrey);
        let mut output = RgbRaster::new(2, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let regions = colorize_random(&mut forest, &mut output, &mut rng).unwrap();
        assert_eq!(regions, 1);
        let colors: HashSet<_> = output.pixels().collect();
        assert_eq!(colors.len(), 1);
    }

    #[test]
    fn seeded_random_coloring_is_reproducible() {
        let input = random_raster(6, 6, &[5, 6, 100], 2);
        let config = SegmentConfig {
            coloring: RegionColoring::Random { seed: Some(99) },
            ..SegmentConfig::default()
        };
        let first = segment(&input, &config).unwrap();
        let second = segment(&input, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn random_and_average_modes_agree_on_region_count() {
        let input = random_raster(7, 5, &[40, 41, 42], 8);
        let average = segment(&input, &SegmentConfig::default()).unwrap();
        let random = segment(
            &input,
            &SegmentConfig {
                coloring: RegionColoring::Random { seed: None },
                ..SegmentConfig::default()
            },
        )
        .unwrap();
        assert_eq!(average.region_count, random.region_count);
    }

    // --- boundaries and errors ---

    #[test]
    fn padded_input_is_read_through_stride() {
        let data = vec![
            9, 9, 9, 9, 9, 9, 0xAA, 0xBB, //
            200, 200, 200, 9, 9, 9, 0xAA, 0xBB,
        ];
        let input = RgbRaster::from_raw_parts(2, 2, 8, data).unwrap();
        let result = segment(&input, &SegmentConfig::default()).unwrap();
        assert_eq!(result.region_count, 2);
        assert_eq!(result.output.pixel(0, 1), Some(grey(200)));
        assert_eq!(result.output.pixel(1, 1), Some(grey(9)));
    }

    #[test]
    fn segment_into_preserves_output_padding() {
        let input = raster_from(2, 2, &[grey(3); 4]);
        let mut output = RgbRaster::from_raw_parts(2, 2, 7, vec![0xCC; 14]).unwrap();
        let regions = segment_into(&input, &mut output, &SegmentConfig::default()).unwrap();
        assert_eq!(regions, 1);
        assert!(output.pixels().all(|p| p == grey(3)));
        assert_eq!(output.as_bytes()[6], 0xCC);
    }

    #[test]
    fn segment_into_rejects_mismatched_output() {
        let input = raster_from(2, 2, &[grey(3); 4]);
        let mut output = RgbRaster::new(3, 2).unwrap();
        let result = segment_into(&input, &mut output, &SegmentConfig::default());
        assert!(matches!(result, Err(SegmentError::DimensionMismatch { .. })));
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let input = raster_from(1, 1, &[grey(3)]);
        assert!(matches!(
            segment_fuzzy(&input, -0.5),
            Err(SegmentError::InvalidTolerance(_))
        ));
        assert!(matches!(
            segment_random_with(
                &input,
                PredicateKind::Hsv {
                    tolerance: f64::INFINITY
                },
                &mut StdRng::seed_from_u64(0)
            ),
            Err(SegmentError::InvalidTolerance(_))
        ));
    }

    #[test]
    fn empty_image_has_no_regions() {
        let input = RgbRaster::new(0, 4).unwrap();
        let result = segment(&input, &SegmentConfig::default()).unwrap();
        assert_eq!(result.region_count, 0);
        assert_eq!(result.output.dimensions(), input.dimensions());
    }

    #[test]
    fn single_column_merges_vertically() {
        let input = raster_from(1, 3, &[grey(8), grey(8), grey(20)]);
        let result = segment(&input, &SegmentConfig::default()).unwrap();
        assert_eq!(result.region_count, 2);
    }
}

//! Segmentation diagnostics: timing and region statistics per stage.
//!
//! [`segment_with_diagnostics`] runs the same stages as
//! [`segment`](crate::segment()) and records how long each took and what
//! it produced. Time is read through the [`Clock`] trait so the engine
//! itself never touches a platform timer.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::forest::DisjointSet;
use crate::raster::RgbRaster;
use crate::segment::{Segmentation, aggregate, colorize_seeded, merge, propagate};
use crate::types::{RegionColoring, SegmentConfig, SegmentError};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single segmentation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDiagnostics {
    /// Stage 1: forest construction.
    pub build: StageDiagnostics,
    /// Stage 2: adjacency merge.
    pub merge: StageDiagnostics,
    /// Stage 3: region coloring (mean or random).
    pub coloring: StageDiagnostics,
    /// Stage 4: propagation (average coloring only; the random mode
    /// propagates while coloring).
    pub propagate: Option<StageDiagnostics>,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Region statistics for the final partition.
    pub summary: SegmentSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Forest construction.
    Build {
        /// Forest implementation name.
        forest: String,
        /// Number of elements created.
        element_count: usize,
    },
    /// Adjacency merge.
    Merge {
        /// Predicate name.
        predicate: String,
        /// Unions that joined two distinct sets.
        union_count: usize,
    },
    /// Mean-color aggregation.
    Aggregate {
        /// Regions written.
        region_count: usize,
    },
    /// Random region coloring.
    RandomColors {
        /// Regions colored.
        region_count: usize,
        /// Whether the palette came from a fixed seed.
        seeded: bool,
    },
    /// Root-to-member color propagation.
    Propagate {
        /// Pixels visited.
        pixel_count: usize,
    },
}

/// Region statistics for a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSummary {
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: usize,
    /// Number of regions.
    pub region_count: usize,
    /// Pixels in the largest region.
    pub largest_region: usize,
    /// Regions made of a single pixel.
    pub singleton_regions: usize,
    /// Mean pixels per region.
    pub mean_region_size: f64,
}

/// Segment `input` and collect per-stage diagnostics.
///
/// The output is identical to what [`segment`](crate::segment()) returns
/// for the same arguments.
///
/// # Errors
///
/// Same as [`segment`](crate::segment()).
pub fn segment_with_diagnostics<C: Clock>(
    input: &RgbRaster,
    config: &SegmentConfig,
    clock: &C,
) -> Result<(Segmentation, SegmentDiagnostics), SegmentError> {
    config.validate()?;
    let total_start = clock.now();
    let count = input.pixel_count();
    let mut output = RgbRaster::new(input.width(), input.height())?;

    let start = clock.now();
    let mut forest = config.forest.make_set(count)?;
    let build = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Build {
            forest: config.forest.name().to_string(),
            element_count: count,
        },
    };

    let start = clock.now();
    let union_count = merge(&mut forest, input, &config.predicate);
    let merge_stage = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Merge {
            predicate: config.predicate.name().to_string(),
            union_count,
        },
    };

    let (region_count, coloring, propagate_stage) = match config.coloring {
        RegionColoring::Average => {
            let start = clock.now();
            let region_count = aggregate(&mut forest, input, &mut output)?;
            let coloring = StageDiagnostics {
                duration: clock.elapsed(&start),
                metrics: StageMetrics::Aggregate { region_count },
            };

            let start = clock.now();
            propagate(&mut forest, &mut output);
            let propagate_stage = StageDiagnostics {
                duration: clock.elapsed(&start),
                metrics: StageMetrics::Propagate { pixel_count: count },
            };
            (region_count, coloring, Some(propagate_stage))
        }
        RegionColoring::Random { seed } => {
            let start = clock.now();
            let region_count = colorize_seeded(&mut forest, &mut output, seed)?;
            let coloring = StageDiagnostics {
                duration: clock.elapsed(&start),
                metrics: StageMetrics::RandomColors {
                    region_count,
                    seeded: seed.is_some(),
                },
            };
            (region_count, coloring, None)
        }
    };

    let summary = summarize(&mut forest, input, region_count)?;
    let diagnostics = SegmentDiagnostics {
        build,
        merge: merge_stage,
        coloring,
        propagate: propagate_stage,
        total_duration: clock.elapsed(&total_start),
        summary,
    };

    Ok((
        Segmentation {
            output,
            region_count,
        },
        diagnostics,
    ))
}

/// Region size statistics from a merged forest.
fn summarize<F: DisjointSet + ?Sized>(
    forest: &mut F,
    input: &RgbRaster,
    region_count: usize,
) -> Result<SegmentSummary, SegmentError> {
    let count = forest.len();
    let mut sizes: Vec<usize> = Vec::new();
    sizes
        .try_reserve_exact(count)
        .map_err(|_| SegmentError::Allocation {
            what: "region sizes",
            count,
        })?;
    sizes.resize(count, 0);
    for i in 0..count {
        sizes[forest.find(i)] += 1;
    }
    let largest_region = sizes.iter().copied().max().unwrap_or(0);
    let singleton_regions = sizes.iter().filter(|&&s| s == 1).count();

    #[allow(clippy::cast_precision_loss)]
    let mean_region_size = if region_count == 0 {
        0.0
    } else {
        input.pixel_count() as f64 / region_count as f64
    };

    Ok(SegmentSummary {
        image_width: input.width(),
        image_height: input.height(),
        pixel_count: input.pixel_count(),
        region_count,
        largest_region,
        singleton_regions,
        mean_region_size,
    })
}

impl SegmentDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Segmentation Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(72));

        let total_ms = duration_ms(self.total_duration);
        let mut stages = vec![
            ("Build", &self.build),
            ("Merge", &self.merge),
            ("Coloring", &self.coloring),
        ];
        if let Some(ref p) = self.propagate {
            stages.push(("Propagate", p));
        }

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Regions: {}  |  Largest: {} px  |  Singletons: {}  |  Mean size: {:.1} px",
            self.summary.region_count,
            self.summary.largest_region,
            self.summary.singleton_regions,
            self.summary.mean_region_size,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Build {
            forest,
            element_count,
        } => format!("{forest} forest, {element_count} elements"),
        StageMetrics::Merge {
            predicate,
            union_count,
        } => format!("{predicate} predicate, {union_count} unions"),
        StageMetrics::Aggregate { region_count } => format!("mean of {region_count} regions"),
        StageMetrics::RandomColors {
            region_count,
            seeded,
        } => {
            let palette = if *seeded { "seeded" } else { "unseeded" };
            format!("{palette} random colors for {region_count} regions")
        }
        StageMetrics::Propagate { pixel_count } => format!("{pixel_count} pixels"),
    }
}

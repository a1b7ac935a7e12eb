//! unionseg: segment an image into uniform-color regions from the command line.
//!
//! Reads an image file (or generates a radial test disk when none is
//! given), runs one of the segmentation modes, prints per-stage
//! diagnostics and optionally writes the recolored image. Useful for:
//!
//! - Comparing the exact grey-level and fuzzy HSV predicates
//! - Tuning the HSV tolerance
//! - Measuring the path-compressed forest against the baseline forest
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin unionseg -- [OPTIONS] [IMAGE_PATH]
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use unionseg_core::diagnostics::{Clock, SegmentDiagnostics};
use unionseg_core::{
    FormatPolicy, ForestKind, PredicateKind, RegionColoring, RgbRaster, SegmentConfig,
};

/// Side length of the generated test disk.
const DISK_SIZE: u32 = 256;

/// Radius of the generated test disk.
const DISK_RADIUS: u32 = 100;

/// Segment an image into regions of similar color.
///
/// Runs the union-find segmentation on an image with configurable
/// parameters and prints per-stage timing and region diagnostics.
#[derive(Parser)]
#[command(name = "unionseg", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    ///
    /// When omitted, a 256x256 radial grey disk is generated instead.
    image_path: Option<PathBuf>,

    /// Write the recolored image to this file (format from extension).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Segmentation mode.
    #[arg(long, value_enum, default_value_t = Mode::Exact)]
    mode: Mode,

    /// HSV distance tolerance for the fuzzy predicate.
    ///
    /// Also switches the random mode from the exact to the fuzzy predicate.
    #[arg(long)]
    tolerance: Option<f64>,

    /// Grey level below which pixels turn black in threshold mode.
    #[arg(long, default_value_t = SegmentConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Disjoint-set forest implementation.
    #[arg(long, value_enum, default_value_t = Forest::Compressed)]
    forest: Forest,

    /// Seed for the random mode's region colors.
    #[arg(long)]
    seed: Option<u64>,

    /// Convert non-RGB inputs (grey, alpha, 16-bit) instead of rejecting them.
    #[arg(long)]
    convert: bool,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full segmentation config as a JSON string.
    ///
    /// When provided, `--mode`, `--tolerance`, `--forest` and `--seed` are
    /// ignored. The JSON must be a valid `SegmentConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Segmentation mode selection.
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Exact grey-level equality, regions painted with their mean color.
    Exact,
    /// HSV distance within tolerance, regions painted with their mean color.
    Fuzzy,
    /// Regions painted with random colors.
    Random,
    /// Black/white grey-level threshold (no segmentation).
    Threshold,
}

/// Forest implementation selection.
#[derive(Clone, Copy, ValueEnum)]
enum Forest {
    /// Union by rank with path compression.
    Compressed,
    /// Naive parent links, no rank or compression.
    Baseline,
}

/// Build a [`SegmentConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<SegmentConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        let fuzzy = PredicateKind::Hsv {
            tolerance: cli.tolerance.unwrap_or(SegmentConfig::DEFAULT_TOLERANCE),
        };
        let (predicate, coloring) = match cli.mode {
            Mode::Exact | Mode::Threshold => (PredicateKind::ExactGrey, RegionColoring::Average),
            Mode::Fuzzy => (fuzzy, RegionColoring::Average),
            Mode::Random => (
                if cli.tolerance.is_some() {
                    fuzzy
                } else {
                    PredicateKind::ExactGrey
                },
                RegionColoring::Random { seed: cli.seed },
            ),
        };
        SegmentConfig {
            predicate,
            coloring,
            forest: match cli.forest {
                Forest::Compressed => ForestKind::PathCompressed,
                Forest::Baseline => ForestKind::Baseline,
            },
        }
    };

    config.validate().map_err(|e| format!("Invalid config: {e}"))?;
    Ok(config)
}

/// Load the input raster, or generate the test disk when no path is given.
fn load_input(cli: &Cli) -> Result<RgbRaster, String> {
    let Some(ref path) = cli.image_path else {
        eprintln!("Image: generated disk {DISK_SIZE}x{DISK_SIZE}, radius {DISK_RADIUS}");
        return unionseg_core::disk(DISK_SIZE, DISK_SIZE, DISK_RADIUS)
            .map_err(|e| format!("Error generating test disk: {e}"));
    };

    let bytes =
        std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    eprintln!("Image: {} ({} bytes)", path.display(), bytes.len());

    let policy = if cli.convert {
        FormatPolicy::Convert
    } else {
        FormatPolicy::Strict
    };
    unionseg_core::decode_rgb(&bytes, policy)
        .map_err(|e| format!("Error decoding {}: {e}", path.display()))
}

/// Write `raster` to `path`, reporting the outcome on stderr.
fn write_output(raster: &RgbRaster, path: &Path) -> Result<(), String> {
    raster
        .to_rgb_image()
        .save(path)
        .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    eprintln!(
        "Output written to {} ({}x{})",
        path.display(),
        raster.width(),
        raster.height(),
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let input = match load_input(&cli) {
        Ok(raster) => raster,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    if cli.mode == Mode::Threshold && cli.config_json.is_none() {
        return run_threshold(&cli, &input);
    }

    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match unionseg_core::segment_with_diagnostics(&input, &config, &StdClock) {
            Ok((segmentation, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write output on the first run only.
                if run == 0
                    && let Some(ref path) = cli.output
                    && let Err(msg) = write_output(&segmentation.output, path)
                {
                    eprintln!("{msg}");
                    return ExitCode::FAILURE;
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Segmentation error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Threshold mode: one pass, no diagnostics.
fn run_threshold(cli: &Cli, input: &RgbRaster) -> ExitCode {
    let start = Instant::now();
    let mask = match unionseg_core::threshold(input, cli.threshold) {
        Ok(mask) => mask,
        Err(e) => {
            eprintln!("Threshold error: {e}");
            return ExitCode::FAILURE;
        }
    };
    eprintln!(
        "Threshold at level {} took {:.3}ms",
        cli.threshold,
        start.elapsed().as_secs_f64() * 1000.0,
    );

    if let Some(ref path) = cli.output
        && let Err(msg) = write_output(&mask, path)
    {
        eprintln!("{msg}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&SegmentDiagnostics) -> Option<Duration>;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[SegmentDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Build", |d| Some(d.build.duration)),
        ("Merge", |d| Some(d.merge.duration)),
        ("Coloring", |d| Some(d.coloring.duration)),
        ("Propagate", |d| d.propagate.as_ref().map(|s| s.duration)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

//! Subcommands and the argument groups they share.

pub mod aggregate;
pub mod analyze;
pub mod frames;
pub mod stages;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use crystal_io::WrittenReport;
use crystal_pipeline::{
    AnalysisConfig, CannyConfig, ClaheConfig, CropRegion, FrameRange, FurthestPairKind, GapPolicy,
    HoughConfig, MeasurementMode, ResizeConfig, ResizeFilter, ScaleConfig, ThresholdConfig,
};

/// Shape-analysis parameters.
#[derive(Args, Debug)]
pub struct AnalysisArgs {
    /// Maximum working width in pixels.
    #[arg(long, default_value_t = ResizeConfig::DEFAULT_MAX_WIDTH)]
    pub max_width: u32,

    /// Maximum working height in pixels.
    #[arg(long, default_value_t = ResizeConfig::DEFAULT_MAX_HEIGHT)]
    pub max_height: u32,

    /// Resampling filter used when a frame is shrunk.
    #[arg(long, value_enum, default_value_t = Filter::Triangle)]
    pub resize_filter: Filter,

    /// CLAHE clip limit.
    #[arg(long, default_value_t = ClaheConfig::DEFAULT_CLIP_LIMIT)]
    pub clip_limit: f64,

    /// CLAHE tiles per side.
    #[arg(long, default_value_t = ClaheConfig::DEFAULT_TILES)]
    pub tiles: u32,

    /// Gaussian blur kernel side (odd).
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_BLUR_KERNEL)]
    pub blur_kernel: u32,

    /// Adaptive threshold neighbourhood side (odd, at least 3).
    #[arg(long, default_value_t = ThresholdConfig::DEFAULT_BLOCK_SIZE)]
    pub block_size: u32,

    /// Constant subtracted from the adaptive threshold mean.
    #[arg(long, default_value_t = ThresholdConfig::DEFAULT_OFFSET, allow_hyphen_values = true)]
    pub threshold_offset: f64,

    /// Morphological closing kernel side (odd).
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_CLOSING_KERNEL)]
    pub closing_kernel: u32,

    /// Canny low threshold.
    #[arg(long, default_value_t = CannyConfig::DEFAULT_LOW)]
    pub canny_low: f32,

    /// Canny high threshold.
    #[arg(long, default_value_t = CannyConfig::DEFAULT_HIGH)]
    pub canny_high: f32,

    /// Minimum Hough accumulator votes.
    #[arg(long, default_value_t = HoughConfig::DEFAULT_THRESHOLD)]
    pub hough_threshold: u32,

    /// Minimum Hough segment length in pixels.
    #[arg(long, default_value_t = HoughConfig::DEFAULT_MIN_LINE_LENGTH)]
    pub min_line_length: u32,

    /// Largest gap bridged within one Hough segment.
    #[arg(long, default_value_t = HoughConfig::DEFAULT_MAX_LINE_GAP)]
    pub max_line_gap: u32,

    /// Seed for the Hough point order.
    #[arg(long, default_value_t = HoughConfig::DEFAULT_SEED)]
    pub hough_seed: u64,

    /// Furthest-pair search used for the bounding box.
    #[arg(long, value_enum, default_value_t = PairSearch::Exhaustive)]
    pub furthest_pair: PairSearch,

    /// Full analysis config as a JSON string.
    ///
    /// When provided, all other analysis flags are ignored.
    #[arg(long, conflicts_with = "config")]
    pub config_json: Option<String>,

    /// Full analysis config as a JSON file.
    ///
    /// When provided, all other analysis flags are ignored.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Resize filter selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Filter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

/// Furthest-pair search selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PairSearch {
    /// Compare every endpoint pair.
    Exhaustive,
    /// Only compare convex hull vertices.
    ConvexHull,
}

impl AnalysisArgs {
    /// Build a validated [`AnalysisConfig`].
    pub fn to_config(&self) -> Result<AnalysisConfig> {
        let config = if let Some(ref json) = self.config_json {
            serde_json::from_str(json).context("parsing --config-json")?
        } else if let Some(ref path) = self.config {
            crystal_io::load_json(path)?
        } else {
            AnalysisConfig {
                resize: ResizeConfig {
                    max_width: self.max_width,
                    max_height: self.max_height,
                    filter: match self.resize_filter {
                        Filter::Nearest => ResizeFilter::Nearest,
                        Filter::Triangle => ResizeFilter::Triangle,
                        Filter::CatmullRom => ResizeFilter::CatmullRom,
                        Filter::Gaussian => ResizeFilter::Gaussian,
                        Filter::Lanczos3 => ResizeFilter::Lanczos3,
                    },
                },
                clahe: ClaheConfig {
                    clip_limit: self.clip_limit,
                    tiles_x: self.tiles,
                    tiles_y: self.tiles,
                },
                blur_kernel: self.blur_kernel,
                threshold: ThresholdConfig {
                    block_size: self.block_size,
                    offset: self.threshold_offset,
                },
                closing_kernel: self.closing_kernel,
                canny: CannyConfig {
                    low: self.canny_low,
                    high: self.canny_high,
                },
                hough: HoughConfig {
                    threshold: self.hough_threshold,
                    min_line_length: self.min_line_length,
                    max_line_gap: self.max_line_gap,
                    seed: self.hough_seed,
                    ..HoughConfig::default()
                },
                furthest_pair: match self.furthest_pair {
                    PairSearch::Exhaustive => FurthestPairKind::Exhaustive,
                    PairSearch::ConvexHull => FurthestPairKind::ConvexHull,
                },
            }
        };
        config.validate()?;
        Ok(config)
    }
}

/// Growth aggregation parameters.
#[derive(Args, Debug)]
pub struct ScaleArgs {
    /// Physical size of one pixel.
    #[arg(long, default_value_t = ScaleConfig::DEFAULT_MICRONS_PER_PIXEL)]
    pub microns_per_pixel: f64,

    /// Camera frame rate.
    #[arg(long, default_value_t = ScaleConfig::DEFAULT_FRAME_RATE_HZ)]
    pub frame_rate: f64,

    /// Per-record measurement; defaults to what the record source suits.
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Treatment of frames without a valid measurement.
    #[arg(long, value_enum, default_value_t = GapArg::Skip)]
    pub gap: GapArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    /// Box diagonal.
    Hypotenuse,
    /// Width alone.
    Width,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum GapArg {
    /// Leave such frames out.
    Skip,
    /// Keep them as rows that break the rate chain.
    Preserve,
}

impl ScaleArgs {
    pub fn scale(&self) -> Result<ScaleConfig> {
        let scale = ScaleConfig {
            microns_per_pixel: self.microns_per_pixel,
            frame_rate_hz: self.frame_rate,
        };
        scale.validate()?;
        Ok(scale)
    }

    pub fn mode_or(&self, default: MeasurementMode) -> MeasurementMode {
        match self.mode {
            Some(ModeArg::Hypotenuse) => MeasurementMode::Hypotenuse,
            Some(ModeArg::Width) => MeasurementMode::WidthOnly,
            None => default,
        }
    }

    pub const fn gap(&self) -> GapPolicy {
        match self.gap {
            GapArg::Skip => GapPolicy::SkipMissing,
            GapArg::Preserve => GapPolicy::PreserveGap,
        }
    }
}

/// Where and how a report is written.
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Report directory, created if missing.
    #[arg(long, default_value = "logs")]
    pub report_dir: PathBuf,

    /// Base file name; defaults to one named after the record source.
    #[arg(long)]
    pub name: Option<String>,

    /// Print the summary and written paths as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Frame range selection, inclusive on both ends.
#[derive(Args, Debug)]
pub struct RangeArgs {
    /// First frame to use (default: 0).
    #[arg(long)]
    pub start: Option<usize>,

    /// Last frame to use (default: the final frame).
    #[arg(long)]
    pub end: Option<usize>,
}

impl RangeArgs {
    pub fn range(&self, len: usize) -> Result<FrameRange> {
        if len == 0 {
            bail!("no frames to select from");
        }
        Ok(FrameRange::new(
            self.start.unwrap_or(0),
            self.end.unwrap_or(len - 1),
            len,
        )?)
    }
}

/// Parse `x1,y1,x2,y2`.
pub fn parse_crop(s: &str) -> Result<CropRegion, String> {
    match parse_floats(s)?.as_slice() {
        &[x1, y1, x2, y2] => Ok(CropRegion::new(x1, y1, x2, y2)),
        other => Err(format!("expected x1,y1,x2,y2, got {} values", other.len())),
    }
}

/// Parse `sx,sy`.
pub fn parse_scale(s: &str) -> Result<(f64, f64), String> {
    match parse_floats(s)?.as_slice() {
        &[sx, sy] => Ok((sx, sy)),
        other => Err(format!("expected sx,sy, got {} values", other.len())),
    }
}

fn parse_floats(s: &str) -> Result<Vec<f64>, String> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid number '{part}': {e}"))
        })
        .collect()
}

/// Print a written report as text or JSON.
pub fn print_report(report: &WrittenReport, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "summary": report.summary,
            "records_csv": report.records_csv,
            "series_csv": report.series_csv,
            "plot_png": report.plot_png,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", crystal_export::summary_text(&report.summary));
        println!();
        for path in [&report.records_csv, &report.series_csv, &report.plot_png] {
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

/// Read a text file with the path in the error context.
pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

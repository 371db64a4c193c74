use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use crystal_export::RecordLayout;
use crystal_io::ReportWriter;
use crystal_pipeline::{
    CropRegion, FrameLibrary, FrameProcessingConfig, FrameSourceKind, MeasurementSource,
    ShapeAnalyzer, aggregate,
};
use tracing::{info, warn};

use super::{AnalysisArgs, RangeArgs, ReportArgs, ScaleArgs, parse_crop, parse_scale};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Directory of frame images, read in file-name order.
    pub frames: PathBuf,

    /// Frame set to measure.
    #[arg(long, value_enum, default_value_t = SourceArg::Original)]
    pub source: SourceArg,

    /// Crop every frame to `x1,y1,x2,y2` before measuring.
    #[arg(long, value_parser = parse_crop, allow_hyphen_values = true)]
    pub crop: Option<CropRegion>,

    /// Scale from crop coordinates to frame pixels, as `sx,sy`.
    #[arg(long, value_parser = parse_scale, requires = "crop")]
    pub crop_scale: Option<(f64, f64)>,

    /// Directory for cropped frame dumps.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Measure frames on all cores.
    #[arg(long)]
    pub parallel: bool,

    #[command(flatten)]
    pub range: RangeArgs,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    #[command(flatten)]
    pub scale: ScaleArgs,

    #[command(flatten)]
    pub report: ReportArgs,
}

/// Frame set selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SourceArg {
    Original,
    Hough,
    Contour,
}

impl From<SourceArg> for FrameSourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Original => Self::Original,
            SourceArg::Hough => Self::HoughProcessed,
            SourceArg::Contour => Self::ContourProcessed,
        }
    }
}

pub fn run(args: &AnalyzeArgs) -> Result<()> {
    let config = args.analysis.to_config()?;
    let scale = args.scale.scale()?;

    let frames = crystal_io::load_frames_from_dir(&args.frames)?;
    if frames.is_empty() {
        bail!("no frame images found in {}", args.frames.display());
    }

    let kind = FrameSourceKind::from(args.source);
    let library = match kind {
        FrameSourceKind::Original => FrameLibrary::new(frames),
        _ => FrameLibrary::with_processed(frames, &FrameProcessingConfig::default(), args.parallel)?,
    };
    let range = args.range.range(library.len())?;
    let selected = range.select(library.frames(kind))?;
    eprintln!(
        "Frames: {} of {} ({}), {}..={}",
        selected.len(),
        library.len(),
        kind.slug(),
        range.start,
        range.end,
    );

    let cropped;
    let frames = match args.crop {
        Some(crop) => {
            let crop = match args.crop_scale {
                Some((sx, sy)) => crop.with_scale(sx, sy),
                None => crop,
            };
            cropped = crop.crop_all(selected)?;
            if let Some(ref dir) = args.cache_dir {
                crystal_io::dump_frames(dir, "cropped", range.start, &cropped)?;
            }
            cropped.as_slice()
        }
        None => selected,
    };

    let mut source = ShapeAnalyzer::new(config, args.parallel);
    let mut records = source.measure(frames).context("measuring frames")?;
    for record in &mut records {
        record.frame += range.start;
    }
    let missing = records.iter().filter(|r| !r.has_extents()).count();
    if missing > 0 {
        warn!(missing, total = records.len(), "frames without a measurement");
    }

    let mode = args.scale.mode_or(source.measurement_mode());
    let series = aggregate(&records, mode, &scale, args.scale.gap())?;
    info!(rows = series.rows.len(), ?mode, "series aggregated");

    let name = args.report.name.as_deref().unwrap_or(source.report_name());
    let report = ReportWriter::new(&args.report.report_dir).write(
        name,
        &records,
        RecordLayout::Analyzer,
        &series,
    )?;
    super::print_report(&report, args.report.json)
}

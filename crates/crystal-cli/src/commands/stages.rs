use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use crystal_pipeline::{CropRegion, analyze_with_diagnostics};

use super::{AnalysisArgs, parse_crop};
use crate::StdClock;

#[derive(Args, Debug)]
pub struct StagesArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    pub image: PathBuf,

    /// Crop the image to `x1,y1,x2,y2` first.
    #[arg(long, value_parser = parse_crop, allow_hyphen_values = true)]
    pub crop: Option<CropRegion>,

    /// Write every stage raster as PNG into this directory.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

pub fn run(args: &StagesArgs) -> Result<()> {
    let config = args.analysis.to_config()?;
    let mut frame = crystal_io::load_frame(&args.image)?;
    if let Some(crop) = args.crop {
        frame = crop.crop(&frame)?;
    }
    eprintln!(
        "Image: {} ({}x{})",
        args.image.display(),
        frame.width(),
        frame.height(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!();

    let (analysis, diagnostics) =
        analyze_with_diagnostics(&frame, &config, &StdClock).context("running the pipeline")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        println!("{}", diagnostics.report());
    }

    if let Some(ref dir) = args.out {
        let paths = crystal_io::dump_stages(dir, analysis.stages())?;
        eprintln!("{} stage images written to {}", paths.len(), dir.display());
    }
    Ok(())
}

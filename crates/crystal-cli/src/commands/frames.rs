use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use crystal_pipeline::{FrameLibrary, FrameProcessingConfig, FrameSourceKind};

use super::RangeArgs;

#[derive(Args, Debug)]
pub struct FramesArgs {
    /// Directory of frame images, read in file-name order.
    pub frames: PathBuf,

    /// Cache directory for the dumped frame sets.
    #[arg(long)]
    pub out: PathBuf,

    /// Frame processing config as a JSON file.
    #[arg(long)]
    pub processing_config: Option<PathBuf>,

    /// Process frames on all cores.
    #[arg(long)]
    pub parallel: bool,

    #[command(flatten)]
    pub range: RangeArgs,
}

pub fn run(args: &FramesArgs) -> Result<()> {
    let config: FrameProcessingConfig = match args.processing_config {
        Some(ref path) => crystal_io::load_json(path)?,
        None => FrameProcessingConfig::default(),
    };

    let frames = crystal_io::load_frames_from_dir(&args.frames)?;
    if frames.is_empty() {
        bail!("no frame images found in {}", args.frames.display());
    }
    let range = args.range.range(frames.len())?;
    let selected = range.select(&frames)?.to_vec();

    let library = FrameLibrary::with_processed(selected, &config, args.parallel)?;
    for kind in FrameSourceKind::ALL {
        let paths =
            crystal_io::dump_frames(&args.out, kind.slug(), range.start, library.frames(kind))?;
        println!("{:<10} {} frames", kind.slug(), paths.len());
    }
    Ok(())
}

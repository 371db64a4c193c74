//! Cache-directory dumps of stage rasters and frame sets.
//!
//! Cache files are scratch output and are replaced on every dump.
//! Stages are written as `stage_<n>_<slug>.png` with `n` the position in
//! the stage list; frames as `<prefix>_frame_<i>.png`.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crystal_pipeline::{Frame, Stage, StageImage};

use crate::IoError;
use crate::files::ensure_dir;
use crate::raster::save_png;

/// Write every stage of an analysis under `dir`, creating it if needed.
///
/// Returns the written paths in stage order.
///
/// # Errors
///
/// Returns [`IoError`] if the directory cannot be created or a file
/// cannot be encoded or written.
pub fn dump_stages(dir: &Path, stages: &[Stage]) -> Result<Vec<PathBuf>, IoError> {
    ensure_dir(dir)?;
    let paths = stages
        .iter()
        .enumerate()
        .map(|(n, stage)| {
            let path = dir.join(format!("stage_{n}_{}.png", stage.id.slug()));
            save_png(&path, &stage.image)?;
            debug!(path = %path.display(), stage = %stage.id, "stage dumped");
            Ok(path)
        })
        .collect::<Result<Vec<_>, IoError>>()?;
    info!(dir = %dir.display(), count = paths.len(), "stages dumped");
    Ok(paths)
}

/// Write a frame set under `dir` as `<prefix>_frame_<i>.png`, `i`
/// counting from `first_index`.
///
/// `prefix` is typically a [`crystal_pipeline::FrameSourceKind::slug`]
/// or `"cropped"`.
///
/// # Errors
///
/// Returns [`IoError`] if the directory cannot be created or a file
/// cannot be encoded or written.
pub fn dump_frames(
    dir: &Path,
    prefix: &str,
    first_index: usize,
    frames: &[Frame],
) -> Result<Vec<PathBuf>, IoError> {
    ensure_dir(dir)?;
    let paths = frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            let path = dir.join(format!("{prefix}_frame_{}.png", first_index + i));
            save_png(&path, &StageImage::Rgb(frame.clone()))?;
            Ok(path)
        })
        .collect::<Result<Vec<_>, IoError>>()?;
    info!(dir = %dir.display(), prefix, count = paths.len(), "frames dumped");
    Ok(paths)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crystal_pipeline::{AnalysisConfig, FrameSourceKind, GrayImage, RgbImage, StageId, analyze};
    use image::Rgb;

    #[test]
    fn stage_files_are_numbered_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let frame = RgbImage::from_pixel(120, 90, Rgb([128, 128, 128]));
        let analysis = analyze(&frame, &AnalysisConfig::default()).unwrap();
        let paths = dump_stages(dir.path(), analysis.stages()).unwrap();
        assert_eq!(paths.len(), analysis.stages().len());
        assert!(paths[0].ends_with("stage_0_original.png"));
        assert!(paths[1].ends_with("stage_1_grayscale.png"));
        for path in &paths {
            assert!(path.is_file(), "{}", path.display());
        }
    }

    #[test]
    fn gray_stage_decodes_as_gray() {
        let dir = tempfile::tempdir().unwrap();
        let stages = [Stage {
            id: StageId::CannyEdges,
            image: StageImage::Gray(GrayImage::new(8, 6)),
        }];
        let paths = dump_stages(&dir.path().join("nested"), &stages).unwrap();
        assert!(paths[0].ends_with("stage_0_canny_edges.png"));
        let decoded = image::open(&paths[0]).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[test]
    fn frames_use_prefix_and_offset() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![RgbImage::new(3, 3), RgbImage::new(3, 3)];
        let paths =
            dump_frames(dir.path(), FrameSourceKind::HoughProcessed.slug(), 5, &frames).unwrap();
        assert!(paths[0].ends_with("hough_frame_5.png"));
        assert!(paths[1].ends_with("hough_frame_6.png"));

        let cropped = dump_frames(dir.path(), "cropped", 0, &frames[..1]).unwrap();
        assert!(cropped[0].ends_with("cropped_frame_0.png"));
    }
}

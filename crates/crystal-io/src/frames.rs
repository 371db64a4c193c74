//! Frame sequences from image directories.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crystal_pipeline::Frame;

use crate::IoError;

/// File extensions recognised as frames (lowercase, compared
/// case-insensitively).
pub const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FRAME_EXTENSIONS.iter().any(|f| e.eq_ignore_ascii_case(f)))
}

/// Image files directly inside `dir`, sorted by file name.
///
/// Subdirectories and files with other extensions are skipped.
///
/// # Errors
///
/// Returns [`IoError::Read`] if the directory cannot be listed.
pub fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>, IoError> {
    let read_err = |source| IoError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if is_frame_file(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Decode one image file as an 8-bit RGB frame.
///
/// # Errors
///
/// Returns [`IoError::Decode`] if the file cannot be read or decoded.
pub fn load_frame(path: &Path) -> Result<Frame, IoError> {
    let img = image::open(path).map_err(|source| IoError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), width = img.width(), height = img.height(), "frame loaded");
    Ok(img.to_rgb8())
}

/// Decode every frame in `dir`, in lexical file-name order, as 8-bit
/// RGB. Frame `i` of the result is the `i`-th file.
///
/// # Errors
///
/// Returns [`IoError::Read`] if the directory cannot be listed or
/// [`IoError::Decode`] if a file is not a readable image.
pub fn load_frames_from_dir(dir: &Path) -> Result<Vec<Frame>, IoError> {
    let frames = frame_paths(dir)?
        .into_iter()
        .map(|path| load_frame(&path))
        .collect::<Result<Vec<_>, IoError>>()?;
    info!(dir = %dir.display(), count = frames.len(), "frames loaded");
    Ok(frames)
}

//! crystal-io: File-system sink and source for crystal growth analysis.
//!
//! Loads frame sequences from image directories, writes reports under
//! collision-free names, and dumps stage rasters and processed frame
//! sets to a cache directory. All encoding is delegated to
//! `crystal-export` and `image`; this crate only decides where bytes go.

use std::path::PathBuf;

pub mod cache;
pub mod config;
pub mod files;
pub mod frames;
pub mod raster;
pub mod report;

pub use cache::{dump_frames, dump_stages};
pub use config::load_json;
pub use files::{create_unique, ensure_dir, unique_candidate, write_unique};
pub use frames::{frame_paths, load_frame, load_frames_from_dir};
pub use raster::{encode_png, save_png};
pub use report::{ReportWriter, WrittenReport};

/// Errors from reading or writing files.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create {}: {source}", path.display())]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no free file name for {} after {attempts} attempts", path.display())]
    NamesExhausted { path: PathBuf, attempts: u32 },

    #[error(transparent)]
    Export(#[from] crystal_export::ExportError),
}

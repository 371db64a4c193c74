//! PNG encoding of stage rasters and frames.

use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crystal_pipeline::StageImage;

use crate::IoError;

/// Encode a stage raster as PNG bytes, keeping its channel layout.
///
/// # Errors
///
/// Returns [`IoError::Encode`] if PNG encoding fails.
pub fn encode_png(image: &StageImage) -> Result<Vec<u8>, IoError> {
    let (width, height) = image.dimensions();
    let (raw, color) = match image {
        StageImage::Rgb(img) => (img.as_raw(), ExtendedColorType::Rgb8),
        StageImage::Gray(img) => (img.as_raw(), ExtendedColorType::L8),
    };
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(raw, width, height, color)?;
    Ok(bytes)
}

/// Encode `image` and write it to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`IoError::Encode`] or [`IoError::Write`].
pub fn save_png(path: &Path, image: &StageImage) -> Result<(), IoError> {
    let bytes = encode_png(image)?;
    std::fs::write(path, bytes).map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

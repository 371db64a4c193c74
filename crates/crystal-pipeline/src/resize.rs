//! Frame resizing to the analysis bounding box.
//!
//! Shrinks the input frame so it fits within `max_width` x `max_height`
//! while preserving its aspect ratio. This is the first processing step,
//! and its output is stage 0 of every analysis: all pixel measurements
//! are expressed in resized-image units.
//!
//! If the frame already fits, it is returned unchanged.

use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::types::ResizeConfig;

/// Resampling filter used when shrinking.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResizeFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Compute the output dimensions for a `width` x `height` frame.
///
/// The scale factor is taken from whichever side is longest *relative to
/// its bound*, so the result never exceeds either bound. Each side is
/// floored and kept at least 1 pixel. Returns the input dimensions when
/// they already fit.
#[must_use]
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    // Integer cross-multiplication picks the limiting side without
    // floating-point rounding at the bound.
    let (w, h) = (u64::from(width), u64::from(height));
    let (max_w, max_h) = (u64::from(max_width), u64::from(max_height));

    let (new_w, new_h) = if w * max_h >= h * max_w {
        (max_w, (h * max_w / w).max(1))
    } else {
        ((w * max_h / h).max(1), max_h)
    };

    // Both values are bounded by the u32 maxima above.
    #[allow(clippy::cast_possible_truncation)]
    (new_w as u32, new_h as u32)
}

/// Resize a frame to fit the configured bounds.
///
/// Returns the (possibly unchanged) image and whether resampling was
/// actually applied. A frame that already fits is cloned pixel for
/// pixel.
#[must_use]
pub fn resize(frame: &RgbImage, config: &ResizeConfig) -> (RgbImage, bool) {
    let (w, h) = (frame.width(), frame.height());
    let (new_w, new_h) = fit_dimensions(w, h, config.max_width, config.max_height);

    if (new_w, new_h) == (w, h) {
        return (frame.clone(), false);
    }

    let resized = image::imageops::resize(frame, new_w, new_h, config.filter.to_image_filter());
    (resized, true)
}

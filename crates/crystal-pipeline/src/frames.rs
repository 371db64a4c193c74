//! Frame source: the original frames plus their derived sets, frame
//! range selection and cropping.
//!
//! The two derived sets share one edge mask per frame: grayscale,
//! Gaussian blur, Canny, dilation and closing. Hough-processed frames
//! overlay the probabilistic Hough segments of that mask;
//! contour-processed frames overlay the outer contours enclosing more
//! than a minimum area. Both are index-aligned with the originals.

use std::ops::RangeInclusive;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{CannyConfig, Frame, GrayImage, HoughConfig, PipelineError};

/// Selects one of the frame sets held by a [`FrameLibrary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FrameSourceKind {
    #[default]
    Original,
    HoughProcessed,
    ContourProcessed,
}

impl FrameSourceKind {
    pub const ALL: [Self; 3] = [Self::Original, Self::HoughProcessed, Self::ContourProcessed];

    /// File name prefix used when dumping frames of this kind.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::HoughProcessed => "hough",
            Self::ContourProcessed => "contour",
        }
    }
}

/// Parameters of the derived frame sets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameProcessingConfig {
    /// Gaussian blur kernel side (odd).
    pub blur_kernel: u32,
    pub canny: CannyConfig,
    /// Square dilation element side (odd).
    pub dilation_kernel: u32,
    /// Square closing element side (odd).
    pub closing_kernel: u32,
    pub hough: HoughConfig,
    /// Contours enclosing this many square pixels or fewer are dropped.
    pub min_contour_area: f64,
}

impl FrameProcessingConfig {
    pub const DEFAULT_BLUR_KERNEL: u32 = 11;
    pub const DEFAULT_CANNY_LOW: f32 = 100.0;
    pub const DEFAULT_CANNY_HIGH: f32 = 200.0;
    pub const DEFAULT_DILATION_KERNEL: u32 = 5;
    pub const DEFAULT_CLOSING_KERNEL: u32 = 5;
    pub const DEFAULT_HOUGH_THRESHOLD: u32 = 100;
    pub const DEFAULT_MIN_LINE_LENGTH: u32 = 50;
    pub const DEFAULT_MIN_CONTOUR_AREA: f64 = 100.0;

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for even or zero kernels,
    /// inverted Canny thresholds, a zero vote threshold, or a negative
    /// area bound.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, kernel) in [
            ("processing blur kernel", self.blur_kernel),
            ("dilation kernel", self.dilation_kernel),
            ("processing closing kernel", self.closing_kernel),
        ] {
            if kernel % 2 == 0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be odd and at least 1, got {kernel}",
                )));
            }
        }
        if !(self.canny.low >= 0.0 && self.canny.low <= self.canny.high) {
            return Err(PipelineError::InvalidConfig(format!(
                "Canny thresholds must satisfy 0 <= low <= high, got {} / {}",
                self.canny.low, self.canny.high,
            )));
        }
        if self.hough.threshold == 0
            || !(self.hough.rho_resolution > 0.0 && self.hough.theta_resolution > 0.0)
        {
            return Err(PipelineError::InvalidConfig(
                "Hough threshold and resolutions must be positive".to_string(),
            ));
        }
        if self.min_contour_area.is_nan() || self.min_contour_area < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "minimum contour area must be non-negative, got {}",
                self.min_contour_area,
            )));
        }
        Ok(())
    }
}

impl Default for FrameProcessingConfig {
    fn default() -> Self {
        Self {
            blur_kernel: Self::DEFAULT_BLUR_KERNEL,
            canny: CannyConfig {
                low: Self::DEFAULT_CANNY_LOW,
                high: Self::DEFAULT_CANNY_HIGH,
            },
            dilation_kernel: Self::DEFAULT_DILATION_KERNEL,
            closing_kernel: Self::DEFAULT_CLOSING_KERNEL,
            hough: HoughConfig {
                threshold: Self::DEFAULT_HOUGH_THRESHOLD,
                min_line_length: Self::DEFAULT_MIN_LINE_LENGTH,
                ..HoughConfig::default()
            },
            min_contour_area: Self::DEFAULT_MIN_CONTOUR_AREA,
        }
    }
}

/// Edge mask shared by both derived frame sets.
#[must_use]
pub fn edge_mask(frame: &Frame, config: &FrameProcessingConfig) -> GrayImage {
    let gray = crate::grayscale::to_grayscale(frame);
    let blurred = crate::blur::gaussian_blur(&gray, config.blur_kernel);
    let edges = crate::canny::canny(&blurred, config.canny.low, config.canny.high);
    let dilated = crate::morphology::dilate(&edges, config.dilation_kernel);
    crate::morphology::close(&dilated, config.closing_kernel)
}

/// Copy of `frame` with the Hough segments of its edge mask drawn on.
#[must_use]
pub fn hough_processed(frame: &Frame, config: &FrameProcessingConfig) -> Frame {
    hough_overlay(frame, &edge_mask(frame, config), config)
}

/// Copy of `frame` with the large outer contours of its edge mask drawn
/// on.
#[must_use]
pub fn contour_processed(frame: &Frame, config: &FrameProcessingConfig) -> Frame {
    contour_overlay(frame, &edge_mask(frame, config), config)
}

fn hough_overlay(frame: &Frame, mask: &GrayImage, config: &FrameProcessingConfig) -> Frame {
    let segments = crate::hough::detect_segments(mask, &config.hough);
    crate::draw::draw_segments(frame, &segments)
}

fn contour_overlay(frame: &Frame, mask: &GrayImage, config: &FrameProcessingConfig) -> Frame {
    let rings: Vec<_> = crate::contour::outer_contours(mask)
        .into_iter()
        .filter(|ring| crate::contour::polygon_area(ring) > config.min_contour_area)
        .collect();
    crate::draw::draw_rings(frame, &rings)
}

/// Original frames and, once processed, the two derived sets.
///
/// Frames are indexed from 0 without gaps. A derived set is either empty
/// (not yet processed) or exactly as long as the originals.
#[derive(Debug, Clone, Default)]
pub struct FrameLibrary {
    original: Vec<Frame>,
    hough: Vec<Frame>,
    contour: Vec<Frame>,
}

impl FrameLibrary {
    /// A library holding only the original frames.
    #[must_use]
    pub const fn new(frames: Vec<Frame>) -> Self {
        Self {
            original: frames,
            hough: Vec::new(),
            contour: Vec::new(),
        }
    }

    /// A library with both derived sets computed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` is invalid.
    pub fn with_processed(
        frames: Vec<Frame>,
        config: &FrameProcessingConfig,
        parallel: bool,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let derive = |frame: &Frame| {
            let mask = edge_mask(frame, config);
            (hough_overlay(frame, &mask, config), contour_overlay(frame, &mask, config))
        };
        let (hough, contour): (Vec<Frame>, Vec<Frame>) = if parallel {
            frames.par_iter().map(derive).unzip()
        } else {
            frames.iter().map(derive).unzip()
        };
        info!(frames = frames.len(), "derived frame sets processed");
        Ok(Self {
            original: frames,
            hough,
            contour,
        })
    }

    #[must_use]
    pub fn original(&self) -> &[Frame] {
        &self.original
    }

    #[must_use]
    pub fn hough_processed(&self) -> &[Frame] {
        &self.hough
    }

    #[must_use]
    pub fn contour_processed(&self) -> &[Frame] {
        &self.contour
    }

    /// The frame set selected by `kind`.
    #[must_use]
    pub fn frames(&self, kind: FrameSourceKind) -> &[Frame] {
        match kind {
            FrameSourceKind::Original => self.original(),
            FrameSourceKind::HoughProcessed => self.hough_processed(),
            FrameSourceKind::ContourProcessed => self.contour_processed(),
        }
    }

    #[must_use]
    pub fn get(&self, kind: FrameSourceKind, index: usize) -> Option<&Frame> {
        self.frames(kind).get(index)
    }

    /// Number of original frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.original.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Whether the derived sets have been computed.
    #[must_use]
    pub fn is_processed(&self) -> bool {
        !self.is_empty() && self.hough.len() == self.len()
    }
}

/// Inclusive range of frame indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: usize,
    pub end: usize,
}

impl FrameRange {
    /// A validated range over `len` frames.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] unless
    /// `start <= end < len`.
    pub fn new(start: usize, end: usize, len: usize) -> Result<Self, PipelineError> {
        let range = Self { start, end };
        range.validate(len)?;
        Ok(range)
    }

    /// `before` frames before `current` through `after` frames after it,
    /// clamped to the available frames.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `current` is not a
    /// valid frame index.
    pub fn centered(
        current: usize,
        before: usize,
        after: usize,
        len: usize,
    ) -> Result<Self, PipelineError> {
        if current >= len {
            return Err(PipelineError::InvalidConfig(format!(
                "current frame {current} is out of range for {len} frames",
            )));
        }
        let start = current.saturating_sub(before);
        let end = current.saturating_add(after).min(len - 1);
        Ok(Self { start, end })
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] unless
    /// `start <= end < len`.
    pub fn validate(&self, len: usize) -> Result<(), PipelineError> {
        if self.start > self.end || self.end >= len {
            return Err(PipelineError::InvalidConfig(format!(
                "frame range {}..={} is invalid for {len} frames",
                self.start, self.end,
            )));
        }
        Ok(())
    }

    #[must_use]
    pub const fn indices(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }

    /// The frames covered by this range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the range does not fit
    /// `frames`.
    pub fn select<'a>(&self, frames: &'a [Frame]) -> Result<&'a [Frame], PipelineError> {
        self.validate(frames.len())?;
        debug!(start = self.start, end = self.end, "frame range selected");
        Ok(&frames[self.indices()])
    }
}

/// Rectangular crop in display coordinates.
///
/// The corners may be given in any order. They are multiplied by the
/// display-to-source scale factors and truncated to whole pixels before
/// cropping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl CropRegion {
    /// A crop given directly in source pixels.
    #[must_use]
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    #[must_use]
    pub const fn with_scale(mut self, scale_x: f64, scale_y: f64) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// Source-pixel rectangle `(x, y, width, height)` clamped to a
    /// `width` x `height` frame.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for non-finite values or
    /// a crop that is empty after clamping.
    pub fn source_rect(
        &self,
        width: u32,
        height: u32,
    ) -> Result<(u32, u32, u32, u32), PipelineError> {
        let values = [self.x1, self.y1, self.x2, self.y2, self.scale_x, self.scale_y];
        if values.iter().any(|v| !v.is_finite()) || self.scale_x <= 0.0 || self.scale_y <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!("invalid crop region {self:?}")));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let to_pixel = |v: f64, scale: f64, limit: u32| {
            (v * scale).trunc().clamp(0.0, f64::from(limit)) as u32
        };
        let (xa, xb) = (
            to_pixel(self.x1, self.scale_x, width),
            to_pixel(self.x2, self.scale_x, width),
        );
        let (ya, yb) = (
            to_pixel(self.y1, self.scale_y, height),
            to_pixel(self.y2, self.scale_y, height),
        );
        let (x0, x1) = (xa.min(xb), xa.max(xb));
        let (y0, y1) = (ya.min(yb), ya.max(yb));
        if x0 == x1 || y0 == y1 {
            return Err(PipelineError::InvalidConfig(format!(
                "crop region {self:?} is empty within a {width}x{height} frame",
            )));
        }
        Ok((x0, y0, x1 - x0, y1 - y0))
    }

    /// Cropped copy of `frame`.
    ///
    /// # Errors
    ///
    /// See [`source_rect`](Self::source_rect).
    pub fn crop(&self, frame: &Frame) -> Result<Frame, PipelineError> {
        let (x, y, w, h) = self.source_rect(frame.width(), frame.height())?;
        Ok(image::imageops::crop_imm(frame, x, y, w, h).to_image())
    }

    /// Crop every frame.
    ///
    /// # Errors
    ///
    /// Fails on the first frame the crop does not fit.
    pub fn crop_all(&self, frames: &[Frame]) -> Result<Vec<Frame>, PipelineError> {
        frames.iter().map(|frame| self.crop(frame)).collect()
    }
}

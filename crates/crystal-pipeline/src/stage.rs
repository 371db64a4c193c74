//! Stage identifiers, stage rasters, and stage navigation.
//!
//! Every analysis records its intermediate rasters as an ordered list
//! of [`Stage`]s, index 0 being the resized frame. [`StageCursor`]
//! steps through such a list the way an inspection view would.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{GrayImage, RgbImage};

/// Identifier for one recorded pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageId {
    /// Resized input frame.
    Original,
    /// Single-channel luminance.
    Grayscale,
    /// CLAHE output.
    ContrastEnhanced,
    /// Gaussian blur.
    Blurred,
    /// Gaussian adaptive threshold.
    AdaptiveThreshold,
    /// Morphological closing of the threshold mask.
    MorphologicalClosing,
    /// Canny edge map.
    CannyEdges,
    /// Hough segments overlaid on the resized frame.
    HoughLines,
    /// Rotated bounding box overlaid on the resized frame.
    BoundingBox,
}

impl StageId {
    /// All stages in pipeline order.
    pub const ALL: [Self; 9] = [
        Self::Original,
        Self::Grayscale,
        Self::ContrastEnhanced,
        Self::Blurred,
        Self::AdaptiveThreshold,
        Self::MorphologicalClosing,
        Self::CannyEdges,
        Self::HoughLines,
        Self::BoundingBox,
    ];

    /// Full display label for the stage.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Original => "Original",
            Self::Grayscale => "Grayscale",
            Self::ContrastEnhanced => "Contrast Enhanced",
            Self::Blurred => "Blurred",
            Self::AdaptiveThreshold => "Adaptive Threshold",
            Self::MorphologicalClosing => "Morphological Closing",
            Self::CannyEdges => "Canny Edges",
            Self::HoughLines => "Hough Lines",
            Self::BoundingBox => "Bounding Box",
        }
    }

    /// Lowercase identifier safe for file names.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Grayscale => "grayscale",
            Self::ContrastEnhanced => "contrast_enhanced",
            Self::Blurred => "blurred",
            Self::AdaptiveThreshold => "adaptive_threshold",
            Self::MorphologicalClosing => "morphological_closing",
            Self::CannyEdges => "canny_edges",
            Self::HoughLines => "hough_lines",
            Self::BoundingBox => "bounding_box",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raster produced by a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageImage {
    Rgb(RgbImage),
    Gray(GrayImage),
}

impl StageImage {
    /// Width and height in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Rgb(img) => img.dimensions(),
            Self::Gray(img) => img.dimensions(),
        }
    }

    /// Three-channel copy, expanding grayscale if needed.
    #[must_use]
    pub fn to_rgb(&self) -> RgbImage {
        match self {
            Self::Rgb(img) => img.clone(),
            Self::Gray(img) => crate::grayscale::to_rgb(img),
        }
    }
}

/// One recorded intermediate raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub id: StageId,
    pub image: StageImage,
}

impl Stage {
    #[must_use]
    pub const fn rgb(id: StageId, image: RgbImage) -> Self {
        Self {
            id,
            image: StageImage::Rgb(image),
        }
    }

    #[must_use]
    pub const fn gray(id: StageId, image: GrayImage) -> Self {
        Self {
            id,
            image: StageImage::Gray(image),
        }
    }
}

/// Position within a stage list.
///
/// Moving past either end clamps to the first or last stage.
#[derive(Debug, Clone, Copy)]
pub struct StageCursor<'a> {
    stages: &'a [Stage],
    index: usize,
}

impl<'a> StageCursor<'a> {
    /// Cursor on the first stage.
    #[must_use]
    pub const fn new(stages: &'a [Stage]) -> Self {
        Self { stages, index: 0 }
    }

    /// Cursor on the last stage, the natural starting view after an
    /// analysis.
    #[must_use]
    pub const fn at_end(stages: &'a [Stage]) -> Self {
        Self {
            stages,
            index: stages.len().saturating_sub(1),
        }
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The stage under the cursor, `None` for an empty list.
    #[must_use]
    pub fn current(&self) -> Option<&'a Stage> {
        self.stages.get(self.index)
    }

    /// Step forward one stage.
    pub fn forward(&mut self) -> Option<&'a Stage> {
        if self.index + 1 < self.stages.len() {
            self.index += 1;
        }
        self.current()
    }

    /// Step back one stage.
    pub fn backward(&mut self) -> Option<&'a Stage> {
        self.index = self.index.saturating_sub(1);
        self.current()
    }
}

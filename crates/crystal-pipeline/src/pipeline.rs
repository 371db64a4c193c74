//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::analyze`] which runs the entire analysis in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use crystal_pipeline::{AnalysisConfig, Pipeline, PipelineError, RgbImage};
//! # fn run(frame: RgbImage) -> Result<(), PipelineError> {
//! let analysis = Pipeline::new(frame, AnalysisConfig::default())
//!     .resize()?
//!     .grayscale()
//!     .enhance_contrast()
//!     .blur()
//!     .threshold()
//!     .close()
//!     .detect_edges()
//!     .detect_lines()
//!     .fit_box();
//!
//! let measurement = analysis.measurement();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! appending exactly one [`Stage`] to the recorded list. Earlier stages
//! are never touched again, so the list held by the final [`Analysis`]
//! is exactly the sequence of rasters the analysis saw. Only
//! [`Pending::resize`] is fallible: it validates the configuration and
//! rejects empty frames before any work is done.

use tracing::{debug, info, warn};

use crate::bbox::FurthestPair;
use crate::stage::{Stage, StageId};
use crate::types::{
    AnalysisConfig, Frame, GrayImage, LineSegment, Measurement, PipelineError, RgbImage,
    RotatedBox,
};

/// State shared by every step after resizing.
struct Trail {
    config: AnalysisConfig,
    /// The resized frame; overlays are drawn on copies of it.
    resized: RgbImage,
    stages: Vec<Stage>,
}

impl Trail {
    fn push_gray(&mut self, id: StageId, image: &GrayImage) {
        debug!(stage = id.label(), "stage complete");
        self.stages.push(Stage::gray(id, image.clone()));
    }
}

// ───────────────────────── Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`resize`](Self::resize) to begin.
#[must_use = "pipeline stages are consumed by advancing; call .resize() to continue"]
pub struct Pending {
    config: AnalysisConfig,
    frame: Frame,
}

impl Pending {
    /// The input frame.
    #[must_use]
    pub const fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Validate the configuration and shrink the frame into the
    /// configured bounds.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the configuration is
    /// invalid, or [`PipelineError::EmptyFrame`] if the frame has no
    /// pixels.
    pub fn resize(self) -> Result<Resized, PipelineError> {
        self.config.validate()?;
        let (width, height) = self.frame.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::EmptyFrame { width, height });
        }
        let (resized, applied) = crate::resize::resize(&self.frame, &self.config.resize);
        debug!(
            from_width = width,
            from_height = height,
            width = resized.width(),
            height = resized.height(),
            applied,
            "resized frame",
        );
        let stages = vec![Stage::rgb(StageId::Original, resized.clone())];
        Ok(Resized {
            trail: Trail {
                config: self.config,
                resized,
                stages,
            },
            applied,
        })
    }
}

// ───────────────────────── Resized ──────────────────────────

/// Pipeline state after resizing. Call [`grayscale`](Self::grayscale).
#[must_use = "pipeline stages are consumed by advancing; call .grayscale() to continue"]
pub struct Resized {
    trail: Trail,
    applied: bool,
}

impl Resized {
    /// The resized frame (stage 0).
    #[must_use]
    pub const fn resized(&self) -> &RgbImage {
        &self.trail.resized
    }

    /// Whether resampling was actually applied.
    #[must_use]
    pub const fn applied(&self) -> bool {
        self.applied
    }

    /// Advance to the grayscale stage.
    pub fn grayscale(mut self) -> Grayscale {
        let gray = crate::grayscale::to_grayscale(&self.trail.resized);
        self.trail.push_gray(StageId::Grayscale, &gray);
        Grayscale {
            trail: self.trail,
            gray,
        }
    }
}

// ───────────────────────── Grayscale ──────────────────────────

/// Pipeline state after luminance conversion.
#[must_use = "pipeline stages are consumed by advancing; call .enhance_contrast() to continue"]
pub struct Grayscale {
    trail: Trail,
    gray: GrayImage,
}

impl Grayscale {
    #[must_use]
    pub const fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// Advance to the CLAHE stage.
    pub fn enhance_contrast(mut self) -> ContrastEnhanced {
        let enhanced = crate::contrast::clahe(&self.gray, &self.trail.config.clahe);
        self.trail.push_gray(StageId::ContrastEnhanced, &enhanced);
        ContrastEnhanced {
            trail: self.trail,
            enhanced,
        }
    }
}

// ───────────────────────── ContrastEnhanced ──────────────────────────

/// Pipeline state after CLAHE.
#[must_use = "pipeline stages are consumed by advancing; call .blur() to continue"]
pub struct ContrastEnhanced {
    trail: Trail,
    enhanced: GrayImage,
}

impl ContrastEnhanced {
    #[must_use]
    pub const fn enhanced(&self) -> &GrayImage {
        &self.enhanced
    }

    /// Advance to the blur stage.
    pub fn blur(mut self) -> Blurred {
        let blurred = crate::blur::gaussian_blur(&self.enhanced, self.trail.config.blur_kernel);
        self.trail.push_gray(StageId::Blurred, &blurred);
        Blurred {
            trail: self.trail,
            blurred,
        }
    }
}

// ───────────────────────── Blurred ──────────────────────────

/// Pipeline state after Gaussian blur.
#[must_use = "pipeline stages are consumed by advancing; call .threshold() to continue"]
pub struct Blurred {
    trail: Trail,
    blurred: GrayImage,
}

impl Blurred {
    #[must_use]
    pub const fn blurred(&self) -> &GrayImage {
        &self.blurred
    }

    /// Advance to the adaptive threshold stage.
    pub fn threshold(mut self) -> Thresholded {
        let binary = crate::threshold::adaptive_threshold(&self.blurred, &self.trail.config.threshold);
        self.trail.push_gray(StageId::AdaptiveThreshold, &binary);
        Thresholded {
            trail: self.trail,
            binary,
        }
    }
}

// ───────────────────────── Thresholded ──────────────────────────

/// Pipeline state after adaptive thresholding.
#[must_use = "pipeline stages are consumed by advancing; call .close() to continue"]
pub struct Thresholded {
    trail: Trail,
    binary: GrayImage,
}

impl Thresholded {
    #[must_use]
    pub const fn binary(&self) -> &GrayImage {
        &self.binary
    }

    /// Advance to the morphological closing stage.
    pub fn close(mut self) -> Closed {
        let closed = crate::morphology::close(&self.binary, self.trail.config.closing_kernel);
        self.trail.push_gray(StageId::MorphologicalClosing, &closed);
        Closed {
            trail: self.trail,
            closed,
        }
    }
}

// ───────────────────────── Closed ──────────────────────────

/// Pipeline state after closing.
#[must_use = "pipeline stages are consumed by advancing; call .detect_edges() to continue"]
pub struct Closed {
    trail: Trail,
    closed: GrayImage,
}

impl Closed {
    #[must_use]
    pub const fn closed(&self) -> &GrayImage {
        &self.closed
    }

    /// Advance to the Canny stage.
    pub fn detect_edges(mut self) -> EdgesDetected {
        let canny = self.trail.config.canny;
        let edges = crate::canny::canny(&self.closed, canny.low, canny.high);
        self.trail.push_gray(StageId::CannyEdges, &edges);
        EdgesDetected {
            trail: self.trail,
            edges,
        }
    }
}

// ───────────────────────── EdgesDetected ──────────────────────────

/// Pipeline state after edge detection.
#[must_use = "pipeline stages are consumed by advancing; call .detect_lines() to continue"]
pub struct EdgesDetected {
    trail: Trail,
    edges: GrayImage,
}

impl EdgesDetected {
    #[must_use]
    pub const fn edges(&self) -> &GrayImage {
        &self.edges
    }

    /// Run the Hough transform and record the line overlay.
    ///
    /// The overlay stage is always recorded; without segments it is an
    /// unmodified copy of the resized frame.
    pub fn detect_lines(mut self) -> LinesDetected {
        let segments = crate::hough::detect_segments(&self.edges, &self.trail.config.hough);
        let overlay = crate::draw::draw_segments(&self.trail.resized, &segments);
        debug!(stage = StageId::HoughLines.label(), segments = segments.len(), "stage complete");
        self.trail.stages.push(Stage::rgb(StageId::HoughLines, overlay));
        LinesDetected {
            trail: self.trail,
            segments,
        }
    }
}

// ───────────────────────── LinesDetected ──────────────────────────

/// Pipeline state after line detection.
#[must_use = "pipeline stages are consumed by advancing; call .fit_box() to continue"]
pub struct LinesDetected {
    trail: Trail,
    segments: Vec<LineSegment>,
}

impl LinesDetected {
    #[must_use]
    pub fn segments(&self) -> &[LineSegment] {
        &self.segments
    }

    /// Fit the rotated bounding box and finish the analysis.
    ///
    /// The bounding-box stage is appended only when a box was found.
    pub fn fit_box(mut self) -> Analysis {
        let strategy: &dyn FurthestPair = &self.trail.config.furthest_pair;
        let rotated_box = crate::bbox::fit_rotated_box(&self.segments, strategy);

        if let Some(rect) = rotated_box {
            let overlay = crate::draw::draw_rotated_box(&self.trail.resized, &rect);
            self.trail.stages.push(Stage::rgb(StageId::BoundingBox, overlay));
            info!(
                width = rect.width,
                height = rect.height,
                angle = rect.angle,
                "crystal measured",
            );
        } else {
            warn!("no line segments detected; frame has no measurement");
        }

        Analysis {
            stages: self.trail.stages,
            segments: self.segments,
            rotated_box,
        }
    }
}

// ───────────────────────── Analysis ──────────────────────────

/// Result of analyzing one frame.
///
/// A fresh value per frame; nothing is shared between analyses.
#[derive(Debug, Clone)]
pub struct Analysis {
    stages: Vec<Stage>,
    segments: Vec<LineSegment>,
    rotated_box: Option<RotatedBox>,
}

impl Analysis {
    /// Every recorded stage in pipeline order, starting with the resized
    /// frame.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Consume the analysis, keeping only the stage list.
    #[must_use]
    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }

    /// Hough segments the box was fitted to.
    #[must_use]
    pub fn segments(&self) -> &[LineSegment] {
        &self.segments
    }

    #[must_use]
    pub const fn rotated_box(&self) -> Option<&RotatedBox> {
        self.rotated_box.as_ref()
    }

    /// Width, height and angle, or `None` when no lines were found.
    #[must_use]
    pub fn measurement(&self) -> Option<Measurement> {
        self.rotated_box.map(Measurement::from)
    }

    /// The last recorded stage.
    #[must_use]
    pub fn final_stage(&self) -> Option<&Stage> {
        self.stages.last()
    }
}

/// Entry point for the incremental pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a frame and config.
    ///
    /// No processing is performed. Call [`.resize()`](Pending::resize) to
    /// begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(frame: Frame, config: AnalysisConfig) -> Pending {
        Pending { config, frame }
    }
}

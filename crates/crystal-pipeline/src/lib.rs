//! crystal-pipeline: crystal shape analysis and growth-rate aggregation
//! (sans-IO).
//!
//! Measures a crystal in a microscopy frame through:
//! resize -> grayscale -> CLAHE -> blur -> adaptive threshold ->
//! closing -> Canny -> probabilistic Hough -> rotated bounding box,
//! recording every intermediate raster as a [`Stage`]. The resulting
//! per-frame [`MeasurementRecord`]s are reduced to a growth-rate series
//! by [`growth::aggregate`].
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! frames and returns structured data. Serialization lives in
//! `crystal-export`, file-system access in `crystal-io`.

pub mod analyzer;
pub mod bbox;
pub mod blur;
pub mod canny;
pub mod contour;
pub mod contrast;
pub mod detector;
pub mod diagnostics;
pub mod draw;
pub mod frames;
pub mod grayscale;
pub mod growth;
pub mod hough;
pub mod morphology;
pub mod pipeline;
pub mod resize;
pub mod stage;
pub mod threshold;
pub mod types;

pub use analyzer::{
    DETECTOR_REPORT_NAME, DetectorSource, MeasurementSource, SHAPE_REPORT_NAME, ShapeAnalyzer,
    analyze, analyze_frames,
};
pub use bbox::{FurthestPair, FurthestPairKind};
pub use detector::{ClassLabels, Detection, Detector};
pub use diagnostics::{AnalysisDiagnostics, Clock, analyze_with_diagnostics};
pub use frames::{CropRegion, FrameLibrary, FrameProcessingConfig, FrameRange, FrameSourceKind};
pub use growth::{
    AggregatedSeries, GapPolicy, GrowthSummary, MeasurementMode, ScaleConfig, SeriesRow, aggregate,
};
pub use pipeline::{Analysis, Pipeline};
pub use resize::ResizeFilter;
pub use stage::{Stage, StageCursor, StageId, StageImage};
pub use types::{
    AnalysisConfig, CannyConfig, ClaheConfig, Frame, GrayImage, HoughConfig,
    LineSegment, Measurement, MeasurementRecord, PipelineError, Point, ResizeConfig, RgbImage,
    RotatedBox, ThresholdConfig,
};

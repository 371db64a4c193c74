//! Shared types for the crystal shape analysis pipeline.

use serde::{Deserialize, Serialize};

use crate::bbox::FurthestPairKind;
use crate::resize::ResizeFilter;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference frames and
/// annotated stages without depending on `image` directly.
pub use image::RgbImage;

/// One captured video frame: 8-bit, three channels.
///
/// Frames are owned by the frame source and never mutated by the
/// pipeline; annotations are always drawn on a copy.
pub type Frame = RgbImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// A straight line segment reported by the Hough transform.
///
/// Endpoints lie on the integer pixel grid of the edge map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Point,
    pub end: Point,
}

impl LineSegment {
    #[must_use]
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Segment length in pixels.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }
}

/// A rectangle rotated about its center.
///
/// `width` and `height` are measured along the rectangle's own axes;
/// `angle` is the rotation of the width axis in degrees, counter to the
/// image y-axis (image coordinates, y pointing down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotatedBox {
    pub center: Point,
    pub width: f64,
    pub height: f64,
    /// Rotation in degrees, within `(-180, 180]`.
    pub angle: f64,
}

impl RotatedBox {
    /// The four corner points, in drawing order.
    ///
    /// Same ordering as OpenCV's `boxPoints`: bottom-left, top-left,
    /// top-right, bottom-right of the unrotated rectangle.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let (a, b) = (sin * 0.5, cos * 0.5);
        let (cx, cy) = (self.center.x, self.center.y);
        let (w, h) = (self.width, self.height);

        let p0 = Point::new(cx - a * h - b * w, cy + b * h - a * w);
        let p1 = Point::new(cx + a * h - b * w, cy - b * h - a * w);
        let p2 = Point::new(2.0f64.mul_add(cx, -p0.x), 2.0f64.mul_add(cy, -p0.y));
        let p3 = Point::new(2.0f64.mul_add(cx, -p1.x), 2.0f64.mul_add(cy, -p1.y));
        [p0, p1, p2, p3]
    }
}

/// The measurement produced for one analyzed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Span along the crystal's principal axis, in resized-image pixels.
    pub width: f64,
    /// Span across the principal axis, in resized-image pixels.
    pub height: f64,
    /// Orientation of the principal axis in degrees.
    pub angle: f64,
}

impl From<RotatedBox> for Measurement {
    fn from(rect: RotatedBox) -> Self {
        Self {
            width: rect.width,
            height: rect.height,
            angle: rect.angle,
        }
    }
}

/// One row of the raw measurement table.
///
/// Missing fields mean the source produced no measurement for that
/// frame. The record still occupies its frame slot so the time axis is
/// never re-indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// 0-based frame index.
    pub frame: usize,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub angle: Option<f64>,
    /// Class label from an external detector; `None` for the shape
    /// analyzer.
    pub class_label: Option<String>,
}

impl MeasurementRecord {
    /// Build a record from a shape-analysis outcome.
    #[must_use]
    pub fn from_measurement(frame: usize, measurement: Option<Measurement>) -> Self {
        Self {
            frame,
            width: measurement.map(|m| m.width),
            height: measurement.map(|m| m.height),
            angle: measurement.map(|m| m.angle),
            class_label: None,
        }
    }

    /// A record for a frame that produced nothing.
    #[must_use]
    pub const fn missing(frame: usize) -> Self {
        Self {
            frame,
            width: None,
            height: None,
            angle: None,
            class_label: None,
        }
    }

    /// Whether both extents are present.
    #[must_use]
    pub const fn has_extents(&self) -> bool {
        self.width.is_some() && self.height.is_some()
    }
}

/// Resize stage parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    /// Maximum output width in pixels.
    pub max_width: u32,
    /// Maximum output height in pixels.
    pub max_height: u32,
    /// Resampling filter used when the frame has to shrink.
    pub filter: ResizeFilter,
}

impl ResizeConfig {
    pub const DEFAULT_MAX_WIDTH: u32 = 800;
    pub const DEFAULT_MAX_HEIGHT: u32 = 600;
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            max_width: Self::DEFAULT_MAX_WIDTH,
            max_height: Self::DEFAULT_MAX_HEIGHT,
            filter: ResizeFilter::default(),
        }
    }
}

/// Contrast-limited adaptive histogram equalization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaheConfig {
    /// Histogram clip limit, relative to a uniform histogram.
    pub clip_limit: f64,
    /// Number of tile columns.
    pub tiles_x: u32,
    /// Number of tile rows.
    pub tiles_y: u32,
}

impl ClaheConfig {
    pub const DEFAULT_CLIP_LIMIT: f64 = 2.0;
    pub const DEFAULT_TILES: u32 = 8;
}

impl Default for ClaheConfig {
    fn default() -> Self {
        Self {
            clip_limit: Self::DEFAULT_CLIP_LIMIT,
            tiles_x: Self::DEFAULT_TILES,
            tiles_y: Self::DEFAULT_TILES,
        }
    }
}

/// Gaussian adaptive threshold parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Side of the square neighbourhood (odd, at least 3).
    pub block_size: u32,
    /// Constant subtracted from the weighted local mean.
    pub offset: f64,
}

impl ThresholdConfig {
    pub const DEFAULT_BLOCK_SIZE: u32 = 11;
    pub const DEFAULT_OFFSET: f64 = 2.0;
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            block_size: Self::DEFAULT_BLOCK_SIZE,
            offset: Self::DEFAULT_OFFSET,
        }
    }
}

/// Canny hysteresis thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CannyConfig {
    pub low: f32,
    pub high: f32,
}

impl CannyConfig {
    pub const DEFAULT_LOW: f32 = 50.0;
    pub const DEFAULT_HIGH: f32 = 150.0;
}

impl Default for CannyConfig {
    fn default() -> Self {
        Self {
            low: Self::DEFAULT_LOW,
            high: Self::DEFAULT_HIGH,
        }
    }
}

/// Probabilistic Hough transform parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughConfig {
    /// Distance resolution of the accumulator in pixels.
    pub rho_resolution: f64,
    /// Angle resolution of the accumulator in degrees.
    pub theta_resolution: f64,
    /// Minimum accumulator votes for a line candidate.
    pub threshold: u32,
    /// Segments shorter than this (along x or y) are discarded.
    pub min_line_length: u32,
    /// Largest run of missing pixels bridged within one segment.
    pub max_line_gap: u32,
    /// Seed for the point visiting order.
    pub seed: u64,
}

impl HoughConfig {
    pub const DEFAULT_RHO_RESOLUTION: f64 = 1.0;
    pub const DEFAULT_THETA_RESOLUTION: f64 = 1.0;
    pub const DEFAULT_THRESHOLD: u32 = 50;
    pub const DEFAULT_MIN_LINE_LENGTH: u32 = 30;
    pub const DEFAULT_MAX_LINE_GAP: u32 = 10;
    pub const DEFAULT_SEED: u64 = 0x1234_5678;
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            rho_resolution: Self::DEFAULT_RHO_RESOLUTION,
            theta_resolution: Self::DEFAULT_THETA_RESOLUTION,
            threshold: Self::DEFAULT_THRESHOLD,
            min_line_length: Self::DEFAULT_MIN_LINE_LENGTH,
            max_line_gap: Self::DEFAULT_MAX_LINE_GAP,
            seed: Self::DEFAULT_SEED,
        }
    }
}

/// Configuration for the shape analysis pipeline.
///
/// Defaults reproduce the reference parameter set: 800x600 resize
/// bound, CLAHE 2.0 on 8x8 tiles, 3x3 blur, 11/2 Gaussian adaptive
/// threshold, 5x5 closing, Canny 50/150 and Hough 50/30/10.
///
/// Call [`validate`](Self::validate) before running; every pipeline
/// entry point does so.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub resize: ResizeConfig,
    pub clahe: ClaheConfig,
    /// Gaussian blur kernel side (odd).
    pub blur_kernel: u32,
    pub threshold: ThresholdConfig,
    /// Square structuring element side for morphological closing (odd).
    pub closing_kernel: u32,
    pub canny: CannyConfig,
    pub hough: HoughConfig,
    /// Which furthest-pair search the bounding-box calculator uses.
    pub furthest_pair: FurthestPairKind,
}

impl AnalysisConfig {
    pub const DEFAULT_BLUR_KERNEL: u32 = 3;
    pub const DEFAULT_CLOSING_KERNEL: u32 = 5;

    /// Check every parameter for values the stages cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending parameter.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.resize.max_width == 0 || self.resize.max_height == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "resize bounds must be positive, got {}x{}",
                self.resize.max_width, self.resize.max_height,
            )));
        }
        if !(self.clahe.clip_limit.is_finite() && self.clahe.clip_limit > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "CLAHE clip limit must be positive, got {}",
                self.clahe.clip_limit,
            )));
        }
        if self.clahe.tiles_x == 0 || self.clahe.tiles_y == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "CLAHE tile grid must be at least 1x1, got {}x{}",
                self.clahe.tiles_x, self.clahe.tiles_y,
            )));
        }
        require_odd("blur kernel", self.blur_kernel, 1)?;
        require_odd("threshold block size", self.threshold.block_size, 3)?;
        require_odd("closing kernel", self.closing_kernel, 1)?;
        if !self.threshold.offset.is_finite() {
            return Err(PipelineError::InvalidConfig(
                "threshold offset must be finite".to_string(),
            ));
        }
        if !(self.canny.low >= 0.0 && self.canny.low <= self.canny.high) {
            return Err(PipelineError::InvalidConfig(format!(
                "Canny thresholds must satisfy 0 <= low <= high, got {} / {}",
                self.canny.low, self.canny.high,
            )));
        }
        let hough = &self.hough;
        if !(hough.rho_resolution > 0.0 && hough.theta_resolution > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "Hough resolutions must be positive, got rho={} theta={}",
                hough.rho_resolution, hough.theta_resolution,
            )));
        }
        if hough.threshold == 0 {
            return Err(PipelineError::InvalidConfig(
                "Hough vote threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            resize: ResizeConfig::default(),
            clahe: ClaheConfig::default(),
            blur_kernel: Self::DEFAULT_BLUR_KERNEL,
            threshold: ThresholdConfig::default(),
            closing_kernel: Self::DEFAULT_CLOSING_KERNEL,
            canny: CannyConfig::default(),
            hough: HoughConfig::default(),
            furthest_pair: FurthestPairKind::default(),
        }
    }
}

fn require_odd(name: &str, value: u32, min: u32) -> Result<(), PipelineError> {
    if value < min || value % 2 == 0 {
        return Err(PipelineError::InvalidConfig(format!(
            "{name} must be odd and at least {min}, got {value}",
        )));
    }
    Ok(())
}

/// Errors that can occur during analysis or aggregation.
///
/// A frame without detectable lines is *not* an error; it yields a
/// `None` measurement instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input frame has no pixels.
    #[error("input frame is empty ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    /// Pipeline or aggregator configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// An external detector failed on a frame.
    #[error("detector failed: {0}")]
    Detector(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn segment_length() {
        let s = LineSegment::new(Point::new(1.0, 1.0), Point::new(4.0, 5.0));
        assert!((s.length() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn axis_aligned_box_corners() {
        let rect = RotatedBox {
            center: Point::new(50.0, 20.0),
            width: 100.0,
            height: 10.0,
            angle: 0.0,
        };
        let corners = rect.corners();
        assert_eq!(corners[0], Point::new(0.0, 25.0));
        assert_eq!(corners[1], Point::new(0.0, 15.0));
        assert_eq!(corners[2], Point::new(100.0, 15.0));
        assert_eq!(corners[3], Point::new(100.0, 25.0));
    }

    #[test]
    fn rotated_box_corners_keep_extents() {
        let rect = RotatedBox {
            center: Point::new(0.0, 0.0),
            width: 40.0,
            height: 20.0,
            angle: 30.0,
        };
        let c = rect.corners();
        assert!((c[1].distance(c[2]) - 40.0).abs() < 1e-9);
        assert!((c[0].distance(c[1]) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn record_from_missing_measurement() {
        let record = MeasurementRecord::from_measurement(4, None);
        assert_eq!(record, MeasurementRecord::missing(4));
        assert!(!record.has_extents());
    }

    #[test]
    fn record_from_measurement() {
        let m = Measurement {
            width: 12.0,
            height: 3.0,
            angle: -5.0,
        };
        let record = MeasurementRecord::from_measurement(1, Some(m));
        assert_eq!(record.width, Some(12.0));
        assert_eq!(record.height, Some(3.0));
        assert_eq!(record.angle, Some(-5.0));
        assert!(record.has_extents());
    }

    #[test]
    fn config_defaults_match_reference_parameters() {
        let config = AnalysisConfig::default();
        assert_eq!(config.resize.max_width, 800);
        assert_eq!(config.resize.max_height, 600);
        assert!((config.clahe.clip_limit - 2.0).abs() < f64::EPSILON);
        assert_eq!((config.clahe.tiles_x, config.clahe.tiles_y), (8, 8));
        assert_eq!(config.blur_kernel, 3);
        assert_eq!(config.threshold.block_size, 11);
        assert!((config.threshold.offset - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.closing_kernel, 5);
        assert!((config.canny.low - 50.0).abs() < f32::EPSILON);
        assert!((config.canny.high - 150.0).abs() < f32::EPSILON);
        assert_eq!(config.hough.threshold, 50);
        assert_eq!(config.hough.min_line_length, 30);
        assert_eq!(config.hough.max_line_gap, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_resize_bound_is_rejected() {
        let mut config = AnalysisConfig::default();
        config.resize.max_height = 0;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn even_kernel_is_rejected() {
        let config = AnalysisConfig {
            blur_kernel: 4,
            ..AnalysisConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("blur kernel"), "{err}");
    }

    #[test]
    fn inverted_canny_thresholds_are_rejected() {
        let mut config = AnalysisConfig::default();
        config.canny.low = 200.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_serde_round_trip() {
        let mut config = AnalysisConfig::default();
        config.hough.seed = 7;
        config.threshold.block_size = 15;
        let json = serde_json::to_string(&config).unwrap();
        let back: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn partial_config_json_uses_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"canny": {"low": 20.0}}"#).unwrap();
        assert!((config.canny.low - 20.0).abs() < f32::EPSILON);
        assert!((config.canny.high - 150.0).abs() < f32::EPSILON);
        assert_eq!(config.resize, ResizeConfig::default());
    }

    #[test]
    fn error_display() {
        let err = PipelineError::InvalidConfig("bad".to_string());
        assert_eq!(err.to_string(), "invalid pipeline configuration: bad");
        let err = PipelineError::EmptyFrame {
            width: 0,
            height: 3,
        };
        assert_eq!(err.to_string(), "input frame is empty (0x3)");
    }
}

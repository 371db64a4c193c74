//! Shape analyzer: one-shot and batch analysis, plus the measurement
//! source seam shared with external detectors.

use rayon::prelude::*;
use tracing::debug;

use crate::detector::{ClassLabels, Detector, records_from_detections};
use crate::growth::MeasurementMode;
use crate::pipeline::{Analysis, Pipeline};
use crate::types::{AnalysisConfig, Frame, MeasurementRecord, PipelineError};

/// Run the full shape analysis of one frame.
///
/// Equivalent to driving [`Pipeline`] through every step. The frame is
/// cloned; the caller keeps ownership of the original.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid, or
/// [`PipelineError::EmptyFrame`] if the frame has no pixels. A frame
/// without detectable lines is not an error.
pub fn analyze(frame: &Frame, config: &AnalysisConfig) -> Result<Analysis, PipelineError> {
    Ok(Pipeline::new(frame.clone(), config.clone())
        .resize()?
        .grayscale()
        .enhance_contrast()
        .blur()
        .threshold()
        .close()
        .detect_edges()
        .detect_lines()
        .fit_box())
}

/// Analyze every frame and return one record per frame, in frame order.
///
/// With `parallel` set, frames are distributed over the rayon thread
/// pool; the ordered collect keeps record `i` on frame `i` either way.
///
/// # Errors
///
/// Fails on the first invalid configuration or empty frame.
pub fn analyze_frames(
    frames: &[Frame],
    config: &AnalysisConfig,
    parallel: bool,
) -> Result<Vec<MeasurementRecord>, PipelineError> {
    config.validate()?;
    let measure = |(index, frame): (usize, &Frame)| {
        let analysis = analyze(frame, config)?;
        debug!(frame = index, measured = analysis.measurement().is_some(), "frame analyzed");
        Ok(MeasurementRecord::from_measurement(index, analysis.measurement()))
    };
    if parallel {
        frames.par_iter().enumerate().map(measure).collect()
    } else {
        frames.iter().enumerate().map(measure).collect()
    }
}

/// Anything that turns a frame sequence into measurement records.
///
/// The driver picks a source at runtime; the aggregator does not care
/// where the records came from, only which measurement mode suits them.
pub trait MeasurementSource {
    /// Measure every frame, returning records in frame order.
    ///
    /// # Errors
    ///
    /// Propagates configuration and detector failures.
    fn measure(&mut self, frames: &[Frame]) -> Result<Vec<MeasurementRecord>, PipelineError>;

    /// Aggregation mode suited to this source's records.
    fn measurement_mode(&self) -> MeasurementMode;

    /// Base file name for reports built from this source.
    fn report_name(&self) -> &'static str;
}

/// Base report name for shape-analyzer records.
pub const SHAPE_REPORT_NAME: &str = "opencv_crystal_analysis_data";
/// Base report name for detector records.
pub const DETECTOR_REPORT_NAME: &str = "yolo_crystal_analysis_data";

/// The shape analysis pipeline as a measurement source.
///
/// Produces exactly one record per frame, so aggregation uses the width
/// alone.
#[derive(Debug, Clone, Default)]
pub struct ShapeAnalyzer {
    pub config: AnalysisConfig,
    pub parallel: bool,
}

impl ShapeAnalyzer {
    #[must_use]
    pub const fn new(config: AnalysisConfig, parallel: bool) -> Self {
        Self { config, parallel }
    }
}

impl MeasurementSource for ShapeAnalyzer {
    fn measure(&mut self, frames: &[Frame]) -> Result<Vec<MeasurementRecord>, PipelineError> {
        analyze_frames(frames, &self.config, self.parallel)
    }

    fn measurement_mode(&self) -> MeasurementMode {
        MeasurementMode::WidthOnly
    }

    fn report_name(&self) -> &'static str {
        SHAPE_REPORT_NAME
    }
}

/// Adapts a [`Detector`] into a measurement source.
///
/// Every detection becomes its own record, so a frame may contribute
/// several. A frame with no detections gets one missing record.
/// Aggregation uses the box diagonal.
pub struct DetectorSource<D> {
    detector: D,
    labels: ClassLabels,
}

impl<D: Detector> DetectorSource<D> {
    #[must_use]
    pub const fn new(detector: D, labels: ClassLabels) -> Self {
        Self { detector, labels }
    }
}

impl<D: Detector> MeasurementSource for DetectorSource<D> {
    fn measure(&mut self, frames: &[Frame]) -> Result<Vec<MeasurementRecord>, PipelineError> {
        let mut records = Vec::new();
        for (index, frame) in frames.iter().enumerate() {
            let detections = self.detector.detect(frame)?;
            debug!(frame = index, detections = detections.len(), "frame detected");
            records.extend(records_from_detections(index, &detections, &self.labels));
        }
        Ok(records)
    }

    fn measurement_mode(&self) -> MeasurementMode {
        MeasurementMode::Hypotenuse
    }

    fn report_name(&self) -> &'static str {
        DETECTOR_REPORT_NAME
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    use super::*;
    use crate::detector::Detection;
    use crate::stage::StageId;
    use crate::types::RgbImage;

    fn crystal(offset: i32, width: u32) -> Frame {
        let mut frame = RgbImage::from_pixel(200, 150, Rgb([200, 200, 200]));
        draw_filled_rect_mut(&mut frame, Rect::at(offset, 50).of_size(width, 50), Rgb([40, 40, 40]));
        draw_filled_rect_mut(
            &mut frame,
            Rect::at(offset + 8, 58).of_size(width - 16, 34),
            Rgb([200, 200, 200]),
        );
        frame
    }

    fn blank() -> Frame {
        RgbImage::from_pixel(120, 90, Rgb([128, 128, 128]))
    }

    #[test]
    fn analyze_matches_incremental_pipeline() {
        let frame = crystal(40, 120);
        let config = AnalysisConfig::default();
        let one_shot = analyze(&frame, &config).unwrap();
        let stepped = Pipeline::new(frame, config)
            .resize()
            .unwrap()
            .grayscale()
            .enhance_contrast()
            .blur()
            .threshold()
            .close()
            .detect_edges()
            .detect_lines()
            .fit_box();
        assert_eq!(one_shot.stages(), stepped.stages());
        assert_eq!(one_shot.measurement(), stepped.measurement());
    }

    #[test]
    fn analyze_does_not_modify_frame() {
        let frame = crystal(40, 120);
        let copy = frame.clone();
        let _ = analyze(&frame, &AnalysisConfig::default()).unwrap();
        assert_eq!(frame, copy);
    }

    #[test]
    fn blank_frame_ends_on_hough_stage() {
        let analysis = analyze(&blank(), &AnalysisConfig::default()).unwrap();
        assert!(analysis.measurement().is_none());
        assert_eq!(analysis.final_stage().unwrap().id, StageId::HoughLines);
    }

    #[test]
    fn batch_keeps_frame_order() {
        let frames = vec![crystal(40, 120), blank(), crystal(30, 140)];
        let records = analyze_frames(&frames, &AnalysisConfig::default(), false).unwrap();
        assert_eq!(records.len(), 3);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.frame, i);
        }
        assert!(records[0].has_extents());
        assert!(!records[1].has_extents());
        assert!(records[2].has_extents());
    }

    #[test]
    fn parallel_batch_matches_sequential() {
        let frames = vec![crystal(40, 120), blank(), crystal(30, 140), crystal(50, 100)];
        let config = AnalysisConfig::default();
        let sequential = analyze_frames(&frames, &config, false).unwrap();
        let parallel = analyze_frames(&frames, &config, true).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn batch_rejects_invalid_config_up_front() {
        let config = AnalysisConfig {
            closing_kernel: 0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            analyze_frames(&[], &config, false),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn batch_propagates_empty_frame() {
        let frames = vec![blank(), RgbImage::new(0, 0)];
        assert!(matches!(
            analyze_frames(&frames, &AnalysisConfig::default(), false),
            Err(PipelineError::EmptyFrame { .. })
        ));
    }

    /// Reports a fixed box on every even frame.
    struct EvenFrames;

    impl Detector for EvenFrames {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, PipelineError> {
            if frame.get_pixel(0, 0).0[0] % 2 == 1 {
                return Ok(Vec::new());
            }
            Ok(vec![Detection {
                x1: 10.0,
                y1: 20.0,
                x2: 40.0,
                y2: 60.0,
                confidence: 0.9,
                class_id: 0,
            }])
        }
    }

    #[test]
    fn trailing_empty_frame_shows_in_preserved_gap() {
        let frames = vec![
            RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])),
            RgbImage::from_pixel(4, 4, Rgb([2, 0, 0])),
            RgbImage::from_pixel(4, 4, Rgb([1, 0, 0])),
        ];
        let mut source = DetectorSource::new(EvenFrames, ClassLabels::default());
        let records = source.measure(&frames).unwrap();
        let series = crate::growth::aggregate(
            &records,
            source.measurement_mode(),
            &crate::growth::ScaleConfig::default(),
            crate::growth::GapPolicy::PreserveGap,
        )
        .unwrap();
        let frames: Vec<usize> = series.rows.iter().map(|r| r.frame).collect();
        assert_eq!(frames, vec![0, 1, 2]);
        assert!(series.rows[2].sum.is_none());
        assert_eq!(series.rows[2].count, 0);
    }

    #[test]
    fn shape_analyzer_source() {
        let mut source = ShapeAnalyzer::default();
        let records = source.measure(&[crystal(40, 120), blank()]).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(source.measurement_mode(), MeasurementMode::WidthOnly);
        assert_eq!(source.report_name(), "opencv_crystal_analysis_data");
    }

    #[test]
    fn detector_source_emits_records_per_detection() {
        let frames = vec![
            RgbImage::from_pixel(4, 4, Rgb([2, 0, 0])),
            RgbImage::from_pixel(4, 4, Rgb([3, 0, 0])),
            RgbImage::from_pixel(4, 4, Rgb([4, 0, 0])),
        ];
        let mut source = DetectorSource::new(EvenFrames, ClassLabels::new(["crystal"]));
        let records = source.measure(&frames).unwrap();
        let frames: Vec<usize> = records.iter().map(|r| r.frame).collect();
        assert_eq!(frames, vec![0, 1, 2]);
        assert_eq!(records[1], MeasurementRecord::missing(1));
        assert_eq!(records[0].width, Some(30.0));
        assert_eq!(records[0].height, Some(40.0));
        assert_eq!(records[0].class_label.as_deref(), Some("crystal"));
        assert_eq!(source.measurement_mode(), MeasurementMode::Hypotenuse);
        assert_eq!(source.report_name(), "yolo_crystal_analysis_data");
    }
}

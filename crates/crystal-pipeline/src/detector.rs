//! External object-detector interface.
//!
//! The detection model itself lives outside this crate. It only has to
//! report axis-aligned boxes with a class id; the core turns those into
//! measurement records.

use serde::{Deserialize, Serialize};

use crate::types::{Frame, MeasurementRecord, PipelineError};

/// One detected object, in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
    pub class_id: u32,
}

impl Detection {
    #[must_use]
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

/// An object detector that can be run on single frames.
pub trait Detector {
    /// Detect every object in `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Detector`] if inference fails.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, PipelineError>;
}

/// Class-id to label lookup, indexed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLabels(Vec<String>);

impl ClassLabels {
    #[must_use]
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    /// Label for `class_id`; ids without a name read as `class_<id>`.
    #[must_use]
    pub fn label(&self, class_id: u32) -> String {
        usize::try_from(class_id)
            .ok()
            .and_then(|i| self.0.get(i))
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"))
    }
}

/// One record per detection, all on `frame`.
///
/// Width and height are the box extents; detectors report no angle. A
/// frame with no detections keeps its slot as a single missing record.
#[must_use]
pub fn records_from_detections(
    frame: usize,
    detections: &[Detection],
    labels: &ClassLabels,
) -> Vec<MeasurementRecord> {
    if detections.is_empty() {
        return vec![MeasurementRecord::missing(frame)];
    }
    detections
        .iter()
        .map(|d| MeasurementRecord {
            frame,
            width: Some(d.width()),
            height: Some(d.height()),
            angle: None,
            class_label: Some(labels.label(d.class_id)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(class_id: u32) -> Detection {
        Detection {
            x1: 5.0,
            y1: 7.5,
            x2: 25.0,
            y2: 17.5,
            confidence: 0.75,
            class_id,
        }
    }

    #[test]
    fn extents_from_corners() {
        let d = detection(0);
        assert!((d.width() - 20.0).abs() < f64::EPSILON);
        assert!((d.height() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_class_id_gets_placeholder_label() {
        let labels = ClassLabels::new(["crystal", "bubble"]);
        assert_eq!(labels.label(1), "bubble");
        assert_eq!(labels.label(7), "class_7");
        assert_eq!(ClassLabels::default().label(0), "class_0");
    }

    #[test]
    fn records_keep_frame_and_label() {
        let labels = ClassLabels::new(["crystal"]);
        let records = records_from_detections(3, &[detection(0), detection(2)], &labels);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.frame == 3 && r.angle.is_none()));
        assert_eq!(records[0].class_label.as_deref(), Some("crystal"));
        assert_eq!(records[1].class_label.as_deref(), Some("class_2"));
        assert_eq!(records[1].width, Some(20.0));
    }

    #[test]
    fn no_detections_keeps_frame_slot() {
        let records = records_from_detections(4, &[], &ClassLabels::default());
        assert_eq!(records, vec![MeasurementRecord::missing(4)]);
    }
}

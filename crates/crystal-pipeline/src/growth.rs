//! Growth-rate aggregation over a measurement record sequence.
//!
//! Records are grouped by frame and reduced to one measurement per
//! frame. Consecutive rows then give the change in pixels, its micron
//! and micron-per-second equivalents, and the percentage growth rate.
//! Summary statistics (mean and median) run over the rows where a value
//! is defined; with no defined values they are `NaN`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{MeasurementRecord, PipelineError};

/// How a record is reduced to a single size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MeasurementMode {
    /// Box diagonal `sqrt(w^2 + h^2)`. Needs width and height.
    Hypotenuse,
    /// Width alone, for sources that yield one object per frame.
    #[default]
    WidthOnly,
}

impl MeasurementMode {
    /// Size of one record, or `None` if either extent is missing or the
    /// result is not finite. Width-only mode still needs the height.
    #[must_use]
    pub fn measure(self, record: &MeasurementRecord) -> Option<f64> {
        if !record.has_extents() {
            return None;
        }
        let value = match self {
            Self::Hypotenuse => record.width?.hypot(record.height?),
            Self::WidthOnly => record.width?,
        };
        value.is_finite().then_some(value)
    }
}

/// What to do with frames that have no valid record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GapPolicy {
    /// Drop them; rates are computed between the remaining frames.
    #[default]
    SkipMissing,
    /// Keep an all-missing row for every frame between the first and
    /// last recorded frame. Rates next to a gap are undefined.
    PreserveGap,
}

/// Conversion from pixels per frame to physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    pub microns_per_pixel: f64,
    pub frame_rate_hz: f64,
}

impl ScaleConfig {
    pub const DEFAULT_MICRONS_PER_PIXEL: f64 = 0.25;
    pub const DEFAULT_FRAME_RATE_HZ: f64 = 8.0;

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] unless both constants are
    /// finite and positive.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, value) in [
            ("microns per pixel", self.microns_per_pixel),
            ("frame rate", self.frame_rate_hz),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and positive, got {value}",
                )));
            }
        }
        Ok(())
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            microns_per_pixel: Self::DEFAULT_MICRONS_PER_PIXEL,
            frame_rate_hz: Self::DEFAULT_FRAME_RATE_HZ,
        }
    }
}

/// One frame of the aggregated series.
///
/// Measurement fields are `None` for a preserved gap; rate fields are
/// `None` wherever the rate is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    pub frame: usize,
    /// Sum of the valid record sizes on this frame.
    pub sum: Option<f64>,
    /// `sum / count`.
    pub average: Option<f64>,
    /// Number of valid records on this frame.
    pub count: usize,
    pub pixel_delta: Option<f64>,
    pub micron_delta: Option<f64>,
    pub growth_rate_percent: Option<f64>,
    pub microns_per_second: Option<f64>,
}

/// Per-frame growth series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSeries {
    pub mode: MeasurementMode,
    pub rows: Vec<SeriesRow>,
}

/// Mean and median of the defined rate values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthSummary {
    pub mean_growth_rate_percent: f64,
    pub median_growth_rate_percent: f64,
    pub mean_pixel_delta: f64,
    pub median_pixel_delta: f64,
    pub mean_microns_per_second: f64,
    pub median_microns_per_second: f64,
}

impl AggregatedSeries {
    /// Summary statistics over the rows where each rate is defined.
    #[must_use]
    pub fn summary(&self) -> GrowthSummary {
        let column = |f: fn(&SeriesRow) -> Option<f64>| -> Vec<f64> {
            self.rows.iter().filter_map(f).collect()
        };
        let growth = column(|r| r.growth_rate_percent);
        let pixel = column(|r| r.pixel_delta);
        let speed = column(|r| r.microns_per_second);
        GrowthSummary {
            mean_growth_rate_percent: mean(&growth),
            median_growth_rate_percent: median(growth),
            mean_pixel_delta: mean(&pixel),
            median_pixel_delta: median(pixel),
            mean_microns_per_second: mean(&speed),
            median_microns_per_second: median(speed),
        }
    }
}

/// Reduce `records` to a per-frame growth series.
///
/// Records missing either extent are left out of the numeric
/// reduction. Whether their frames still get a row is decided by `gap`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `scale` is invalid.
pub fn aggregate(
    records: &[MeasurementRecord],
    mode: MeasurementMode,
    scale: &ScaleConfig,
    gap: GapPolicy,
) -> Result<AggregatedSeries, PipelineError> {
    scale.validate()?;

    let mut frames: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
    for record in records {
        let slot = frames.entry(record.frame).or_insert((0.0, 0));
        if let Some(size) = mode.measure(record) {
            slot.0 += size;
            slot.1 += 1;
        }
    }

    let measured = |frame: usize, (sum, count): (f64, usize)| {
        #[allow(clippy::cast_precision_loss)]
        let average = (count > 0).then(|| sum / count as f64);
        SeriesRow {
            frame,
            sum: (count > 0).then_some(sum),
            average,
            count,
            pixel_delta: None,
            micron_delta: None,
            growth_rate_percent: None,
            microns_per_second: None,
        }
    };

    let mut rows: Vec<SeriesRow> = match gap {
        GapPolicy::SkipMissing => frames
            .iter()
            .filter(|(_, (_, count))| *count > 0)
            .map(|(&frame, &slot)| measured(frame, slot))
            .collect(),
        GapPolicy::PreserveGap => match (frames.first_key_value(), frames.last_key_value()) {
            (Some((&first, _)), Some((&last, _))) => (first..=last)
                .map(|frame| measured(frame, frames.get(&frame).copied().unwrap_or((0.0, 0))))
                .collect(),
            _ => Vec::new(),
        },
    };

    for i in 1..rows.len() {
        let (Some(prev), Some(curr)) = (rows[i - 1].sum, rows[i].sum) else {
            continue;
        };
        let delta = curr - prev;
        let micron_delta = delta * scale.microns_per_pixel;
        let row = &mut rows[i];
        row.pixel_delta = Some(delta);
        row.micron_delta = Some(micron_delta);
        row.microns_per_second = Some(micron_delta * scale.frame_rate_hz);
        row.growth_rate_percent = (prev != 0.0).then(|| (curr / prev - 1.0) * 100.0);
    }

    debug!(records = records.len(), rows = rows.len(), ?mode, "aggregated growth series");
    Ok(AggregatedSeries { mode, rows })
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let n = values.len();
    match n {
        0 => f64::NAN,
        _ if n % 2 == 1 => values[n / 2],
        _ => f64::midpoint(values[n / 2 - 1], values[n / 2]),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Measurement;

    fn width_record(frame: usize, width: f64) -> MeasurementRecord {
        MeasurementRecord::from_measurement(
            frame,
            Some(Measurement {
                width,
                height: 1.0,
                angle: 0.0,
            }),
        )
    }

    fn boxed(frame: usize, width: f64, height: f64) -> MeasurementRecord {
        MeasurementRecord {
            frame,
            width: Some(width),
            height: Some(height),
            angle: None,
            class_label: Some("crystal".to_string()),
        }
    }

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn width_scenario() {
        let records = [width_record(0, 10.0), width_record(1, 20.0), width_record(2, 15.0)];
        let series = aggregate(
            &records,
            MeasurementMode::WidthOnly,
            &ScaleConfig::default(),
            GapPolicy::SkipMissing,
        )
        .unwrap();
        let rows = &series.rows;
        assert_eq!(rows.len(), 3);

        assert!(rows[0].growth_rate_percent.is_none());
        assert!(rows[0].pixel_delta.is_none());
        assert!(rows[0].microns_per_second.is_none());

        assert!(close(rows[1].growth_rate_percent, 100.0));
        assert!(close(rows[2].growth_rate_percent, -25.0));
        assert!(close(rows[1].pixel_delta, 10.0));
        assert!(close(rows[2].pixel_delta, -5.0));
        assert!(close(rows[1].micron_delta, 2.5));
        assert!(close(rows[1].microns_per_second, 20.0));
        assert!(close(rows[2].microns_per_second, -10.0));

        let summary = series.summary();
        assert!((summary.mean_growth_rate_percent - 37.5).abs() < 1e-9);
        assert!((summary.median_growth_rate_percent - 37.5).abs() < 1e-9);
        assert!((summary.mean_pixel_delta - 2.5).abs() < 1e-9);
        assert!((summary.mean_microns_per_second - 5.0).abs() < 1e-9);
    }

    #[test]
    fn hypotenuse_sums_objects_per_frame() {
        let records = [
            boxed(0, 3.0, 4.0),
            boxed(0, 6.0, 8.0),
            boxed(1, 9.0, 12.0),
            boxed(1, 9.0, 12.0),
        ];
        let series = aggregate(
            &records,
            MeasurementMode::Hypotenuse,
            &ScaleConfig::default(),
            GapPolicy::SkipMissing,
        )
        .unwrap();
        let rows = &series.rows;
        assert_eq!(rows.len(), 2);
        assert!(close(rows[0].sum, 15.0));
        assert!(close(rows[0].average, 7.5));
        assert_eq!(rows[0].count, 2);
        assert!(close(rows[1].sum, 30.0));
        assert!(close(rows[1].pixel_delta, 15.0));
        assert!(close(rows[1].growth_rate_percent, 100.0));
    }

    #[test]
    fn both_modes_need_both_extents() {
        let mut record = boxed(0, 3.0, 4.0);
        assert_eq!(MeasurementMode::WidthOnly.measure(&record), Some(3.0));
        record.height = None;
        assert!(MeasurementMode::Hypotenuse.measure(&record).is_none());
        assert!(MeasurementMode::WidthOnly.measure(&record).is_none());
    }

    #[test]
    fn width_only_drops_frame_with_missing_height() {
        let mut partial = width_record(1, 20.0);
        partial.height = None;
        let records = [width_record(0, 10.0), partial, width_record(2, 15.0)];
        let series = aggregate(
            &records,
            MeasurementMode::WidthOnly,
            &ScaleConfig::default(),
            GapPolicy::SkipMissing,
        )
        .unwrap();
        let frames: Vec<usize> = series.rows.iter().map(|r| r.frame).collect();
        assert_eq!(frames, vec![0, 2]);
        assert!(close(series.rows[0].sum, 10.0));
        assert!(close(series.rows[1].sum, 15.0));
        assert!(close(series.rows[1].growth_rate_percent, 50.0));
    }

    #[test]
    fn missing_frames_are_skipped_by_default() {
        let records = [
            width_record(0, 10.0),
            MeasurementRecord::missing(1),
            width_record(2, 20.0),
        ];
        let series = aggregate(
            &records,
            MeasurementMode::WidthOnly,
            &ScaleConfig::default(),
            GapPolicy::default(),
        )
        .unwrap();
        let frames: Vec<usize> = series.rows.iter().map(|r| r.frame).collect();
        assert_eq!(frames, vec![0, 2]);
        assert!(close(series.rows[1].growth_rate_percent, 100.0));
    }

    #[test]
    fn preserved_gap_breaks_rates() {
        let records = [
            width_record(0, 10.0),
            MeasurementRecord::missing(1),
            width_record(2, 20.0),
            width_record(4, 30.0),
        ];
        let series = aggregate(
            &records,
            MeasurementMode::WidthOnly,
            &ScaleConfig::default(),
            GapPolicy::PreserveGap,
        )
        .unwrap();
        let frames: Vec<usize> = series.rows.iter().map(|r| r.frame).collect();
        assert_eq!(frames, vec![0, 1, 2, 3, 4]);
        assert!(series.rows[1].sum.is_none());
        assert_eq!(series.rows[3].count, 0);
        assert!(series.rows.iter().all(|r| r.growth_rate_percent.is_none()));
        assert!(series.summary().mean_growth_rate_percent.is_nan());
    }

    #[test]
    fn zero_previous_measurement_has_no_growth_rate() {
        let records = [width_record(0, 0.0), width_record(1, 5.0)];
        let series = aggregate(
            &records,
            MeasurementMode::WidthOnly,
            &ScaleConfig::default(),
            GapPolicy::SkipMissing,
        )
        .unwrap();
        assert!(series.rows[1].growth_rate_percent.is_none());
        assert!(close(series.rows[1].pixel_delta, 5.0));
    }

    #[test]
    fn empty_records_give_nan_summary() {
        let series = aggregate(
            &[],
            MeasurementMode::Hypotenuse,
            &ScaleConfig::default(),
            GapPolicy::PreserveGap,
        )
        .unwrap();
        assert!(series.rows.is_empty());
        let s = series.summary();
        for value in [
            s.mean_growth_rate_percent,
            s.median_growth_rate_percent,
            s.mean_pixel_delta,
            s.median_pixel_delta,
            s.mean_microns_per_second,
            s.median_microns_per_second,
        ] {
            assert!(value.is_nan());
        }
    }

    #[test]
    fn invalid_scale_is_rejected() {
        for scale in [
            ScaleConfig {
                microns_per_pixel: 0.0,
                ..ScaleConfig::default()
            },
            ScaleConfig {
                frame_rate_hz: f64::NAN,
                ..ScaleConfig::default()
            },
        ] {
            assert!(matches!(
                aggregate(&[], MeasurementMode::WidthOnly, &scale, GapPolicy::SkipMissing),
                Err(PipelineError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn median_of_even_count_averages_middle_pair() {
        assert!((median(vec![4.0, 1.0, 3.0, 2.0]) - 2.5).abs() < f64::EPSILON);
        assert!((median(vec![5.0, 1.0, 3.0]) - 3.0).abs() < f64::EPSILON);
        assert!(median(Vec::new()).is_nan());
    }

    #[test]
    fn scale_config_defaults() {
        let scale = ScaleConfig::default();
        assert!((scale.microns_per_pixel - 0.25).abs() < f64::EPSILON);
        assert!((scale.frame_rate_hz - 8.0).abs() < f64::EPSILON);
        assert!(scale.validate().is_ok());
    }
}

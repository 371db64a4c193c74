//! Growth report writing.
//!
//! One report is three files under the report directory, each with its
//! own collision-free name:
//!
//! - `<base>.csv`: the raw measurement records,
//! - `<base>_series.csv`: the aggregated per-frame series,
//! - `<base>.png`: the growth-rate plot.
//!
//! An empty series still yields a header-only table and an axes-only
//! plot.

use std::path::{Path, PathBuf};

use tracing::info;

use crystal_export::{PlotConfig, RecordLayout, growth_plot_png, records_to_csv, series_to_csv};
use crystal_pipeline::{AggregatedSeries, GrowthSummary, MeasurementRecord};

use crate::IoError;
use crate::files::{ensure_dir, write_unique};

/// Paths written for one report, plus the summary it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenReport {
    pub records_csv: PathBuf,
    pub series_csv: PathBuf,
    pub plot_png: PathBuf,
    pub summary: GrowthSummary,
}

/// Writes reports into one directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    plot: PlotConfig,
}

impl ReportWriter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            plot: PlotConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_plot_config(mut self, plot: PlotConfig) -> Self {
        self.plot = plot;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serialize and write one report named after `base_name`.
    ///
    /// The directory is created first. Existing files are never
    /// touched; a taken name gets the next `_<n>` suffix.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`] if the directory or a file cannot be created
    /// or written, or if the plot cannot be rendered.
    pub fn write(
        &self,
        base_name: &str,
        records: &[MeasurementRecord],
        layout: RecordLayout,
        series: &AggregatedSeries,
    ) -> Result<WrittenReport, IoError> {
        ensure_dir(&self.dir)?;

        let plot = growth_plot_png(series, &self.plot)?;
        let records_csv = write_unique(
            &self.dir,
            base_name,
            "csv",
            records_to_csv(records, layout).as_bytes(),
        )?;
        let series_csv = write_unique(
            &self.dir,
            &format!("{base_name}_series"),
            "csv",
            series_to_csv(series).as_bytes(),
        )?;
        let plot_png = write_unique(&self.dir, base_name, "png", &plot)?;

        info!(
            records = %records_csv.display(),
            series = %series_csv.display(),
            plot = %plot_png.display(),
            "report written"
        );
        Ok(WrittenReport {
            records_csv,
            series_csv,
            plot_png,
            summary: series.summary(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crystal_pipeline::{GapPolicy, MeasurementMode, SHAPE_REPORT_NAME, ScaleConfig, aggregate};

    fn widths(values: &[f64]) -> Vec<MeasurementRecord> {
        values
            .iter()
            .enumerate()
            .map(|(frame, &w)| MeasurementRecord {
                frame,
                width: Some(w),
                height: Some(5.0),
                angle: Some(0.0),
                class_label: None,
            })
            .collect()
    }

    fn series_of(records: &[MeasurementRecord]) -> AggregatedSeries {
        aggregate(
            records,
            MeasurementMode::WidthOnly,
            &ScaleConfig::default(),
            GapPolicy::SkipMissing,
        )
        .unwrap()
    }

    #[test]
    fn writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("logs"));
        let records = widths(&[10.0, 20.0, 15.0]);
        let report = writer
            .write(SHAPE_REPORT_NAME, &records, RecordLayout::Analyzer, &series_of(&records))
            .unwrap();

        assert!(report.records_csv.ends_with("opencv_crystal_analysis_data.csv"));
        assert!(report.series_csv.ends_with("opencv_crystal_analysis_data_series.csv"));
        assert!(report.plot_png.ends_with("opencv_crystal_analysis_data.png"));
        let csv = std::fs::read_to_string(&report.records_csv).unwrap();
        assert_eq!(csv.lines().count(), 4);
        assert!(image::open(&report.plot_png).is_ok());
        assert!((report.summary.mean_growth_rate_percent - 37.5).abs() < 1e-9);
    }

    #[test]
    fn second_report_gets_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let records = widths(&[10.0, 12.0]);
        let series = series_of(&records);
        let first = writer.write("run", &records, RecordLayout::Analyzer, &series).unwrap();
        let second = writer.write("run", &records, RecordLayout::Analyzer, &series).unwrap();
        assert!(first.records_csv.ends_with("run.csv"));
        assert!(second.records_csv.ends_with("run_1.csv"));
        assert!(second.series_csv.ends_with("run_series_1.csv"));
        assert!(second.plot_png.ends_with("run_1.png"));
    }

    #[test]
    fn empty_records_still_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let report = writer
            .write("empty", &[], RecordLayout::Detector, &series_of(&[]))
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&report.records_csv).unwrap(),
            "frame,class,width,height\n"
        );
        assert!(report.summary.mean_growth_rate_percent.is_nan());
        assert!(image::open(&report.plot_png).is_ok());
    }
}

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Args};
use crystal_export::RecordLayout;
use crystal_io::ReportWriter;
use crystal_pipeline::detector::records_from_detections;
use crystal_pipeline::{
    ClassLabels, DETECTOR_REPORT_NAME, Detection, MeasurementMode, MeasurementRecord,
    SHAPE_REPORT_NAME, aggregate,
};
use tracing::info;

use super::{ReportArgs, ScaleArgs, read_text};

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["detections", "records"])))]
pub struct AggregateArgs {
    /// Detector output: `frame,x1,y1,x2,y2,confidence,class_id`.
    #[arg(long)]
    pub detections: Option<PathBuf>,

    /// A record table written by an earlier report.
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Class names indexed by class id, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub labels: Vec<String>,

    #[command(flatten)]
    pub scale: ScaleArgs,

    #[command(flatten)]
    pub report: ReportArgs,
}

/// Records from detector output, one per detection, in frame order.
fn detection_records(
    detections: Vec<(usize, Detection)>,
    labels: &ClassLabels,
) -> Vec<MeasurementRecord> {
    let mut by_frame: BTreeMap<usize, Vec<Detection>> = BTreeMap::new();
    for (frame, detection) in detections {
        by_frame.entry(frame).or_default().push(detection);
    }
    by_frame
        .iter()
        .flat_map(|(&frame, found)| records_from_detections(frame, found, labels))
        .collect()
}

pub fn run(args: &AggregateArgs) -> Result<()> {
    let scale = args.scale.scale()?;

    let (records, layout) = match (&args.detections, &args.records) {
        (Some(path), _) => {
            let detections = crystal_export::parse_detections_csv(&read_text(path)?)
                .with_context(|| format!("parsing {}", path.display()))?;
            let labels = ClassLabels::new(args.labels.iter().map(String::as_str));
            (detection_records(detections, &labels), RecordLayout::Detector)
        }
        (None, Some(path)) => {
            let (layout, records) = crystal_export::parse_records_csv(&read_text(path)?)
                .with_context(|| format!("parsing {}", path.display()))?;
            (records, layout)
        }
        (None, None) => bail!("one of --detections or --records is required"),
    };

    let (default_mode, default_name) = match layout {
        RecordLayout::Detector => (MeasurementMode::Hypotenuse, DETECTOR_REPORT_NAME),
        RecordLayout::Analyzer => (MeasurementMode::WidthOnly, SHAPE_REPORT_NAME),
    };
    let mode = args.scale.mode_or(default_mode);
    let series = aggregate(&records, mode, &scale, args.scale.gap())?;
    info!(records = records.len(), rows = series.rows.len(), ?mode, "series aggregated");

    let name = args.report.name.as_deref().unwrap_or(default_name);
    let report =
        ReportWriter::new(&args.report.report_dir).write(name, &records, layout, &series)?;
    super::print_report(&report, args.report.json)
}

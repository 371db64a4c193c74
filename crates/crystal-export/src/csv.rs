//! CSV tables: raw measurement records, the aggregated growth series,
//! and detector output.
//!
//! Missing values are written as empty fields. Numbers use Rust's
//! shortest round-trip formatting. Only the class column can contain
//! free text; it is quoted when it holds a comma, quote or line break.
//!
//! These are pure functions with no I/O. Writers return a `String`,
//! parsers take one.

use std::fmt::Write;

use crystal_pipeline::{AggregatedSeries, Detection, MeasurementRecord};

use crate::ExportError;

/// Header of the shape-analyzer record table.
pub const ANALYZER_HEADER: &str = "frame,width,height,angle";
/// Header of the detector record table.
pub const DETECTOR_HEADER: &str = "frame,class,width,height";
/// Header of the aggregated series table.
pub const SERIES_HEADER: &str =
    "frame,sum,average,count,pixel_delta,micron_delta,growth_rate_percent,microns_per_second";
/// Header expected on detector output files.
pub const DETECTIONS_HEADER: &str = "frame,x1,y1,x2,y2,confidence,class_id";

/// Column layout of a record table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// `frame,width,height,angle`
    Analyzer,
    /// `frame,class,width,height`
    Detector,
}

impl RecordLayout {
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::Analyzer => ANALYZER_HEADER,
            Self::Detector => DETECTOR_HEADER,
        }
    }
}

/// Serialize the raw record table. A header is always written, even for
/// no records.
#[must_use]
pub fn records_to_csv(records: &[MeasurementRecord], layout: RecordLayout) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", layout.header());
    for r in records {
        let _ = match layout {
            RecordLayout::Analyzer => writeln!(
                out,
                "{},{},{},{}",
                r.frame,
                field(r.width),
                field(r.height),
                field(r.angle),
            ),
            RecordLayout::Detector => writeln!(
                out,
                "{},{},{},{}",
                r.frame,
                quote(r.class_label.as_deref().unwrap_or_default()),
                field(r.width),
                field(r.height),
            ),
        };
    }
    out
}

/// Serialize the aggregated growth series, one row per frame.
#[must_use]
pub fn series_to_csv(series: &AggregatedSeries) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{SERIES_HEADER}");
    for row in &series.rows {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            row.frame,
            field(row.sum),
            field(row.average),
            row.count,
            field(row.pixel_delta),
            field(row.micron_delta),
            field(row.growth_rate_percent),
            field(row.microns_per_second),
        );
    }
    out
}

/// Parse a record table written by [`records_to_csv`] in either layout.
///
/// # Errors
///
/// Returns [`ExportError::Csv`] for an unknown header, a wrong field
/// count, or an unparsable number.
pub fn parse_records_csv(text: &str) -> Result<(RecordLayout, Vec<MeasurementRecord>), ExportError> {
    let mut lines = data_lines(text);
    let layout = match lines.next() {
        Some((_, header)) if header == ANALYZER_HEADER => RecordLayout::Analyzer,
        Some((_, header)) if header == DETECTOR_HEADER => RecordLayout::Detector,
        Some((line, header)) => {
            return Err(ExportError::Csv {
                line,
                message: format!("unrecognised header '{header}'"),
            });
        }
        None => {
            return Err(ExportError::Csv {
                line: 1,
                message: "missing header".to_string(),
            });
        }
    };

    let mut records = Vec::new();
    for (line, content) in lines {
        let fields = split_fields(content);
        let [frame, a, b, c] = fields.as_slice() else {
            return Err(ExportError::Csv {
                line,
                message: format!("expected 4 fields, found {}", fields.len()),
            });
        };
        let frame = parse_number(frame, line, "frame")?;
        records.push(match layout {
            RecordLayout::Analyzer => MeasurementRecord {
                frame,
                width: parse_optional(a, line, "width")?,
                height: parse_optional(b, line, "height")?,
                angle: parse_optional(c, line, "angle")?,
                class_label: None,
            },
            RecordLayout::Detector => MeasurementRecord {
                frame,
                width: parse_optional(b, line, "width")?,
                height: parse_optional(c, line, "height")?,
                angle: None,
                class_label: (!a.is_empty()).then(|| a.clone()),
            },
        });
    }
    Ok((layout, records))
}

/// Parse detector output: `frame,x1,y1,x2,y2,confidence,class_id`.
///
/// Returns `(frame, detection)` pairs in file order.
///
/// # Errors
///
/// Returns [`ExportError::Csv`] for a wrong header, a wrong field count,
/// or an unparsable number.
pub fn parse_detections_csv(text: &str) -> Result<Vec<(usize, Detection)>, ExportError> {
    let mut lines = data_lines(text);
    match lines.next() {
        Some((_, header)) if header == DETECTIONS_HEADER => {}
        Some((line, header)) => {
            return Err(ExportError::Csv {
                line,
                message: format!("expected header '{DETECTIONS_HEADER}', found '{header}'"),
            });
        }
        None => {
            return Err(ExportError::Csv {
                line: 1,
                message: "missing header".to_string(),
            });
        }
    }

    lines
        .map(|(line, content)| {
            let fields = split_fields(content);
            let [frame, x1, y1, x2, y2, confidence, class_id] = fields.as_slice() else {
                return Err(ExportError::Csv {
                    line,
                    message: format!("expected 7 fields, found {}", fields.len()),
                });
            };
            let detection = Detection {
                x1: parse_number(x1, line, "x1")?,
                y1: parse_number(y1, line, "y1")?,
                x2: parse_number(x2, line, "x2")?,
                y2: parse_number(y2, line, "y2")?,
                confidence: parse_number(confidence, line, "confidence")?,
                class_id: parse_number(class_id, line, "class_id")?,
            };
            Ok((parse_number(frame, line, "frame")?, detection))
        })
        .collect()
}

fn field(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn quote(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Non-blank lines with their 1-based line numbers, trimmed of
/// surrounding whitespace.
fn data_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty())
}

/// Split one line on commas, honouring double-quoted fields.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn parse_number<T: std::str::FromStr>(text: &str, line: usize, name: &str) -> Result<T, ExportError>
where
    T::Err: std::fmt::Display,
{
    text.trim().parse().map_err(|e| ExportError::Csv {
        line,
        message: format!("invalid {name} '{text}': {e}"),
    })
}

fn parse_optional(text: &str, line: usize, name: &str) -> Result<Option<f64>, ExportError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    parse_number(text, line, name).map(Some)
}

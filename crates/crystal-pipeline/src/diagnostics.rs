//! Analysis diagnostics: timing, pixel counts, and other metrics for
//! each recorded stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning. [`analyze_with_diagnostics`] runs the same steps as
//! [`analyze`](crate::analyze) and collects one [`StageDiagnostics`] per
//! recorded stage, in the same order as [`Analysis::stages`].
//!
//! Time is read through the [`Clock`] trait so the core never touches a
//! platform clock itself; the CLI supplies one backed by
//! `std::time::Instant`, tests supply a fake.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Analysis, Pipeline};
use crate::stage::StageId;
use crate::types::{AnalysisConfig, Frame, GrayImage, Measurement, PipelineError};

/// Source of monotonic timestamps.
pub trait Clock {
    type Instant;

    fn now(&self) -> Self::Instant;

    /// Time passed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single frame analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDiagnostics {
    /// One entry per recorded stage, in pipeline order.
    pub stages: Vec<StageDiagnostics>,
    /// Wall-clock duration of the whole analysis, box fitting included
    /// (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    pub summary: AnalysisSummary,
}

/// Diagnostics for a single recorded stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    pub stage: StageId,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    Resize {
        from_width: u32,
        from_height: u32,
        width: u32,
        height: u32,
        /// Whether resampling took place.
        applied: bool,
    },
    Grayscale {
        width: u32,
        height: u32,
    },
    ContrastEnhanced {
        clip_limit: f64,
        tiles_x: u32,
        tiles_y: u32,
    },
    Blurred {
        kernel: u32,
        /// Sigma derived from the kernel size.
        sigma: f32,
    },
    AdaptiveThreshold {
        block_size: u32,
        offset: f64,
        /// Number of pixels set to 255.
        foreground_pixel_count: u64,
        total_pixel_count: u64,
    },
    MorphologicalClosing {
        kernel: u32,
        foreground_pixel_count: u64,
        total_pixel_count: u64,
    },
    CannyEdges {
        low_threshold: f32,
        high_threshold: f32,
        edge_pixel_count: u64,
        total_pixel_count: u64,
    },
    HoughLines {
        segment_count: usize,
        /// Mean segment length in pixels, 0 without segments.
        mean_segment_length: f64,
    },
    BoundingBox {
        width: f64,
        height: f64,
        angle: f64,
    },
}

/// High-level summary of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub frame_width: u32,
    pub frame_height: u32,
    pub resized_width: u32,
    pub resized_height: u32,
    pub segment_count: usize,
    pub measurement: Option<Measurement>,
}

/// Run the full analysis of one frame while timing every stage.
///
/// # Errors
///
/// Same as [`analyze`](crate::analyze).
pub fn analyze_with_diagnostics<C: Clock>(
    frame: &Frame,
    config: &AnalysisConfig,
    clock: &C,
) -> Result<(Analysis, AnalysisDiagnostics), PipelineError> {
    let total_start = clock.now();
    let mut stages = Vec::with_capacity(StageId::ALL.len());
    let mut record = |stage: StageId, start: &C::Instant, metrics: StageMetrics| {
        stages.push(StageDiagnostics {
            stage,
            duration: clock.elapsed(start),
            metrics,
        });
    };
    let (frame_width, frame_height) = frame.dimensions();

    let t = clock.now();
    let resized = Pipeline::new(frame.clone(), config.clone()).resize()?;
    let (resized_width, resized_height) = resized.resized().dimensions();
    record(
        StageId::Original,
        &t,
        StageMetrics::Resize {
            from_width: frame_width,
            from_height: frame_height,
            width: resized_width,
            height: resized_height,
            applied: resized.applied(),
        },
    );

    let t = clock.now();
    let gray = resized.grayscale();
    record(
        StageId::Grayscale,
        &t,
        StageMetrics::Grayscale {
            width: resized_width,
            height: resized_height,
        },
    );

    let t = clock.now();
    let enhanced = gray.enhance_contrast();
    record(
        StageId::ContrastEnhanced,
        &t,
        StageMetrics::ContrastEnhanced {
            clip_limit: config.clahe.clip_limit,
            tiles_x: config.clahe.tiles_x,
            tiles_y: config.clahe.tiles_y,
        },
    );

    let t = clock.now();
    let blurred = enhanced.blur();
    record(
        StageId::Blurred,
        &t,
        StageMetrics::Blurred {
            kernel: config.blur_kernel,
            sigma: crate::blur::sigma_for_kernel(config.blur_kernel),
        },
    );

    let t = clock.now();
    let thresholded = blurred.threshold();
    let (foreground, total) = pixel_counts(thresholded.binary());
    record(
        StageId::AdaptiveThreshold,
        &t,
        StageMetrics::AdaptiveThreshold {
            block_size: config.threshold.block_size,
            offset: config.threshold.offset,
            foreground_pixel_count: foreground,
            total_pixel_count: total,
        },
    );

    let t = clock.now();
    let closed = thresholded.close();
    let (foreground, total) = pixel_counts(closed.closed());
    record(
        StageId::MorphologicalClosing,
        &t,
        StageMetrics::MorphologicalClosing {
            kernel: config.closing_kernel,
            foreground_pixel_count: foreground,
            total_pixel_count: total,
        },
    );

    let t = clock.now();
    let edges = closed.detect_edges();
    let (edge_pixels, total) = pixel_counts(edges.edges());
    record(
        StageId::CannyEdges,
        &t,
        StageMetrics::CannyEdges {
            low_threshold: config.canny.low,
            high_threshold: config.canny.high,
            edge_pixel_count: edge_pixels,
            total_pixel_count: total,
        },
    );

    let t = clock.now();
    let lines = edges.detect_lines();
    let segment_count = lines.segments().len();
    #[allow(clippy::cast_precision_loss)]
    let mean_segment_length = if segment_count == 0 {
        0.0
    } else {
        lines.segments().iter().map(crate::types::LineSegment::length).sum::<f64>()
            / segment_count as f64
    };
    record(
        StageId::HoughLines,
        &t,
        StageMetrics::HoughLines {
            segment_count,
            mean_segment_length,
        },
    );

    let t = clock.now();
    let analysis = lines.fit_box();
    if let Some(rect) = analysis.rotated_box() {
        record(
            StageId::BoundingBox,
            &t,
            StageMetrics::BoundingBox {
                width: rect.width,
                height: rect.height,
                angle: rect.angle,
            },
        );
    }

    let diagnostics = AnalysisDiagnostics {
        stages,
        total_duration: clock.elapsed(&total_start),
        summary: AnalysisSummary {
            frame_width,
            frame_height,
            resized_width,
            resized_height,
            segment_count,
            measurement: analysis.measurement(),
        },
    };
    Ok((analysis, diagnostics))
}

impl AnalysisDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Analysis Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Frame: {}x{} -> {}x{}",
            self.summary.frame_width,
            self.summary.frame_height,
            self.summary.resized_width,
            self.summary.resized_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for diag in &self.stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            let name = diag.stage.label();
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(match self.summary.measurement {
            Some(m) => format!(
                "Segments: {}  |  Measurement: {:.1} x {:.1} px at {:.1} deg",
                self.summary.segment_count, m.width, m.height, m.angle,
            ),
            None => format!(
                "Segments: {}  |  Measurement: none",
                self.summary.segment_count,
            ),
        });

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Resize {
            from_width,
            from_height,
            width,
            height,
            applied,
        } => {
            if *applied {
                format!("{from_width}x{from_height} -> {width}x{height}")
            } else {
                format!("{width}x{height} (unchanged)")
            }
        }
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::ContrastEnhanced {
            clip_limit,
            tiles_x,
            tiles_y,
        } => format!("clip={clip_limit:.1} tiles={tiles_x}x{tiles_y}"),
        StageMetrics::Blurred { kernel, sigma } => format!("k={kernel} sigma={sigma:.2}"),
        StageMetrics::AdaptiveThreshold {
            block_size,
            offset,
            foreground_pixel_count,
            total_pixel_count,
        } => format!(
            "block={block_size} C={offset:.1} fg={foreground_pixel_count} ({:.1}%)",
            percent(*foreground_pixel_count, *total_pixel_count),
        ),
        StageMetrics::MorphologicalClosing {
            kernel,
            foreground_pixel_count,
            total_pixel_count,
        } => format!(
            "k={kernel} fg={foreground_pixel_count} ({:.1}%)",
            percent(*foreground_pixel_count, *total_pixel_count),
        ),
        StageMetrics::CannyEdges {
            low_threshold,
            high_threshold,
            edge_pixel_count,
            total_pixel_count,
        } => format!(
            "low={low_threshold:.1} high={high_threshold:.1} edges={edge_pixel_count} ({:.1}%)",
            percent(*edge_pixel_count, *total_pixel_count),
        ),
        StageMetrics::HoughLines {
            segment_count,
            mean_segment_length,
        } => format!("{segment_count} segments (mean length {mean_segment_length:.1}px)"),
        StageMetrics::BoundingBox {
            width,
            height,
            angle,
        } => format!("{width:.1}x{height:.1} at {angle:.1} deg"),
    }
}

/// Non-zero pixels and total pixels of a binary image.
fn pixel_counts(image: &GrayImage) -> (u64, u64) {
    let on = image.pixels().map(|p| u64::from(u8::from(p.0[0] != 0))).sum();
    (on, u64::from(image.width()) * u64::from(image.height()))
}

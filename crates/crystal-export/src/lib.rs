//! crystal-export: Pure report serializers (sans-IO)
//!
//! Turns measurement records and growth series into report artifacts:
//! CSV tables, a PNG growth-rate plot and a text summary. Nothing here
//! touches the file system; `crystal-io` decides where bytes go.

pub mod csv;
pub mod plot;
pub mod summary;

pub use csv::{
    RecordLayout, parse_detections_csv, parse_records_csv, records_to_csv, series_to_csv,
};
pub use plot::{PlotConfig, growth_plot_png, render_growth_plot};
pub use summary::summary_text;

/// Errors from building or parsing report artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("plot canvas {width}x{height} is too small")]
    InvalidPlotSize { width: u32, height: u32 },

    #[error("CSV line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

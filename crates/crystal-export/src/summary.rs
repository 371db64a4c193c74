//! Plain-text growth summary.

use std::fmt::Write;

use crystal_pipeline::GrowthSummary;

/// Four-line summary of mean and median rates, two decimals each.
///
/// Undefined statistics print as `NaN`.
#[must_use]
pub fn summary_text(summary: &GrowthSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Average Growth Rate: {:.2}% or {:.2} pixels/frame",
        summary.mean_growth_rate_percent, summary.mean_pixel_delta,
    );
    let _ = writeln!(
        out,
        "Median Growth Rate: {:.2}% or {:.2} pixels/frame",
        summary.median_growth_rate_percent, summary.median_pixel_delta,
    );
    let _ = writeln!(
        out,
        "Average Micron Change: {:.2} µm/s",
        summary.mean_microns_per_second,
    );
    let _ = writeln!(
        out,
        "Median Micron Change: {:.2} µm/s",
        summary.median_microns_per_second,
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_two_decimals() {
        let summary = GrowthSummary {
            mean_growth_rate_percent: 37.5,
            median_growth_rate_percent: 37.5,
            mean_pixel_delta: 2.5,
            median_pixel_delta: 2.5,
            mean_microns_per_second: 5.0,
            median_microns_per_second: 5.0,
        };
        assert_eq!(
            summary_text(&summary),
            "Average Growth Rate: 37.50% or 2.50 pixels/frame\n\
             Median Growth Rate: 37.50% or 2.50 pixels/frame\n\
             Average Micron Change: 5.00 µm/s\n\
             Median Micron Change: 5.00 µm/s\n"
        );
    }

    #[test]
    fn undefined_statistics_print_nan() {
        let summary = GrowthSummary {
            mean_growth_rate_percent: f64::NAN,
            median_growth_rate_percent: f64::NAN,
            mean_pixel_delta: f64::NAN,
            median_pixel_delta: f64::NAN,
            mean_microns_per_second: f64::NAN,
            median_microns_per_second: f64::NAN,
        };
        let text = summary_text(&summary);
        assert!(text.starts_with("Average Growth Rate: NaN% or NaN pixels/frame\n"), "{text}");
        assert_eq!(text.lines().count(), 4);
    }
}

//! Growth-rate line plot rendered with `tiny-skia`.
//!
//! Frame index runs along x and growth rate (percent) along y. Each
//! defined rate gets a round marker; consecutive defined rates are
//! joined by a line and an undefined rate breaks it.
//!
//! `tiny-skia` rasterizes paths only and has no text rendering, so the
//! plot carries no title ("Crystal Growth Rate Over Frames") and no axis
//! labels ("Frame", "Growth Rate (%)"). It draws the axes, evenly spaced
//! tick marks along both of them, and a zero line instead. The frame
//! index and rate behind every marker are in the series table written
//! next to the plot.

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, Rgb, RgbImage};
use tiny_skia::{
    Color, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform,
};

use crystal_pipeline::AggregatedSeries;

use crate::ExportError;

/// Canvas size and styling of the growth plot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
    /// Blank space around the plot area, in pixels.
    pub margin: u32,
    pub line_width: f32,
    pub marker_radius: f32,
}

impl PlotConfig {
    pub const DEFAULT_WIDTH: u32 = 640;
    pub const DEFAULT_HEIGHT: u32 = 480;
    pub const DEFAULT_MARGIN: u32 = 48;
    pub const DEFAULT_LINE_WIDTH: f32 = 1.5;
    pub const DEFAULT_MARKER_RADIUS: f32 = 3.5;
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
            margin: Self::DEFAULT_MARGIN,
            line_width: Self::DEFAULT_LINE_WIDTH,
            marker_radius: Self::DEFAULT_MARKER_RADIUS,
        }
    }
}

/// Series colour.
pub const SERIES_COLOR: Rgb<u8> = Rgb([31, 119, 180]);
const AXIS_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const ZERO_COLOR: Rgb<u8> = Rgb([190, 190, 190]);
const TICKS: u32 = 5;
const TICK_LENGTH: f32 = 5.0;

/// Data-to-pixel mapping for the plot area.
#[derive(Debug, Clone, Copy)]
struct PlotArea {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
}

impl PlotArea {
    #[allow(clippy::cast_possible_truncation)]
    fn map(&self, x: f64, y: f64) -> (f32, f32) {
        let tx = (x - self.x_min) / (self.x_max - self.x_min);
        let ty = (y - self.y_min) / (self.y_max - self.y_min);
        let w = f64::from(self.right - self.left);
        let h = f64::from(self.bottom - self.top);
        (
            self.left + (tx * w) as f32,
            self.bottom - (ty * h) as f32,
        )
    }
}

/// Render the growth-rate plot of `series`.
///
/// An empty series, or one with no defined rate, still produces the
/// axes.
///
/// # Errors
///
/// Returns [`ExportError::InvalidPlotSize`] if the canvas is empty or
/// too small to hold the margins.
#[allow(clippy::cast_precision_loss)]
pub fn render_growth_plot(
    series: &AggregatedSeries,
    config: &PlotConfig,
) -> Result<RgbImage, ExportError> {
    let PlotConfig { width, height, margin, .. } = *config;
    if width <= 2 * margin || height <= 2 * margin {
        return Err(ExportError::InvalidPlotSize { width, height });
    }
    let mut pixmap =
        Pixmap::new(width, height).ok_or(ExportError::InvalidPlotSize { width, height })?;
    pixmap.fill(Color::WHITE);

    let points: Vec<Option<(f64, f64)>> = series
        .rows
        .iter()
        .map(|r| r.growth_rate_percent.map(|g| (r.frame as f64, g)))
        .collect();
    let area = plot_area(series, &points, config);

    draw_axes(&mut pixmap, &area);

    let mut line = PathBuilder::new();
    let mut pen_down = false;
    for point in &points {
        match point {
            Some((x, y)) => {
                let (px, py) = area.map(*x, *y);
                if pen_down {
                    line.line_to(px, py);
                } else {
                    line.move_to(px, py);
                    pen_down = true;
                }
            }
            None => pen_down = false,
        }
    }
    if let Some(path) = line.finish() {
        stroke(&mut pixmap, &path, SERIES_COLOR, config.line_width);
    }

    let mut markers = PathBuilder::new();
    for (x, y) in points.iter().flatten() {
        let (px, py) = area.map(*x, *y);
        markers.push_circle(px, py, config.marker_radius);
    }
    if let Some(path) = markers.finish() {
        pixmap.fill_path(
            &path,
            &paint(SERIES_COLOR),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }

    // The canvas was filled opaque, so premultiplied and straight RGB
    // agree and alpha can be dropped.
    let data = pixmap.data();
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let off = ((y * width + x) * 4) as usize;
        Rgb([data[off], data[off + 1], data[off + 2]])
    }))
}

/// Render the growth-rate plot of `series` as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::InvalidPlotSize`] for an unusable canvas or
/// [`ExportError::Image`] if PNG encoding fails.
pub fn growth_plot_png(series: &AggregatedSeries, config: &PlotConfig) -> Result<Vec<u8>, ExportError> {
    let img = render_growth_plot(series, config)?;
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(bytes)
}

/// Data bounds padded by 5 %, always including zero on the y axis.
#[allow(clippy::cast_precision_loss)]
fn plot_area(
    series: &AggregatedSeries,
    points: &[Option<(f64, f64)>],
    config: &PlotConfig,
) -> PlotArea {
    let (mut x_min, mut x_max) = series
        .rows
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
            let f = r.frame as f64;
            (lo.min(f), hi.max(f))
        });
    if !x_min.is_finite() {
        (x_min, x_max) = (0.0, 1.0);
    }
    let (mut y_min, mut y_max) = points
        .iter()
        .flatten()
        .fold((0.0_f64, 0.0_f64), |(lo, hi), (_, y)| (lo.min(*y), hi.max(*y)));
    (x_min, x_max) = pad(x_min, x_max);
    (y_min, y_max) = pad(y_min, y_max);

    let margin = config.margin as f32;
    let (w, h) = (config.width as f32, config.height as f32);
    // Half-pixel offsets keep 1 px axis strokes on whole pixels.
    PlotArea {
        x_min,
        x_max,
        y_min,
        y_max,
        left: margin + 0.5,
        right: w - margin,
        top: margin,
        bottom: h - margin - 0.5,
    }
}

fn pad(lo: f64, hi: f64) -> (f64, f64) {
    if hi - lo <= f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let extra = (hi - lo) * 0.05;
    (lo - extra, hi + extra)
}

fn draw_axes(pixmap: &mut Pixmap, area: &PlotArea) {
    let mut pb = PathBuilder::new();
    pb.move_to(area.left, area.top);
    pb.line_to(area.left, area.bottom);
    pb.line_to(area.right, area.bottom);
    for i in 0..=TICKS {
        #[allow(clippy::cast_precision_loss)]
        let t = i as f32 / TICKS as f32;
        let x = (area.right - area.left).mul_add(t, area.left);
        pb.move_to(x, area.bottom);
        pb.line_to(x, area.bottom + TICK_LENGTH);
        let y = (area.top - area.bottom).mul_add(t, area.bottom);
        pb.move_to(area.left, y);
        pb.line_to(area.left - TICK_LENGTH, y);
    }
    if let Some(path) = pb.finish() {
        stroke(pixmap, &path, AXIS_COLOR, 1.0);
    }

    let (_, zero_y) = area.map(area.x_min, 0.0);
    if zero_y < area.bottom - 1.0
        && let Some(rect) = Rect::from_ltrb(area.left + 1.0, zero_y, area.right, zero_y + 1.0)
    {
        pixmap.fill_rect(rect, &paint(ZERO_COLOR), Transform::identity(), None);
    }
}

fn paint(color: Rgb<u8>) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], 255);
    paint.anti_alias = true;
    paint
}

fn stroke(pixmap: &mut Pixmap, path: &tiny_skia::Path, color: Rgb<u8>, width: f32) {
    let stroke = Stroke {
        width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };
    pixmap.stroke_path(path, &paint(color), &stroke, Transform::identity(), None);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crystal_pipeline::{GapPolicy, MeasurementMode, MeasurementRecord, ScaleConfig, aggregate};

    fn series(widths: &[Option<f64>], gap: GapPolicy) -> AggregatedSeries {
        let records: Vec<MeasurementRecord> = widths
            .iter()
            .enumerate()
            .map(|(frame, w)| MeasurementRecord {
                frame,
                width: *w,
                height: w.map(|_| 1.0),
                angle: w.map(|_| 0.0),
                class_label: None,
            })
            .collect();
        aggregate(&records, MeasurementMode::WidthOnly, &ScaleConfig::default(), gap).unwrap()
    }

    fn count_color(img: &RgbImage, color: Rgb<u8>) -> usize {
        img.pixels().filter(|p| **p == color).count()
    }

    fn count_dark(img: &RgbImage) -> usize {
        img.pixels().filter(|p| p.0.iter().all(|&c| c < 64)).count()
    }

    #[test]
    fn plot_has_requested_size() {
        let s = series(&[Some(10.0), Some(20.0), Some(15.0)], GapPolicy::SkipMissing);
        let img = render_growth_plot(&s, &PlotConfig::default()).unwrap();
        assert_eq!(img.dimensions(), (640, 480));
        assert!(count_color(&img, SERIES_COLOR) > 0);
        assert!(count_dark(&img) > 0);
    }

    #[test]
    fn empty_series_draws_axes_only() {
        let empty = AggregatedSeries {
            mode: MeasurementMode::WidthOnly,
            rows: Vec::new(),
        };
        let img = render_growth_plot(&empty, &PlotConfig::default()).unwrap();
        assert_eq!(count_color(&img, SERIES_COLOR), 0);
        assert!(count_dark(&img) > 0);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn markers_sit_at_data_points() {
        // Rates are 100 % (frame 1) and -25 % (frame 2).
        let s = series(&[Some(10.0), Some(20.0), Some(15.0)], GapPolicy::SkipMissing);
        let config = PlotConfig::default();
        let img = render_growth_plot(&s, &config).unwrap();
        let points: Vec<Option<(f64, f64)>> = s
            .rows
            .iter()
            .map(|r| r.growth_rate_percent.map(|g| (r.frame as f64, g)))
            .collect();
        let area = plot_area(&s, &points, &config);
        for (x, y) in points.iter().flatten() {
            let (px, py) = area.map(*x, *y);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let pixel = img.get_pixel(px as u32, py as u32);
            assert_eq!(*pixel, SERIES_COLOR, "marker missing at frame {x}");
        }
    }

    #[test]
    fn gap_breaks_the_line() {
        let config = PlotConfig::default();
        let joined = series(&[Some(10.0), Some(20.0), Some(30.0), Some(40.0)], GapPolicy::PreserveGap);
        let gapped = series(&[Some(10.0), Some(20.0), None, Some(30.0), Some(40.0)], GapPolicy::PreserveGap);
        let a = count_color(&render_growth_plot(&joined, &config).unwrap(), SERIES_COLOR);
        let b = count_color(&render_growth_plot(&gapped, &config).unwrap(), SERIES_COLOR);
        // Two isolated markers with no segment between them.
        assert!(b < a, "gapped {b} joined {a}");
    }

    #[test]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn ticks_mark_both_axes() {
        let s = series(&[Some(10.0), Some(20.0), Some(15.0)], GapPolicy::SkipMissing);
        let config = PlotConfig::default();
        let img = render_growth_plot(&s, &config).unwrap();
        let points: Vec<Option<(f64, f64)>> = s
            .rows
            .iter()
            .map(|r| r.growth_rate_percent.map(|g| (r.frame as f64, g)))
            .collect();
        let area = plot_area(&s, &points, &config);
        let inked = |x: f32, y: f32| {
            let (cx, cy) = (x.round() as i64, y.round() as i64);
            (cx - 1..=cx + 1).any(|px| {
                (cy - 1..=cy + 1).any(|py| {
                    img.get_pixel(px as u32, py as u32).0.iter().all(|&c| c < 200)
                })
            })
        };
        let below = area.bottom + TICK_LENGTH / 2.0 + 0.5;
        let beside = area.left - TICK_LENGTH / 2.0 - 0.5;
        for i in 0..=TICKS {
            let t = i as f32 / TICKS as f32;
            let x = (area.right - area.left).mul_add(t, area.left);
            let y = (area.top - area.bottom).mul_add(t, area.bottom);
            assert!(inked(x, below), "x tick {i}");
            assert!(inked(beside, y), "y tick {i}");
        }
        let between = (area.right - area.left).mul_add(0.5 / TICKS as f32, area.left);
        assert!(!inked(between, below));
    }

    #[test]
    fn too_small_canvas_is_rejected() {
        let s = series(&[Some(1.0)], GapPolicy::SkipMissing);
        let config = PlotConfig {
            width: 80,
            height: 80,
            ..PlotConfig::default()
        };
        assert!(matches!(
            render_growth_plot(&s, &config),
            Err(ExportError::InvalidPlotSize { width: 80, height: 80 })
        ));
    }

    #[test]
    fn png_bytes_decode() {
        let s = series(&[Some(10.0), Some(12.0)], GapPolicy::SkipMissing);
        let bytes = growth_plot_png(&s, &PlotConfig::default()).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (640, 480));
    }
}

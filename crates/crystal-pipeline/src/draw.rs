//! Annotation overlays: Hough segments, the bounding box, and contour
//! rings.
//!
//! Overlays are always drawn on a copy; the resized frame stage stays
//! untouched.

use image::Rgb;
use imageproc::drawing::draw_line_segment_mut;

use crate::types::{LineSegment, Point, RgbImage, RotatedBox};

/// Hough segment color.
pub const LINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Bounding box outline color.
pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Stroke width in pixels of both overlays.
pub const STROKE_WIDTH: u32 = 2;

/// Copy of `frame` with every segment drawn in [`LINE_COLOR`].
///
/// With no segments the copy is pixel-identical to `frame`.
#[must_use]
pub fn draw_segments(frame: &RgbImage, segments: &[LineSegment]) -> RgbImage {
    let mut canvas = frame.clone();
    for segment in segments {
        draw_thick_line(&mut canvas, segment.start, segment.end, LINE_COLOR);
    }
    canvas
}

/// Copy of `frame` with the outline of `rect` drawn in [`BOX_COLOR`].
#[must_use]
pub fn draw_rotated_box(frame: &RgbImage, rect: &RotatedBox) -> RgbImage {
    let mut canvas = frame.clone();
    let corners = rect.corners().map(|p| Point::new(p.x.round(), p.y.round()));
    for (i, &start) in corners.iter().enumerate() {
        let end = corners[(i + 1) % corners.len()];
        draw_thick_line(&mut canvas, start, end, BOX_COLOR);
    }
    canvas
}

/// Copy of `frame` with every closed ring outlined in [`LINE_COLOR`].
#[must_use]
pub fn draw_rings(frame: &RgbImage, rings: &[Vec<Point>]) -> RgbImage {
    let mut canvas = frame.clone();
    for ring in rings {
        for (i, &start) in ring.iter().enumerate() {
            let end = ring[(i + 1) % ring.len()];
            draw_thick_line(&mut canvas, start, end, LINE_COLOR);
        }
    }
    canvas
}

/// Draw a line [`STROKE_WIDTH`] pixels wide by repeating it shifted
/// along the minor axis.
fn draw_thick_line(canvas: &mut RgbImage, start: Point, end: Point, color: Rgb<u8>) {
    let steep = (end.y - start.y).abs() > (end.x - start.x).abs();
    for offset in 0..STROKE_WIDTH {
        let offset = f64::from(offset);
        let (ox, oy) = if steep { (offset, 0.0) } else { (0.0, offset) };
        #[allow(clippy::cast_possible_truncation)]
        draw_line_segment_mut(
            canvas,
            ((start.x + ox) as f32, (start.y + oy) as f32),
            ((end.x + ox) as f32, (end.y + oy) as f32),
            color,
        );
    }
}

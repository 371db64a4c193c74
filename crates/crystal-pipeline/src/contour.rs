//! Outer contour extraction for the contour-processed frame set.
//!
//! Border following comes from `imageproc::contours::find_contours`
//! (Suzuki-Abe). Only outermost borders are kept: holes, and anything
//! nested inside another component, are dropped.

use image::GrayImage;
use imageproc::contours::{BorderType, Contour};

use crate::types::Point;

/// Outermost borders of the foreground components of `mask`.
///
/// Non-zero pixels are foreground. Each contour is a closed ring of
/// pixel-centre coordinates without a repeated end point.
#[must_use]
pub fn outer_contours(mask: &GrayImage) -> Vec<Vec<Point>> {
    let contours: Vec<Contour<u32>> = imageproc::contours::find_contours(mask);
    contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            c.points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect()
        })
        .collect()
}

/// Unsigned area enclosed by a closed ring (shoelace formula).
///
/// Fewer than three points enclose nothing.
#[must_use]
pub fn polygon_area(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let twice: f64 = ring
        .iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(a, b)| a.x.mul_add(b.y, -(b.x * a.y)))
        .sum();
    (twice * 0.5).abs()
}

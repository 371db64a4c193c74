//! Rotation-corrected bounding box from Hough line segments.
//!
//! The crystal's principal axis is taken to be the line through the two
//! segment endpoints that lie furthest apart. Every endpoint is rotated
//! by the negated axis angle about the midrange center of the point
//! set, which aligns the axis with x; the spans of the rotated points
//! are the crystal's width (along the axis) and height (across it).
//!
//! # Strategy pattern
//!
//! The furthest-pair search is pluggable through [`FurthestPair`] and
//! selected at runtime with [`FurthestPairKind`]. The exhaustive search
//! is quadratic but has a well-defined tie-break; the convex-hull search
//! only examines hull vertices, which pays off on large point sets.

use geo::{ConvexHull, MultiPoint};
use serde::{Deserialize, Serialize};

use crate::types::{LineSegment, Point, RotatedBox};

/// Selects which furthest-pair search to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FurthestPairKind {
    /// Compare every pair `i < j`; the first pair reaching the maximum
    /// distance wins.
    #[default]
    Exhaustive,
    /// Restrict the search to the vertices of the convex hull (via
    /// `geo`). The same maximum distance is found, but among equally
    /// distant pairs the winner may differ from the exhaustive search.
    ConvexHull,
}

/// Trait for furthest-pair strategies.
pub trait FurthestPair {
    /// The two points with the greatest separation, in input order.
    ///
    /// Returns `None` when fewer than two distinct points exist.
    fn furthest_pair(&self, points: &[Point]) -> Option<(Point, Point)>;
}

impl FurthestPair for FurthestPairKind {
    fn furthest_pair(&self, points: &[Point]) -> Option<(Point, Point)> {
        match *self {
            Self::Exhaustive => exhaustive(points),
            Self::ConvexHull => via_convex_hull(points),
        }
    }
}

fn exhaustive(points: &[Point]) -> Option<(Point, Point)> {
    let mut best = None;
    let mut max_distance = 0.0;
    for (i, &a) in points.iter().enumerate() {
        for &b in &points[i + 1..] {
            let d = a.distance_squared(b);
            if d > max_distance {
                max_distance = d;
                best = Some((a, b));
            }
        }
    }
    best
}

/// Convert a pipeline `Point` to a `geo::Point`.
const fn point_to_geo(p: Point) -> geo::Point<f64> {
    geo::Point(geo::Coord { x: p.x, y: p.y })
}

/// Convert a `geo::Coord` back to a pipeline `Point`.
const fn coord_to_point(c: geo::Coord<f64>) -> Point {
    Point::new(c.x, c.y)
}

fn via_convex_hull(points: &[Point]) -> Option<(Point, Point)> {
    if points.len() < 3 {
        return exhaustive(points);
    }
    let cloud: MultiPoint<f64> = points.iter().copied().map(point_to_geo).collect();
    let hull = cloud.convex_hull();
    let mut vertices: Vec<Point> = hull.exterior().coords().copied().map(coord_to_point).collect();
    // The ring is closed; drop the repeated first vertex.
    vertices.pop();
    if vertices.len() < 2 {
        return exhaustive(points);
    }
    exhaustive(&vertices)
}

/// Rotate `point` by `angle_degrees` about `center`, rounding the result
/// to the nearest pixel.
#[must_use]
pub fn rotate_point(point: Point, angle_degrees: f64, center: Point) -> Point {
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let (dx, dy) = (point.x - center.x, point.y - center.y);
    let qx = center.x + cos.mul_add(dx, -(sin * dy));
    let qy = center.y + sin.mul_add(dx, cos * dy);
    Point::new(qx.round(), qy.round())
}

/// Segment endpoints as one point set: start, end per segment, in
/// segment order.
#[must_use]
pub fn endpoints(segments: &[LineSegment]) -> Vec<Point> {
    segments.iter().flat_map(|s| [s.start, s.end]).collect()
}

/// Fit a rotated box around all segment endpoints.
///
/// Returns `None` only when there are no segments. Degenerate inputs
/// (all endpoints coincident) produce a zero-sized box at angle 0.
#[must_use]
pub fn fit_rotated_box(segments: &[LineSegment], strategy: &dyn FurthestPair) -> Option<RotatedBox> {
    let points = endpoints(segments);
    let first = *points.first()?;

    let (min, max) = points.iter().fold((first, first), |(lo, hi), p| {
        (
            Point::new(lo.x.min(p.x), lo.y.min(p.y)),
            Point::new(hi.x.max(p.x), hi.y.max(p.y)),
        )
    });
    let center = Point::new(f64::midpoint(min.x, max.x), f64::midpoint(min.y, max.y));

    let angle = strategy
        .furthest_pair(&points)
        .map_or(0.0, |(a, b)| (b.y - a.y).atan2(b.x - a.x).to_degrees());

    let rotated: Vec<Point> = points
        .iter()
        .map(|&p| rotate_point(p, -angle, center))
        .collect();
    let span = |coord: fn(&Point) -> f64| {
        let (lo, hi) = rotated
            .iter()
            .map(coord)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        hi - lo
    };

    Some(RotatedBox {
        center,
        width: span(|p| p.x),
        height: span(|p| p.y),
        angle,
    })
}

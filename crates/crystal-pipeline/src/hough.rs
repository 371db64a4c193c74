//! Progressive probabilistic Hough transform for line segments.
//!
//! Edge pixels are visited in a random order (seeded, so runs are
//! reproducible). Each visited pixel votes into a rho/theta accumulator;
//! once any bin reaches the vote threshold, the corridor along that line
//! is walked in both directions from the pixel, bridging gaps of up to
//! `max_line_gap` missing pixels. The walked pixels are removed from the
//! edge set, and if the segment is long enough their votes are taken
//! back out of the accumulator so they cannot seed another line.
//!
//! The walk uses 16-bit fixed point along the minor axis, and a segment
//! is kept when its extent along x *or* y reaches `min_line_length`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::types::{GrayImage, HoughConfig, LineSegment, Point};

const SHIFT: u32 = 16;

/// Detect line segments in a binary edge map.
///
/// Non-zero pixels are edge pixels. Segments are returned in the order
/// they were found. An image without lines yields an empty vector.
#[must_use]
pub fn detect_segments(edges: &GrayImage, config: &HoughConfig) -> Vec<LineSegment> {
    let (w, h) = edges.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let mut hough = Accumulator::new(w, h, config);

    let mut mask = vec![false; (w * h) as usize];
    let mut points: Vec<(u32, u32)> = Vec::new();
    for (x, y, p) in edges.enumerate_pixels() {
        if p.0[0] != 0 {
            mask[(y * w + x) as usize] = true;
            points.push((x, y));
        }
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut segments = Vec::new();
    let threshold = i64::from(config.threshold);
    let min_length = i64::from(config.min_line_length);
    let max_gap = i64::from(config.max_line_gap);
    let width = i64::from(w);
    let height = i64::from(h);

    while !points.is_empty() {
        let idx = rng.gen_range(0..points.len());
        let (px, py) = points.swap_remove(idx);
        if !mask[(py * w + px) as usize] {
            continue;
        }

        let Some(best) = hough.vote(px, py) else {
            continue;
        };
        if best.votes < threshold {
            continue;
        }

        let walk = Walk::new(&hough, best.angle, px, py);

        // Find the extent of the line in both directions.
        let mut ends = [(i64::from(px), i64::from(py)); 2];
        for (k, end) in ends.iter_mut().enumerate() {
            let mut gap = 0;
            for (x, y) in walk.steps(k == 1) {
                if x < 0 || x >= width || y < 0 || y >= height {
                    break;
                }
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let cell = (y * width + x) as usize;
                if mask[cell] {
                    gap = 0;
                    *end = (x, y);
                } else {
                    gap += 1;
                    if gap > max_gap {
                        break;
                    }
                }
            }
        }

        let good_line = (ends[1].0 - ends[0].0).abs() >= min_length
            || (ends[1].1 - ends[0].1).abs() >= min_length;

        // Clear the corridor, returning its votes if the line is kept.
        for (k, end) in ends.iter().enumerate() {
            for (x, y) in walk.steps(k == 1) {
                if x < 0 || x >= width || y < 0 || y >= height {
                    break;
                }
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let cell = (y * width + x) as usize;
                if mask[cell] {
                    if good_line {
                        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                        hough.unvote(x as u32, y as u32);
                    }
                    mask[cell] = false;
                }
                if (x, y) == *end {
                    break;
                }
            }
        }

        if good_line {
            #[allow(clippy::cast_precision_loss)]
            segments.push(LineSegment::new(
                Point::new(ends[0].0 as f64, ends[0].1 as f64),
                Point::new(ends[1].0 as f64, ends[1].1 as f64),
            ));
        }
    }

    debug!(segments = segments.len(), "hough transform");
    segments
}

struct Peak {
    angle: usize,
    votes: i64,
}

/// Rho/theta vote table with precomputed trigonometry.
struct Accumulator {
    /// `cos(theta) / rho` and `sin(theta) / rho` per angle bin.
    trig: Vec<(f64, f64)>,
    num_rho: usize,
    votes: Vec<i64>,
}

impl Accumulator {
    fn new(w: u32, h: u32, config: &HoughConfig) -> Self {
        let theta = config.theta_resolution.to_radians();
        let inv_rho = 1.0 / config.rho_resolution;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let num_angle = (std::f64::consts::PI / theta).round().max(1.0) as usize;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let num_rho = ((f64::from(w + h) * 2.0 + 1.0) * inv_rho).round().max(1.0) as usize;

        let trig = (0..num_angle)
            .map(|n| {
                #[allow(clippy::cast_precision_loss)]
                let (sin, cos) = (n as f64 * theta).sin_cos();
                (cos * inv_rho, sin * inv_rho)
            })
            .collect();
        Self {
            trig,
            num_rho,
            votes: vec![0; num_angle * num_rho],
        }
    }

    fn rho_bin(&self, n: usize, x: u32, y: u32) -> Option<usize> {
        let (cos, sin) = self.trig[n];
        #[allow(clippy::cast_possible_truncation)]
        let r = f64::from(x).mul_add(cos, f64::from(y) * sin).round() as i64;
        let offset = i64::try_from((self.num_rho - 1) / 2).ok()?;
        usize::try_from(r + offset).ok().filter(|&r| r < self.num_rho)
    }

    /// Add the votes of one point and return the strongest bin it
    /// touched.
    fn vote(&mut self, x: u32, y: u32) -> Option<Peak> {
        let mut best: Option<Peak> = None;
        for n in 0..self.trig.len() {
            let Some(r) = self.rho_bin(n, x, y) else {
                continue;
            };
            let cell = &mut self.votes[n * self.num_rho + r];
            *cell += 1;
            let votes = *cell;
            if best.as_ref().is_none_or(|b| votes > b.votes) {
                best = Some(Peak { angle: n, votes });
            }
        }
        best
    }

    fn unvote(&mut self, x: u32, y: u32) {
        for n in 0..self.trig.len() {
            if let Some(r) = self.rho_bin(n, x, y) {
                let cell = &mut self.votes[n * self.num_rho + r];
                *cell = (*cell - 1).max(0);
            }
        }
    }
}

/// Fixed-point stepping along one accumulator line through a pixel.
struct Walk {
    /// Step along x when true, along y otherwise.
    x_major: bool,
    start: (i64, i64),
    step: (i64, i64),
}

impl Walk {
    fn new(hough: &Accumulator, angle: usize, px: u32, py: u32) -> Self {
        let (cos, sin) = hough.trig[angle];
        // Line direction is perpendicular to the normal (cos, sin).
        let (a, b) = (-sin, cos);
        let (x0, y0) = (i64::from(px), i64::from(py));
        let one = f64::from(1u32 << SHIFT);
        let half = 1i64 << (SHIFT - 1);

        if a.abs() > b.abs() {
            let dx = if a > 0.0 { 1 } else { -1 };
            #[allow(clippy::cast_possible_truncation)]
            let dy = (b * one / a.abs()).round() as i64;
            Self {
                x_major: true,
                start: (x0, (y0 << SHIFT) + half),
                step: (dx, dy),
            }
        } else {
            let dy = if b > 0.0 { 1 } else { -1 };
            #[allow(clippy::cast_possible_truncation)]
            let dx = (a * one / b.abs()).round() as i64;
            Self {
                x_major: false,
                start: ((x0 << SHIFT) + half, y0),
                step: (dx, dy),
            }
        }
    }

    /// Pixel positions from the start point outward, forward or
    /// reversed. The start pixel itself comes first.
    fn steps(&self, reverse: bool) -> impl Iterator<Item = (i64, i64)> + '_ {
        let (dx, dy) = if reverse {
            (-self.step.0, -self.step.1)
        } else {
            self.step
        };
        let mut pos = self.start;
        std::iter::from_fn(move || {
            let (x, y) = pos;
            pos = (x + dx, y + dy);
            Some(if self.x_major {
                (x, y >> SHIFT)
            } else {
                (x >> SHIFT, y)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_line_segment_mut;

    fn canvas() -> GrayImage {
        GrayImage::new(120, 100)
    }

    fn config() -> HoughConfig {
        HoughConfig::default()
    }

    #[test]
    fn empty_image_has_no_segments() {
        assert!(detect_segments(&canvas(), &config()).is_empty());
    }

    #[test]
    fn horizontal_line_is_found() {
        let mut img = canvas();
        draw_line_segment_mut(&mut img, (10.0, 50.0), (100.0, 50.0), Luma([255]));
        let segments = detect_segments(&img, &config());
        assert_eq!(segments.len(), 1, "{segments:?}");
        let s = segments[0];
        let (x_min, x_max) = (s.start.x.min(s.end.x), s.start.x.max(s.end.x));
        assert!((x_min - 10.0).abs() <= 1.0 && (x_max - 100.0).abs() <= 1.0, "{s:?}");
        assert!((s.start.y - 50.0).abs() < f64::EPSILON);
        assert!((s.end.y - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn vertical_line_is_found() {
        let mut img = canvas();
        draw_line_segment_mut(&mut img, (60.0, 5.0), (60.0, 90.0), Luma([255]));
        let segments = detect_segments(&img, &config());
        assert_eq!(segments.len(), 1, "{segments:?}");
        assert!(segments[0].length() >= 80.0);
    }

    #[test]
    fn short_line_is_rejected() {
        let mut img = canvas();
        draw_line_segment_mut(&mut img, (10.0, 10.0), (20.0, 10.0), Luma([255]));
        assert!(detect_segments(&img, &config()).is_empty());
    }

    #[test]
    fn gap_within_limit_is_bridged() {
        let mut img = canvas();
        draw_line_segment_mut(&mut img, (10.0, 40.0), (50.0, 40.0), Luma([255]));
        draw_line_segment_mut(&mut img, (56.0, 40.0), (100.0, 40.0), Luma([255]));
        let segments = detect_segments(&img, &config());
        assert_eq!(segments.len(), 1, "{segments:?}");
        assert!(segments[0].length() >= 85.0);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let mut img = canvas();
        draw_line_segment_mut(&mut img, (5.0, 5.0), (110.0, 90.0), Luma([255]));
        draw_line_segment_mut(&mut img, (5.0, 90.0), (110.0, 20.0), Luma([255]));
        draw_line_segment_mut(&mut img, (30.0, 10.0), (30.0, 95.0), Luma([255]));
        assert_eq!(detect_segments(&img, &config()), detect_segments(&img, &config()));
    }

    #[test]
    fn rectangle_outline_yields_its_sides() {
        let mut img = canvas();
        let corners = [(20.0, 20.0), (100.0, 20.0), (100.0, 80.0), (20.0, 80.0)];
        for i in 0..4 {
            draw_line_segment_mut(&mut img, corners[i], corners[(i + 1) % 4], Luma([255]));
        }
        let segments = detect_segments(&img, &config());
        assert!(segments.len() >= 4, "{segments:?}");
        for s in &segments {
            for p in [s.start, s.end] {
                assert!((19.0..=101.0).contains(&p.x) && (19.0..=81.0).contains(&p.y), "{p:?}");
            }
        }
    }

    #[test]
    fn walk_starts_at_pixel() {
        let hough = Accumulator::new(10, 10, &config());
        let walk = Walk::new(&hough, 90, 4, 6);
        let first: Vec<_> = walk.steps(false).take(1).collect();
        assert_eq!(first, vec![(4, 6)]);
    }
}

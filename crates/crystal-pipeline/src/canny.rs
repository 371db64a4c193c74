//! Canny edge detection on the closed binary mask.
//!
//! Gradients come from `imageproc`'s 3x3 Sobel operators with L1
//! magnitude `|gx| + |gy|`. The image is padded by one pixel with
//! reflect-101 first so border responses match OpenCV. No smoothing is applied first since
//! the input is already a cleaned binary mask.
//!
//! Non-maximum suppression quantizes the gradient direction into four
//! sectors using the tangent of 22.5°. Horizontal and vertical sectors
//! accept a pixel when it is strictly greater than the neighbour behind
//! it and at least the one ahead, so plateaus of width two still keep
//! one edge pixel.
//!
//! Hysteresis grows strong edges (`magnitude > high`) through
//! 8-connected weak pixels (`magnitude > low`). The flood fill checks
//! every neighbour against the image bounds, so edges that touch the
//! border are followed safely.

use image::{GrayImage, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::blur::pad_reflect_101;

/// `tan(22.5°)`.
const TAN_22_5: f32 = 0.414_213_57;
/// `tan(67.5°)`.
const TAN_67_5: f32 = 2.414_213_6;

/// Detect edges. Output pixels are 255 on edges, 0 elsewhere.
///
/// `low` is clamped to at most `high`.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }
    let low = low.min(high);
    let gradients = sobel(image);
    let suppressed = non_maximum_suppression(&gradients, w, h);
    hysteresis(&suppressed, w, h, low, high)
}

/// Per-pixel Sobel response, row-major.
#[derive(Debug, Clone, Copy, Default)]
struct Gradient {
    gx: i32,
    gy: i32,
    magnitude: i32,
}

fn sobel(image: &GrayImage) -> Vec<Gradient> {
    let (w, h) = image.dimensions();
    let padded = pad_reflect_101(image, 1);
    let gx = horizontal_sobel(&padded);
    let gy = vertical_sobel(&padded);

    let mut out = Vec::with_capacity((w * h) as usize);
    for y in 1..=h {
        for x in 1..=w {
            let gx = i32::from(gx.get_pixel(x, y).0[0]);
            let gy = i32::from(gy.get_pixel(x, y).0[0]);
            out.push(Gradient {
                gx,
                gy,
                magnitude: gx.abs() + gy.abs(),
            });
        }
    }
    out
}

/// Keep only local maxima along the gradient direction; returns the
/// surviving magnitudes (0 where suppressed).
fn non_maximum_suppression(gradients: &[Gradient], w: u32, h: u32) -> Vec<i32> {
    // Magnitudes outside the image count as zero.
    let mag = |x: i64, y: i64| -> i32 {
        if x < 0 || y < 0 || x >= i64::from(w) || y >= i64::from(h) {
            return 0;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let idx = (y * i64::from(w) + x) as usize;
        gradients[idx].magnitude
    };

    let mut out = vec![0; gradients.len()];
    for y in 0..i64::from(h) {
        for x in 0..i64::from(w) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let idx = (y * i64::from(w) + x) as usize;
            let g = gradients[idx];
            let m = g.magnitude;
            if m == 0 {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let (ax, ay) = (g.gx.abs() as f32, g.gy.abs() as f32);

            let is_max = if ay < ax * TAN_22_5 {
                m > mag(x - 1, y) && m >= mag(x + 1, y)
            } else if ay > ax * TAN_67_5 {
                m > mag(x, y - 1) && m >= mag(x, y + 1)
            } else {
                let s = if (g.gx ^ g.gy) < 0 { -1 } else { 1 };
                m > mag(x - s, y - 1) && m > mag(x + s, y + 1)
            };
            if is_max {
                out[idx] = m;
            }
        }
    }
    out
}

fn hysteresis(magnitudes: &[i32], w: u32, h: u32, low: f32, high: f32) -> GrayImage {
    let mut out = GrayImage::new(w, h);
    let mut stack: Vec<(u32, u32)> = Vec::new();

    #[allow(clippy::cast_precision_loss)]
    let value = |x: u32, y: u32| magnitudes[(y * w + x) as usize] as f32;

    for y in 0..h {
        for x in 0..w {
            if out.get_pixel(x, y).0[0] != 0 || value(x, y) <= high {
                continue;
            }
            out.put_pixel(x, y, Luma([255]));
            stack.push((x, y));

            while let Some((cx, cy)) = stack.pop() {
                for (dx, dy) in NEIGHBOURS {
                    let (Some(nx), Some(ny)) =
                        (cx.checked_add_signed(dx), cy.checked_add_signed(dy))
                    else {
                        continue;
                    };
                    if nx >= w || ny >= h {
                        continue;
                    }
                    if out.get_pixel(nx, ny).0[0] == 0 && value(nx, ny) > low {
                        out.put_pixel(nx, ny, Luma([255]));
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }
    out
}

const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_count(edges: &GrayImage) -> u32 {
        edges.pixels().map(|p| u32::from(p.0[0] > 0)).sum()
    }

    /// 20x20 image with a sharp vertical boundary at x = 10.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _y| if x < 10 { Luma([0]) } else { Luma([255]) })
    }

    #[test]
    fn blank_image_produces_no_edges() {
        let img = GrayImage::from_pixel(20, 20, Luma([128]));
        assert_eq!(edge_count(&canny(&img, 50.0, 150.0)), 0);
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = GrayImage::new(17, 31);
        let edges = canny(&img, 50.0, 150.0);
        assert_eq!((edges.width(), edges.height()), (17, 31));
    }

    #[test]
    fn sharp_edge_is_one_pixel_wide() {
        let edges = canny(&sharp_edge_image(), 50.0, 150.0);
        for y in 0..20 {
            let row: Vec<u32> = (0..20).filter(|&x| edges.get_pixel(x, y).0[0] > 0).collect();
            assert_eq!(row.len(), 1, "row {y}: {row:?}");
            assert!(row[0] == 9 || row[0] == 10, "row {y}: {row:?}");
        }
    }

    #[test]
    fn edge_at_border_does_not_panic() {
        // A bright column right next to the left border; low thresholds
        // make the flood fill reach x = 0.
        let img = GrayImage::from_fn(10, 10, |x, _| if x == 1 { Luma([255]) } else { Luma([0]) });
        let edges = canny(&img, 1.0, 2.0);
        assert!(edge_count(&edges) > 0);
    }

    #[test]
    fn weak_edges_need_a_strong_neighbour() {
        // A step of 40 gives magnitude 160 (L1 Sobel), so it is weak for
        // a high threshold of 200 and nothing is reported.
        let img = GrayImage::from_fn(20, 20, |x, _| if x < 10 { Luma([100]) } else { Luma([140]) });
        assert_eq!(edge_count(&canny(&img, 50.0, 200.0)), 0);
        assert!(edge_count(&canny(&img, 50.0, 150.0)) > 0);
    }

    #[test]
    fn filled_square_yields_closed_outline() {
        let img = GrayImage::from_fn(40, 40, |x, y| {
            if (10..30).contains(&x) && (10..30).contains(&y) { Luma([255]) } else { Luma([0]) }
        });
        let edges = canny(&img, 50.0, 150.0);
        // Interior and far background stay clear.
        assert_eq!(edges.get_pixel(20, 20).0[0], 0);
        assert_eq!(edges.get_pixel(2, 2).0[0], 0);
        // Each side of the square is traced.
        assert!((8..12).any(|x| edges.get_pixel(x, 20).0[0] > 0));
        assert!((28..32).any(|x| edges.get_pixel(x, 20).0[0] > 0));
        assert!((8..12).any(|y| edges.get_pixel(20, y).0[0] > 0));
        assert!((28..32).any(|y| edges.get_pixel(20, y).0[0] > 0));
    }

    #[test]
    fn gradient_signs_follow_intensity_increase() {
        // Brighter to the right and downward.
        let img = GrayImage::from_fn(5, 5, |x, y| Luma([u8::try_from(x * 10 + y * 40).unwrap_or(0)]));
        let g = sobel(&img)[2 * 5 + 2];
        assert_eq!(g.gx, 80);
        assert_eq!(g.gy, 320);
        assert_eq!(g.magnitude, 400);
    }

    #[test]
    fn border_gradient_uses_mirrored_samples() {
        // Mirroring column 1 into the margin cancels the step at x = 0.
        let img = GrayImage::from_fn(4, 3, |x, _| if x == 1 { Luma([100]) } else { Luma([0]) });
        let gradients = sobel(&img);
        assert_eq!(gradients[4].gx, 0);
        assert_eq!(gradients[4 + 2].gx, -400);
    }

    #[test]
    fn inverted_thresholds_are_clamped() {
        let img = sharp_edge_image();
        assert_eq!(canny(&img, 200.0, 100.0), canny(&img, 100.0, 100.0));
    }

    #[test]
    fn deterministic() {
        let img = GrayImage::from_fn(25, 25, |x, y| Luma([((x * x + y * 3) % 256) as u8]));
        assert_eq!(canny(&img, 30.0, 90.0), canny(&img, 30.0, 90.0));
    }
}

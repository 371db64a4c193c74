//! Contrast-limited adaptive histogram equalization (CLAHE).
//!
//! Each tile of a fixed grid gets its own equalization mapping, built
//! from a histogram clipped at `clip_limit` times the mean bin height
//! with the excess spread evenly. Output pixels blend the mappings of
//! the four nearest tile centres bilinearly.
//!
//! When the image size is not a multiple of the grid, tiles are sized
//! by rounding up and the histogram of an overhanging tile samples the
//! image mirrored at its border (reflect-101), matching OpenCV.

use image::{GrayImage, Luma};

use crate::types::ClaheConfig;

const BINS: usize = 256;

/// Apply CLAHE to a grayscale image.
///
/// `config` must have a positive clip limit and a non-empty grid (see
/// [`AnalysisConfig::validate`](crate::AnalysisConfig::validate)).
#[must_use = "returns the equalized image"]
pub fn clahe(image: &GrayImage, config: &ClaheConfig) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tiles_x = config.tiles_x.max(1);
    let tiles_y = config.tiles_y.max(1);
    let tile_w = width.div_ceil(tiles_x);
    let tile_h = height.div_ceil(tiles_y);

    let luts: Vec<[u8; BINS]> = (0..tiles_y)
        .flat_map(|ty| (0..tiles_x).map(move |tx| (tx, ty)))
        .map(|(tx, ty)| tile_lut(image, tx * tile_w, ty * tile_h, tile_w, tile_h, config.clip_limit))
        .collect();
    let lut = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    #[allow(clippy::cast_precision_loss)]
    let (inv_tw, inv_th) = (1.0 / tile_w as f32, 1.0 / tile_h as f32);
    let last_tx = i64::from(tiles_x) - 1;
    let last_ty = i64::from(tiles_y) - 1;

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        #[allow(clippy::cast_precision_loss)]
        let tyf = (y as f32).mul_add(inv_th, -0.5);
        let ty_floor = tyf.floor();
        let ya = tyf - ty_floor;
        #[allow(clippy::cast_possible_truncation)]
        let ty_floor = ty_floor as i64;
        let ty1 = clamp_tile(ty_floor, last_ty);
        let ty2 = clamp_tile(ty_floor + 1, last_ty);

        for x in 0..width {
            #[allow(clippy::cast_precision_loss)]
            let txf = (x as f32).mul_add(inv_tw, -0.5);
            let tx_floor = txf.floor();
            let xa = txf - tx_floor;
            #[allow(clippy::cast_possible_truncation)]
            let tx_floor = tx_floor as i64;
            let tx1 = clamp_tile(tx_floor, last_tx);
            let tx2 = clamp_tile(tx_floor + 1, last_tx);

            let v = usize::from(image.get_pixel(x, y).0[0]);
            let top = f32::from(lut(tx1, ty1)[v]).mul_add(1.0 - xa, f32::from(lut(tx2, ty1)[v]) * xa);
            let bottom =
                f32::from(lut(tx1, ty2)[v]).mul_add(1.0 - xa, f32::from(lut(tx2, ty2)[v]) * xa);
            let value = top.mul_add(1.0 - ya, bottom * ya);
            out.put_pixel(x, y, Luma([saturate_u8(value)]));
        }
    }
    out
}

/// Build the clipped cumulative mapping for one tile.
fn tile_lut(
    image: &GrayImage,
    x0: u32,
    y0: u32,
    tile_w: u32,
    tile_h: u32,
    clip_limit: f64,
) -> [u8; BINS] {
    let (width, height) = image.dimensions();
    let mut hist = [0u32; BINS];
    for y in y0..y0 + tile_h {
        let sy = reflect_101(y, height);
        for x in x0..x0 + tile_w {
            let sx = reflect_101(x, width);
            hist[usize::from(image.get_pixel(sx, sy).0[0])] += 1;
        }
    }

    let area = tile_w * tile_h;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let clip = ((clip_limit * f64::from(area) / BINS as f64) as u32).max(1);
    clip_histogram(&mut hist, clip);

    #[allow(clippy::cast_precision_loss)]
    let scale = (BINS - 1) as f32 / area as f32;
    let mut lut = [0u8; BINS];
    let mut sum = 0u32;
    for (entry, count) in lut.iter_mut().zip(hist) {
        sum += count;
        #[allow(clippy::cast_precision_loss)]
        let mapped = sum as f32 * scale;
        *entry = saturate_u8(mapped);
    }
    lut
}

/// Clip every bin at `clip` and spread the excess over all bins.
///
/// The excess is distributed evenly; the remainder that does not divide
/// by the bin count goes one count at a time to bins spaced evenly
/// across the range.
fn clip_histogram(hist: &mut [u32; BINS], clip: u32) {
    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let bins = BINS as u32;
    let batch = excess / bins;
    let mut residual = excess - batch * bins;
    for count in hist.iter_mut() {
        *count += batch;
    }
    if residual > 0 {
        let step = (bins / residual).max(1) as usize;
        for count in hist.iter_mut().step_by(step) {
            if residual == 0 {
                break;
            }
            *count += 1;
            residual -= 1;
        }
    }
}

/// Mirror an index into `0..len` without repeating the edge sample.
pub(crate) const fn reflect_101(i: u32, len: u32) -> u32 {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let i = i % period;
    if i < len { i } else { period - i }
}

// Clamped into 0..=last, and last fits in u32.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn clamp_tile(index: i64, last: i64) -> u32 {
    if index < 0 {
        0
    } else if index > last {
        last as u32
    } else {
        index as u32
    }
}

/// Round to nearest and saturate into `u8`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn saturate_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClaheConfig {
        ClaheConfig::default()
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = GrayImage::from_fn(37, 23, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let out = clahe(&img, &config());
        assert_eq!(out.dimensions(), (37, 23));
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(64, 64, Luma([90]));
        let out = clahe(&img, &config());
        let first = out.get_pixel(0, 0).0[0];
        assert!(out.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn low_contrast_gradient_is_stretched() {
        // Values only span 100..=115; with a generous clip limit on a
        // single tile this is plain equalization and must widen the range.
        let img = GrayImage::from_fn(64, 64, |x, _| Luma([100 + (x / 4) as u8]));
        let single_tile = ClaheConfig {
            clip_limit: 40.0,
            tiles_x: 1,
            tiles_y: 1,
        };
        let out = clahe(&img, &single_tile);
        let (min, max) = out
            .pixels()
            .fold((255u8, 0u8), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
        assert!(max - min > 15, "range {min}..{max} was not stretched");
    }

    #[test]
    fn single_tile_mapping_preserves_order() {
        let img = GrayImage::from_fn(40, 40, |x, y| Luma([((x + y) * 3) as u8]));
        let single_tile = ClaheConfig {
            tiles_x: 1,
            tiles_y: 1,
            ..config()
        };
        let out = clahe(&img, &single_tile);
        for y in 0..40 {
            for x in 1..40 {
                assert!(out.get_pixel(x, y).0[0] >= out.get_pixel(x - 1, y).0[0]);
            }
        }
    }

    #[test]
    fn deterministic() {
        let img = GrayImage::from_fn(50, 30, |x, y| Luma([((x * x + y) % 256) as u8]));
        assert_eq!(clahe(&img, &config()), clahe(&img, &config()));
    }

    #[test]
    fn tiny_image_smaller_than_grid() {
        let img = GrayImage::from_fn(3, 2, |x, y| Luma([(x * 40 + y * 10) as u8]));
        let out = clahe(&img, &config());
        assert_eq!(out.dimensions(), (3, 2));
    }

    #[test]
    fn clip_histogram_preserves_total() {
        let mut hist = [0u32; BINS];
        hist[10] = 1000;
        hist[20] = 37;
        let before: u32 = hist.iter().sum();
        clip_histogram(&mut hist, 40);
        let after: u32 = hist.iter().sum();
        assert_eq!(before, after);
        assert!(hist.iter().all(|&c| c <= 40 + 4));
    }

    #[test]
    fn reflect_101_mirrors_without_edge_repeat() {
        assert_eq!(reflect_101(0, 5), 0);
        assert_eq!(reflect_101(4, 5), 4);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(3, 1), 0);
    }
}

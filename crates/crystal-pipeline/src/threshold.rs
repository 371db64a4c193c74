//! Gaussian adaptive thresholding.
//!
//! Each pixel is compared against the Gaussian-weighted mean of its
//! `block_size` x `block_size` neighbourhood, so the binarization follows
//! slow illumination changes across the frame. The local mean is
//! rounded to 8 bits and the offset is rounded up to an integer before
//! comparing, which keeps the result identical to OpenCV's
//! `ADAPTIVE_THRESH_GAUSSIAN_C` with `THRESH_BINARY`.

use image::{GrayImage, Luma};

use crate::blur::{Border, gaussian_blur_with_border};
use crate::types::ThresholdConfig;

/// Binarize `image` against its local Gaussian mean.
///
/// Output pixels are 255 where `src > mean - offset`, else 0.
#[must_use = "returns the binary image"]
pub fn adaptive_threshold(image: &GrayImage, config: &ThresholdConfig) -> GrayImage {
    let mean = gaussian_blur_with_border(image, config.block_size, Border::Replicate);
    #[allow(clippy::cast_possible_truncation)]
    let offset = config.offset.ceil().clamp(-256.0, 256.0) as i32;

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let src = i32::from(image.get_pixel(x, y).0[0]);
        let local = i32::from(mean.get_pixel(x, y).0[0]);
        if src - local > -offset {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_binary() {
        let img = GrayImage::from_fn(30, 30, |x, y| Luma([((x * 13 + y * 7) % 256) as u8]));
        let out = adaptive_threshold(&img, &ThresholdConfig::default());
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(out.dimensions(), (30, 30));
    }

    #[test]
    fn uniform_image_is_all_foreground() {
        // src == mean, and 0 > -2 holds everywhere.
        let img = GrayImage::from_pixel(20, 20, Luma([77]));
        let out = adaptive_threshold(&img, &ThresholdConfig::default());
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn dark_spot_on_bright_background_is_background() {
        let mut img = GrayImage::from_pixel(21, 21, Luma([200]));
        img.put_pixel(10, 10, Luma([20]));
        let out = adaptive_threshold(&img, &ThresholdConfig::default());
        assert_eq!(out.get_pixel(10, 10).0[0], 0);
        assert_eq!(out.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn large_negative_offset_clears_everything_flat() {
        let img = GrayImage::from_pixel(15, 15, Luma([100]));
        let config = ThresholdConfig {
            offset: -5.0,
            ..ThresholdConfig::default()
        };
        // 0 > 5 never holds on a flat image.
        let out = adaptive_threshold(&img, &config);
        assert!(out.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn fractional_offset_rounds_up() {
        let img = GrayImage::from_pixel(15, 15, Luma([100]));
        let config = ThresholdConfig {
            offset: -0.5,
            ..ThresholdConfig::default()
        };
        // ceil(-0.5) == 0, so the test is 0 > 0: background.
        let out = adaptive_threshold(&img, &config);
        assert!(out.pixels().all(|p| p.0[0] == 0));
    }
}

//! Luminance conversion.
//!
//! Reduces the resized color frame to a single channel using the
//! ITU-R BT.601 weights `0.299*R + 0.587*G + 0.114*B`, evaluated in
//! 14-bit fixed point with round-half-up so the result is exact and
//! platform independent.

use image::{GrayImage, Luma, RgbImage};

/// BT.601 weights scaled by `2^14`. They sum to exactly `2^14`.
const WEIGHT_R: u32 = 4899;
const WEIGHT_G: u32 = 9617;
const WEIGHT_B: u32 = 1868;
const SHIFT: u32 = 14;

/// Luminance of one RGB sample.
#[must_use]
pub fn luma(rgb: [u8; 3]) -> u8 {
    let [r, g, b] = rgb.map(u32::from);
    let value = (r * WEIGHT_R + g * WEIGHT_G + b * WEIGHT_B + (1 << (SHIFT - 1))) >> SHIFT;
    // Weights sum to 2^14, so value <= 255.
    u8::try_from(value).unwrap_or(u8::MAX)
}

/// Convert a color frame to grayscale.
#[must_use = "returns the grayscale image"]
pub fn to_grayscale(frame: &RgbImage) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        Luma([luma(frame.get_pixel(x, y).0)])
    })
}

/// Expand a grayscale raster back to three identical channels.
///
/// Used when a single-channel stage needs to be shown or drawn on in
/// color.
#[must_use]
pub fn to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        image::Rgb([v, v, v])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_unity() {
        assert_eq!(WEIGHT_R + WEIGHT_G + WEIGHT_B, 1 << SHIFT);
    }

    #[test]
    fn white_and_black_are_preserved() {
        assert_eq!(luma([255, 255, 255]), 255);
        assert_eq!(luma([0, 0, 0]), 0);
    }

    #[test]
    fn gray_input_is_unchanged() {
        for v in [1u8, 17, 128, 200, 254] {
            assert_eq!(luma([v, v, v]), v);
        }
    }

    #[test]
    fn channels_are_weighted() {
        let r = luma([255, 0, 0]);
        let g = luma([0, 255, 0]);
        let b = luma([0, 0, 255]);
        assert_eq!((r, g, b), (76, 150, 29));
        assert!(g > r && r > b);
    }

    #[test]
    fn output_dimensions_match_input() {
        let frame = RgbImage::from_pixel(17, 31, image::Rgb([128, 64, 32]));
        let gray = to_grayscale(&frame);
        assert_eq!((gray.width(), gray.height()), (17, 31));
    }

    #[test]
    fn rgb_expansion_round_trips() {
        let gray = GrayImage::from_fn(5, 4, |x, y| Luma([u8::try_from(x * 10 + y).unwrap_or(0)]));
        assert_eq!(to_grayscale(&to_rgb(&gray)), gray);
    }
}

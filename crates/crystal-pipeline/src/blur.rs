//! Gaussian blur for noise reduction before thresholding.
//!
//! Kernels are specified by their side length rather than by sigma,
//! with sigma derived from the size the way OpenCV does for
//! `GaussianBlur(src, (k, k), 0)`. The kernel is applied with
//! [`imageproc::filter::separable_filter_equal`] on an `f32` copy of the
//! image, so neither pass rounds until the final value.
//!
//! `imageproc` pads by continuity. Mirrored (reflect-101) borders are
//! produced by padding the image first and cropping the result, which
//! keeps Canny edge positions at the frame border in line with OpenCV.
//! The adaptive threshold uses the replicated border through
//! [`gaussian_blur_with_border`].

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::separable_filter_equal;

use crate::contrast::{reflect_101, saturate_u8};

type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Sigma for a Gaussian kernel of odd side `size`.
///
/// `0.3 * ((size - 1) * 0.5 - 1) + 0.8`, so a 3x3 kernel gets 0.8 and an
/// 11x11 kernel gets 2.0.
#[must_use]
pub fn sigma_for_kernel(size: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let half = (size.saturating_sub(1)) as f32 * 0.5;
    0.3f32.mul_add(half - 1.0, 0.8)
}

/// Normalized 1-D Gaussian weights for an odd kernel side.
#[must_use]
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = sigma_for_kernel(size);
    #[allow(clippy::cast_precision_loss)]
    let center = (size / 2) as f32;
    let scale = -0.5 / (sigma * sigma);
    let weights: Vec<f32> = (0..size)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let d = i as f32 - center;
            (scale * d * d).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// How samples outside the image are synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Border {
    /// Mirror without repeating the edge sample: `dcb|abcd|cba`.
    #[default]
    Reflect101,
    /// Repeat the edge sample: `aaa|abcd|ddd`.
    Replicate,
}

/// Grow `image` by `pad` pixels on every side, mirrored reflect-101.
#[must_use]
pub(crate) fn pad_reflect_101(image: &GrayImage, pad: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    GrayImage::from_fn(w + 2 * pad, h + 2 * pad, |x, y| {
        *image.get_pixel(reflect_101(x.abs_diff(pad), w), reflect_101(y.abs_diff(pad), h))
    })
}

/// Apply a `size` x `size` Gaussian blur to a grayscale image.
///
/// A size of 1 (or 0) returns the image unchanged.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, size: u32) -> GrayImage {
    gaussian_blur_with_border(image, size, Border::Reflect101)
}

/// [`gaussian_blur`] with an explicit border mode.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur_with_border(image: &GrayImage, size: u32, border: Border) -> GrayImage {
    let (w, h) = image.dimensions();
    if size <= 1 || w == 0 || h == 0 {
        return image.clone();
    }
    let kernel = gaussian_kernel(size);
    let pad = match border {
        Border::Reflect101 => size / 2,
        Border::Replicate => 0,
    };
    let padded = if pad > 0 {
        pad_reflect_101(image, pad)
    } else {
        image.clone()
    };

    let source = FloatImage::from_fn(padded.width(), padded.height(), |x, y| {
        Luma([f32::from(padded.get_pixel(x, y).0[0])])
    });
    let blurred = separable_filter_equal(&source, &kernel);
    GrayImage::from_fn(w, h, |x, y| {
        Luma([saturate_u8(blurred.get_pixel(x + pad, y + pad).0[0])])
    })
}

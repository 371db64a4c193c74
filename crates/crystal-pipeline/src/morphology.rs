//! Square-element morphology on binary masks.
//!
//! Closing (dilate, then erode) with a square structuring element fills
//! pinholes and narrow cracks in the crystal silhouette before edge
//! detection. Dilation alone thickens the edge maps of the derived frame
//! sets. A square element of side `2r + 1` is exactly the
//! Chebyshev (L∞) ball of radius `r`, so the binary operators from
//! `imageproc` apply directly. Pixels outside the image never
//! contribute to either pass.

use image::GrayImage;
use imageproc::distance_transform::Norm;

/// Close a binary image with a `kernel` x `kernel` square.
///
/// Non-zero pixels are foreground. Kernel sides of 1 or less return the
/// image unchanged; very large kernels saturate at the largest radius
/// `imageproc` accepts.
#[must_use = "returns the closed image"]
pub fn close(image: &GrayImage, kernel: u32) -> GrayImage {
    if kernel <= 1 {
        return image.clone();
    }
    imageproc::morphology::close(image, Norm::LInf, radius(kernel))
}

/// Dilate a binary image with a `kernel` x `kernel` square.
#[must_use = "returns the dilated image"]
pub fn dilate(image: &GrayImage, kernel: u32) -> GrayImage {
    if kernel <= 1 {
        return image.clone();
    }
    imageproc::morphology::dilate(image, Norm::LInf, radius(kernel))
}

fn radius(kernel: u32) -> u8 {
    u8::try_from(kernel / 2).unwrap_or(u8::MAX)
}

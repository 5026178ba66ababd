use std::path::Path;

use image::{DynamicImage, GrayImage, ImageError, ImageReader, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology;

use crate::error::{DetectError, Result};

/// Open and decode an image file, sniffing the format from its content.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| DetectError::decode(path, ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| DetectError::decode(path, ImageError::IoError(e)))?;

    reader.decode().map_err(|e| DetectError::decode(path, e))
}

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Gaussian sigma used for a square block of `block_size` pixels,
/// the same rule OpenCV applies when it derives sigma from a kernel size.
pub fn block_sigma(block_size: u32) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Adaptive Gaussian threshold, inverted.
///
/// A pixel becomes foreground (255) when it is at least `offset` darker than
/// the Gaussian-weighted mean of its `block_size` neighbourhood, so thin dark
/// lines on a lighter wall end up white in the mask.
pub fn adaptive_gaussian_threshold(gray: &GrayImage, block_size: u32, offset: i16) -> GrayImage {
    let local_mean = gaussian_blur_f32(gray, block_sigma(block_size));

    let mut mask = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let mean = local_mean.get_pixel(x, y)[0] as i16;
        let value = if pixel[0] as i16 <= mean - offset { 255 } else { 0 };
        mask.put_pixel(x, y, Luma([value]));
    }
    mask
}

/// Morphological close with a 3x3 square element applied `iterations` times.
///
/// `iterations` dilations followed by as many erosions; with the chessboard
/// norm that is a single close of radius `iterations`.
pub fn close_mask(mask: &GrayImage, iterations: u8) -> GrayImage {
    if iterations == 0 {
        return mask.clone();
    }
    morphology::close(mask, Norm::LInf, iterations)
}

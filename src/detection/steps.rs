use image::GrayImage;

use crate::detection::preprocessing;
use crate::pipeline::MaskStep;

/// Adaptive Gaussian threshold producing an inverted binary mask
pub struct AdaptiveThresholdStep {
    pub block_size: u32,
    pub offset: i16,
}

impl MaskStep for AdaptiveThresholdStep {
    fn process(&self, mask: GrayImage) -> GrayImage {
        preprocessing::adaptive_gaussian_threshold(&mask, self.block_size, self.offset)
    }

    fn name(&self) -> &str {
        "Adaptive Threshold"
    }
}

/// Morphological close with a 3x3 rectangle
pub struct MorphCloseStep {
    pub iterations: u8,
}

impl MaskStep for MorphCloseStep {
    fn process(&self, mask: GrayImage) -> GrayImage {
        preprocessing::close_mask(&mask, self.iterations)
    }

    fn name(&self) -> &str {
        "Morphological Close"
    }
}

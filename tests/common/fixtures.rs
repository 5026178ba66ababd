use std::path::{Path, PathBuf};

use crackscan::detection::annotate::Annotator;
use crackscan::{CrackScorer, DetectError, ImageStore, RegionExtractor};
use image::{ImageBuffer, Rgb, RgbImage};

pub const WALL: Rgb<u8> = Rgb([190, 190, 185]);
pub const CRACK: Rgb<u8> = Rgb([45, 40, 40]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// A 256x256 light wall with one dark, wandering, five pixel wide crack.
pub fn crack_wall() -> RgbImage {
    let mut img: RgbImage = ImageBuffer::from_pixel(256, 256, WALL);
    for x in 30u32..226 {
        let wobble = ((x / 7) % 4) as i32 - 2;
        let center = 60 + (x as i32) / 2 + wobble;
        for dy in -2..=2 {
            img.put_pixel(x, (center + dy) as u32, CRACK);
        }
    }
    img
}

/// The same wall without any crack.
pub fn blank_wall() -> RgbImage {
    ImageBuffer::from_pixel(256, 256, WALL)
}

/// Save `img` as PNG under `dir/name` and return the path.
pub fn write_image(img: &RgbImage, dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    img.save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    path
}

/// Extractor writing into `output_dir` with no label font, so only
/// regions ever change pixels.
pub fn fontless_extractor(output_dir: &Path) -> RegionExtractor {
    RegionExtractor::new(ImageStore::new(output_dir, 90)).with_annotator(Annotator::new(None))
}

pub fn count_color(img: &RgbImage, color: Rgb<u8>) -> usize {
    img.pixels().filter(|p| **p == color).count()
}

/// Scorer returning a fixed probability, or an inference error.
pub struct FixedScorer(pub Option<f64>);

impl CrackScorer for FixedScorer {
    fn predict(&self, _image_path: &Path) -> crackscan::Result<f64> {
        self.0
            .ok_or_else(|| DetectError::Inference("scorer unavailable".to_string()))
    }
}

/// Sigmoid of the mean input value, `[1,128,128,3]` in, `[1,1]` out.
pub const MEAN_SIGMOID_MODEL: &str = "mean_sigmoid.onnx";
/// Sum of all input values, declared `[1,1]`; far outside `[0, 1]`.
pub const SUM_MODEL: &str = "sum_unbounded.onnx";
/// Declares a `[1,2]` output.
pub const PAIR_OUTPUT_MODEL: &str = "pair_output.onnx";
/// Produces `[1,2]` but declares no output shape.
pub const UNSHAPED_PAIR_MODEL: &str = "pair_output_unshaped.onnx";

pub fn model_fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

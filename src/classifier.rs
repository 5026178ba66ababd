use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::DynamicImage;
use rten::{Dimension, Model};
use rten_tensor::prelude::*;
use rten_tensor::{NdTensor, Tensor};
use tracing::{debug, info, warn};

use crate::detection::preprocessing::load_image;
use crate::error::{DetectError, Result};
use crate::models::DetectionResult;

/// Side length of the square input the network was trained on
pub const INPUT_SIZE: u32 = 128;
const INPUT_CHANNELS: usize = 3;

/// Anything that can score an image file for crack probability.
pub trait CrackScorer {
    fn predict(&self, image_path: &Path) -> Result<f64>;
}

/// Frozen binary crack classifier.
///
/// The model is loaded once in [`Classifier::new`] and never mutated
/// afterwards; `predict` only borrows it.
pub struct Classifier {
    model: Model,
    model_path: PathBuf,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("model_path", &self.model_path)
            .finish()
    }
}

impl Classifier {
    /// Load the model and check that it exposes a single
    /// `[1, 128, 128, 3]` input and a single scalar output.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.is_file() {
            return Err(DetectError::model_load(model_path, "model file not found"));
        }

        let model =
            Model::load_file(model_path).map_err(|e| DetectError::model_load(model_path, e))?;

        let input_ids = model.input_ids();
        let output_ids = model.output_ids();
        if input_ids.len() != 1 || output_ids.len() != 1 {
            return Err(DetectError::model_load(
                model_path,
                format!(
                    "expected exactly one input and one output, found {} and {}",
                    input_ids.len(),
                    output_ids.len()
                ),
            ));
        }

        let input_shape = model.node_info(input_ids[0]).and_then(|info| info.shape());
        match &input_shape {
            Some(shape) => check_input_shape(shape)
                .map_err(|reason| DetectError::model_load(model_path, reason))?,
            None => debug!("model input has no declared shape, skipping check"),
        }

        let output_shape = model.node_info(output_ids[0]).and_then(|info| info.shape());
        match &output_shape {
            Some(shape) => check_output_shape(shape)
                .map_err(|reason| DetectError::model_load(model_path, reason))?,
            None => debug!("model output has no declared shape, skipping check"),
        }

        info!(
            model = %model_path.display(),
            input = ?input_shape,
            output = ?output_shape,
            "crack classifier loaded"
        );

        Ok(Self {
            model,
            model_path: model_path.to_path_buf(),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Probability that the image at `image_path` shows a wall crack.
    ///
    /// The raw network output is returned as-is; a badly calibrated model can
    /// therefore produce values outside `[0, 1]`.
    pub fn predict(&self, image_path: &Path) -> Result<f64> {
        let image = load_image(image_path)?;
        let probability = self.predict_image(&image)?;
        debug!(image = %image_path.display(), probability, "scored image");
        Ok(probability)
    }

    /// Same as [`Classifier::predict`] for an already decoded image.
    pub fn predict_image(&self, image: &DynamicImage) -> Result<f64> {
        let input = preprocess(image);

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| DetectError::Inference(e.to_string()))?;
        let output: Tensor<f32> = output
            .try_into()
            .map_err(|e| DetectError::Inference(format!("unexpected output type: {e:?}")))?;

        let values = output.to_vec();
        let probability = match values.as_slice() {
            [p] => *p as f64,
            other => {
                return Err(DetectError::Inference(format!(
                    "expected a single output value, got {}",
                    other.len()
                )));
            }
        };

        if !(0.0..=1.0).contains(&probability) {
            warn!(probability, "model produced a value outside [0, 1]");
        }

        Ok(probability)
    }

    pub fn detect(&self, image_path: &Path) -> Result<DetectionResult> {
        Ok(DetectionResult {
            probability: self.predict(image_path)?,
        })
    }
}

impl CrackScorer for Classifier {
    fn predict(&self, image_path: &Path) -> Result<f64> {
        Classifier::predict(self, image_path)
    }
}

/// Turn an image into the `[1, 128, 128, 3]` tensor the network expects.
///
/// RGB, Lanczos resize to 128x128, then every channel mapped from
/// `[0, 255]` to `[-1, 1]` with `x / 127.5 - 1`.
pub fn preprocess(image: &DynamicImage) -> NdTensor<f32, 4> {
    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Lanczos3);

    let data: Vec<f32> = resized
        .pixels()
        .flat_map(|p| p.0)
        .map(|v| v as f32 / 127.5 - 1.0)
        .collect();

    NdTensor::from_data(
        [1, INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS],
        data,
    )
}

fn check_input_shape(shape: &[Dimension]) -> std::result::Result<(), String> {
    let expected = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS];
    if shape.len() != expected.len() {
        return Err(format!(
            "expected a rank 4 input {expected:?}, got rank {}",
            shape.len()
        ));
    }

    for (axis, (dim, want)) in shape.iter().zip(expected).enumerate() {
        match dim {
            Dimension::Fixed(size) if *size == want => {}
            // A named batch dimension accepts a batch of one.
            Dimension::Symbolic(_) if axis == 0 => {}
            other => {
                return Err(format!(
                    "input axis {axis} is {other:?}, expected {want} (input {expected:?})"
                ));
            }
        }
    }
    Ok(())
}

fn check_output_shape(shape: &[Dimension]) -> std::result::Result<(), String> {
    for (axis, dim) in shape.iter().enumerate() {
        match dim {
            Dimension::Fixed(1) => {}
            Dimension::Symbolic(_) if axis == 0 => {}
            other => {
                return Err(format!(
                    "output axis {axis} is {other:?}, expected a single scalar per image"
                ));
            }
        }
    }
    Ok(())
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GrayImage};
use tracing::debug;

use crate::detection::preprocessing;
use crate::error::{DetectError, Result};
use crate::storage::unique_path;

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// One stage of the mask pipeline: a grayscale/binary image in, a new one out.
pub trait MaskStep: Send + Sync {
    fn process(&self, mask: GrayImage) -> GrayImage;

    /// Human-readable name for this step (used in logs and debug file names)
    fn name(&self) -> &str;
}

/// Ordered list of mask stages, run on the grayscale version of an image.
#[derive(Clone, Default)]
pub struct MaskPipeline {
    steps: Vec<Arc<dyn MaskStep>>,
    debug: Option<DebugConfig>,
}

impl MaskPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable debug mode with output directory.
    /// The directory must be empty or non-existent.
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let mut entries =
                std::fs::read_dir(&output_dir).map_err(|e| DetectError::io(&output_dir, e))?;
            if entries.next().is_some() {
                return Err(DetectError::Config(format!(
                    "debug directory is not empty: {}",
                    output_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir).map_err(|e| DetectError::io(&output_dir, e))?;
        }

        self.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    pub fn add_step(mut self, step: Arc<dyn MaskStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Convert `input` to grayscale and run every step in order.
    ///
    /// In debug mode each intermediate image is written to
    /// `<debug dir>/<run_name>/NN_<step>.png`. A run whose name is already
    /// taken gets `<run_name>_N` instead.
    pub fn run(&self, input: &DynamicImage, run_name: &str) -> Result<GrayImage> {
        let run_dir = self.create_run_dir(run_name)?;

        let mut mask = preprocessing::to_grayscale(input);
        save_debug(run_dir.as_deref(), 0, "grayscale", &mask)?;

        for (idx, step) in self.steps.iter().enumerate() {
            debug!(step = step.name(), "running mask step");
            mask = step.process(mask);
            save_debug(run_dir.as_deref(), idx + 1, step.name(), &mask)?;
        }

        Ok(mask)
    }

    fn create_run_dir(&self, run_name: &str) -> Result<Option<PathBuf>> {
        let Some(debug_config) = &self.debug else {
            return Ok(None);
        };

        let run_dir = unique_path(&debug_config.output_dir, run_name);
        std::fs::create_dir_all(&run_dir).map_err(|e| DetectError::io(&run_dir, e))?;
        Ok(Some(run_dir))
    }
}

fn save_debug(run_dir: Option<&Path>, index: usize, step_name: &str, mask: &GrayImage) -> Result<()> {
    let Some(run_dir) = run_dir else {
        return Ok(());
    };

    let file_name = format!(
        "{:02}_{}.png",
        index,
        step_name.to_lowercase().replace(' ', "_")
    );
    let output_path = run_dir.join(file_name);
    mask.save(&output_path)
        .map_err(|e| DetectError::write(&output_path, e))?;

    debug!(path = %output_path.display(), "saved debug image");
    Ok(())
}

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DetectError;
use crate::storage::default_output_dir;

/// Name of the optional configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "crackscan.yaml";
/// Environment variables `CRACKSCAN__SECTION__KEY` override file values
pub const ENV_PREFIX: &str = "CRACKSCAN";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub detection: DetectionSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub annotation: AnnotationSettings,
    #[serde(default)]
    pub debug_dir: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModelSettings {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionSettings {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_min_region_area")]
    pub min_region_area: f64,
    #[serde(default = "default_threshold_block_size")]
    pub threshold_block_size: u32,
    #[serde(default = "default_threshold_offset")]
    pub threshold_offset: i16,
    #[serde(default = "default_close_iterations")]
    pub close_iterations: u8,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            min_region_area: default_min_region_area(),
            threshold_block_size: default_threshold_block_size(),
            threshold_offset: default_threshold_offset(),
            close_iterations: default_close_iterations(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AnnotationSettings {
    pub font_path: Option<PathBuf>,
}

pub fn default_confidence_threshold() -> f64 {
    0.5
}

pub fn default_min_region_area() -> f64 {
    200.0
}

pub fn default_threshold_block_size() -> u32 {
    99
}

pub fn default_threshold_offset() -> i16 {
    15
}

pub fn default_close_iterations() -> u8 {
    2
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: ModelSettings::default(),
            detection: DetectionSettings::default(),
            storage: StorageSettings::default(),
            annotation: AnnotationSettings::default(),
            debug_dir: None,
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), String> {
        let threshold = self.detection.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(format!(
                "confidence_threshold must be within [0, 1], got {threshold}"
            ));
        }

        let block = self.detection.threshold_block_size;
        if block < 3 || block % 2 == 0 {
            return Err(format!(
                "threshold_block_size must be odd and at least 3, got {block}"
            ));
        }

        if self.detection.min_region_area < 0.0 {
            return Err("min_region_area must not be negative".to_string());
        }

        if !(1..=100).contains(&self.storage.jpeg_quality) {
            return Err(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.storage.jpeg_quality
            ));
        }

        Ok(())
    }

    pub fn model_path(&self) -> Result<&Path, DetectError> {
        self.model.path.as_deref().ok_or_else(|| {
            DetectError::Config("no model path configured (model.path or --model)".to_string())
        })
    }
}

/// Layered configuration: defaults, then the YAML file, then environment.
///
/// `file` is required when given explicitly; otherwise `crackscan.yaml` in the
/// working directory is used if present.
pub fn get_configuration(file: Option<&Path>) -> Result<Settings, DetectError> {
    let file_source = match file {
        Some(path) => config::File::from(path.to_path_buf()).required(true),
        None => config::File::new(DEFAULT_CONFIG_FILE, config::FileFormat::Yaml).required(false),
    };

    let settings = config::Config::builder()
        .add_source(file_source)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| DetectError::Config(e.to_string()))?;

    let settings = settings
        .try_deserialize::<Settings>()
        .map_err(|e| DetectError::Config(e.to_string()))?;

    settings.validate().map_err(DetectError::Config)?;
    Ok(settings)
}

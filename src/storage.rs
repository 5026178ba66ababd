use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::info;

use crate::error::{DetectError, Result};

/// Sub-path of the platform data directory used when no output directory is configured
pub const DEFAULT_DETECTED_SUBDIR: &str = "crackscan/detected";

const FALLBACK_STEM: &str = "image";

/// Default location for annotated images: `<data dir>/crackscan/detected`,
/// or `./detected` when the platform has no data directory.
pub fn default_output_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(DEFAULT_DETECTED_SUBDIR))
        .unwrap_or_else(|| PathBuf::from("detected"))
}

/// Keep alphanumerics, spaces, underscores and hyphens.
pub fn sanitize_stem(stem: &str) -> String {
    let safe: String = stem
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    if safe.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        safe
    }
}

/// `YYYYMMDD_HHMMSS` in local time, falling back to UTC when the local
/// offset cannot be determined.
pub fn timestamp(now: OffsetDateTime) -> String {
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    now.format(&format)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// `{timestamp}_{safe_name}_conf_{probability:.4}.jpg`
pub fn output_file_name(timestamp: &str, source: &Path, probability: f64) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    format!(
        "{}_{}_conf_{:.4}.jpg",
        timestamp,
        sanitize_stem(&stem),
        probability
    )
}

/// Return `dir/file_name`, or `..._N.jpg` variants when that name is taken.
pub fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (base, ext) = match file_name.rsplit_once('.') {
        Some((base, ext)) => (base, format!(".{ext}")),
        None => (file_name, String::new()),
    };
    (1u32..)
        .map(|n| dir.join(format!("{base}_{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Writes annotated images into the detected-images directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    output_dir: PathBuf,
    jpeg_quality: u8,
}

impl ImageStore {
    pub fn new(output_dir: impl Into<PathBuf>, jpeg_quality: u8) -> Self {
        Self {
            output_dir: output_dir.into(),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Encode `image` as JPEG under a fresh name derived from `source`.
    pub fn save(&self, image: &RgbImage, source: &Path, probability: f64) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| DetectError::write(&self.output_dir, image::ImageError::IoError(e)))?;

        let file_name = output_file_name(&timestamp(now()), source, probability);
        let path = unique_path(&self.output_dir, &file_name);

        let file = File::create(&path)
            .map_err(|e| DetectError::write(&path, image::ImageError::IoError(e)))?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality)
            .encode_image(image)
            .map_err(|e| DetectError::write(&path, e))?;
        writer
            .flush()
            .map_err(|e| DetectError::write(&path, image::ImageError::IoError(e)))?;

        info!(path = %path.display(), "saved annotated image");
        Ok(path)
    }
}

impl Default for ImageStore {
    fn default() -> Self {
        Self::new(default_output_dir(), 90)
    }
}

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::{DetectError, Result};
use crate::models::Severity;

/// Confidence assumed for legacy `*_crack_*` names that carry no score
pub const LEGACY_CRACK_CONFIDENCE: f64 = 0.9;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

static CONFIDENCE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_conf[_-]?([0-9]*\.?[0-9]+)").expect("confidence pattern is valid")
});

/// Recover the crack confidence encoded in a detected-image file name.
///
/// Names carrying a `_conf_<float>` token yield that value; legacy names with
/// `_crack_` and no token yield [`LEGACY_CRACK_CONFIDENCE`]; anything else is
/// `None`. The last token counts: a re-analyzed detection still carries its
/// old token in the stem.
pub fn parse_confidence(file_name: &str) -> Option<f64> {
    if let Some(caps) = CONFIDENCE_TOKEN.captures_iter(file_name).last()
        && let Ok(value) = caps[1].parse::<f64>()
    {
        return Some(value);
    }

    if file_name.to_lowercase().contains("_crack_") {
        return Some(LEGACY_CRACK_CONFIDENCE);
    }

    None
}

/// One annotated image found in the detected-images directory
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub path: PathBuf,
    pub file_name: String,
    pub confidence: Option<f64>,
    pub severity: Severity,
    #[serde(skip)]
    pub modified: SystemTime,
}

impl HistoryEntry {
    pub fn from_path(path: &Path, modified: SystemTime) -> Option<Self> {
        let file_name = path.file_name()?.to_string_lossy().into_owned();
        let confidence = parse_confidence(&file_name);
        Some(Self {
            path: path.to_path_buf(),
            severity: Severity::from_probability(confidence.unwrap_or(0.0)),
            file_name,
            confidence,
            modified,
        })
    }

    pub fn is_crack(&self) -> bool {
        self.severity != Severity::NoCrack
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// List detected images in `dir`, newest first.
///
/// A missing directory is an empty history.
pub fn scan(dir: &Path) -> Result<Vec<HistoryEntry>> {
    if !dir.exists() {
        debug!(dir = %dir.display(), "history directory does not exist yet");
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| DetectError::io(dir, e))? {
        let entry = entry.map_err(|e| DetectError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() || !is_image(&path) {
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| DetectError::io(&path, e))?;
        if let Some(item) = HistoryEntry::from_path(&path, modified) {
            entries.push(item);
        }
    }

    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.file_name.cmp(&a.file_name)));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_confidence_token() {
        assert_eq!(parse_confidence("20260101_101010_wall_conf_0.8731.jpg"), Some(0.8731));
        assert_eq!(parse_confidence("x_conf-0.25.png"), Some(0.25));
        assert_eq!(parse_confidence("x_conf.5.png"), Some(0.5));
        assert_eq!(parse_confidence("x_conf_0.9200_1.jpg"), Some(0.92));
    }

    #[test]
    fn last_token_wins_for_reanalyzed_detections() {
        assert_eq!(
            parse_confidence("20261019_101001_old_conf_01000_conf_0.9200.jpg"),
            Some(0.92)
        );
        assert_eq!(
            parse_confidence("20261019_101001_old_conf_01000_conf_0.9200_2.jpg"),
            Some(0.92)
        );
    }

    #[test]
    fn legacy_names_fall_back() {
        assert_eq!(
            parse_confidence("wall_crack_20250101_120000.jpg"),
            Some(LEGACY_CRACK_CONFIDENCE)
        );
        assert_eq!(
            parse_confidence("Wall_CRACK_20250101.JPG"),
            Some(LEGACY_CRACK_CONFIDENCE)
        );
        assert_eq!(parse_confidence("holiday.jpg"), None);
    }

    #[test]
    fn token_wins_over_legacy_marker() {
        assert_eq!(parse_confidence("a_crack_conf_0.1000.jpg"), Some(0.1));
    }
}

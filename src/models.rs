use std::path::PathBuf;

use image::Rgb;
use imageproc::point::Point;
use serde::Serialize;

/// Lower bound (inclusive) of the "Mild Crack" band.
pub const MILD_CRACK_THRESHOLD: f64 = 0.4;

/// Lower bound (inclusive) of the "Severe Crack" band.
pub const SEVERE_CRACK_THRESHOLD: f64 = 0.8;

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const ORANGE: Rgb<u8> = Rgb([255, 165, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

/// Axis-aligned bounding box in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A crack candidate: one external contour of the closed threshold mask.
#[derive(Debug, Clone, Serialize)]
pub struct CrackRegion {
    #[serde(skip)]
    pub outline: Vec<Point<i32>>,
    pub area: f64,
    pub bbox: BoundingBox,
}

impl CrackRegion {
    /// Build a region from the border points of a contour.
    ///
    /// Returns `None` for an empty point list.
    pub fn from_outline(outline: Vec<Point<i32>>) -> Option<Self> {
        let first = outline.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &outline {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let area = polygon_area(&outline);
        Some(Self {
            outline,
            area,
            bbox: BoundingBox {
                x: min_x.max(0) as u32,
                y: min_y.max(0) as u32,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
            },
        })
    }
}

/// Area enclosed by a closed polygon (shoelace formula).
///
/// Matches what contour-area functions report for a traced border: a border
/// that is a single pixel wide encloses no area.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut twice_area: i64 = 0;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (twice_area as f64).abs() / 2.0
}

/// Three-level grading of a crack probability, independent of the
/// confidence threshold used to decide whether regions are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    NoCrack,
    MildCrack,
    SevereCrack,
}

impl Severity {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= SEVERE_CRACK_THRESHOLD {
            Severity::SevereCrack
        } else if probability >= MILD_CRACK_THRESHOLD {
            Severity::MildCrack
        } else {
            Severity::NoCrack
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::NoCrack => "No Crack",
            Severity::MildCrack => "Mild Crack",
            Severity::SevereCrack => "Severe Crack",
        }
    }

    pub fn color(&self) -> Rgb<u8> {
        match self {
            Severity::NoCrack => GREEN,
            Severity::MildCrack => ORANGE,
            Severity::SevereCrack => RED,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Severity label for a probability ("No Crack", "Mild Crack", "Severe Crack").
pub fn get_severity(probability: f64) -> &'static str {
    Severity::from_probability(probability).label()
}

/// Which branch the region extractor took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Crack,
    NoCrack,
}

impl Outcome {
    /// A probability equal to the threshold counts as a crack.
    pub fn decide(probability: f64, confidence_threshold: f64) -> Self {
        if probability >= confidence_threshold {
            Outcome::Crack
        } else {
            Outcome::NoCrack
        }
    }

    pub fn is_crack(&self) -> bool {
        matches!(self, Outcome::Crack)
    }
}

/// Output of a single classifier call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionResult {
    pub probability: f64,
}

impl DetectionResult {
    pub fn severity(&self) -> Severity {
        Severity::from_probability(self.probability)
    }

    pub fn is_crack(&self, confidence_threshold: f64) -> bool {
        Outcome::decide(self.probability, confidence_threshold).is_crack()
    }
}

/// Everything `analyze_and_save` produced for one image
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub source: PathBuf,
    pub output_path: PathBuf,
    pub probability: f64,
    pub confidence_threshold: f64,
    pub outcome: Outcome,
    pub severity: Severity,
    pub regions: Vec<CrackRegion>,
}

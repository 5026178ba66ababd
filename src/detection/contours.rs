use image::GrayImage;
use imageproc::contours::{self, BorderType};

use crate::models::CrackRegion;

/// Find the outermost contours of a binary mask.
///
/// Holes and anything nested inside a hole are ignored, only borders that
/// have no enclosing contour are kept.
pub fn find_external_contours(mask: &GrayImage) -> Vec<CrackRegion> {
    contours::find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| CrackRegion::from_outline(c.points))
        .collect()
}

/// Keep only regions whose enclosed area is strictly greater than `min_area`.
pub fn filter_by_area(regions: Vec<CrackRegion>, min_area: f64) -> Vec<CrackRegion> {
    regions.into_iter().filter(|r| r.area > min_area).collect()
}

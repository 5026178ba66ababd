use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::models::{
    CrackRegion, GREEN, MILD_CRACK_THRESHOLD, ORANGE, Outcome, RED, SEVERE_CRACK_THRESHOLD,
};

/// Outline colour of a crack contour
pub const CONTOUR_COLOR: Rgb<u8> = RED;
/// Bounding box colour (light green)
pub const BOX_COLOR: Rgb<u8> = Rgb([100, 255, 100]);
const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

const LINE_THICKNESS: u32 = 2;
const LABEL_MARGIN: i32 = 8;
const LABEL_PADDING: i32 = 6;
const MIN_FONT_SIZE: f32 = 16.0;
const MAX_FONT_SIZE: f32 = 72.0;

/// Fonts tried, in order, when no font is configured
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/system/fonts/Roboto-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Text overlay written in the top-left corner of the annotated image
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub color: Rgb<u8>,
}

/// Overlay colour of a crack label.
///
/// Unlike [`crate::models::Severity`] both comparisons are strict, so a
/// probability of exactly 0.8 is drawn orange and exactly 0.4 green.
pub fn label_color(probability: f64) -> Rgb<u8> {
    if probability > SEVERE_CRACK_THRESHOLD {
        RED
    } else if probability > MILD_CRACK_THRESHOLD {
        ORANGE
    } else {
        GREEN
    }
}

/// Label for a processed image.
///
/// A crack is labelled with its probability and coloured by
/// [`label_color`]; otherwise the label is a green "No Crack (X.X%)".
pub fn label_for(outcome: Outcome, probability: f64) -> Label {
    let percent = probability * 100.0;
    match outcome {
        Outcome::Crack => Label {
            text: format!("Crack Detected ({percent:.1}%)"),
            color: label_color(probability),
        },
        Outcome::NoCrack => Label {
            text: format!("No Crack ({percent:.1}%)"),
            color: GREEN,
        },
    }
}

/// Draws crack regions and labels onto RGB images.
pub struct Annotator {
    font: Option<FontVec>,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("has_font", &self.font.is_some())
            .finish()
    }
}

impl Annotator {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    /// Load the configured font, or the first usable system font.
    ///
    /// Without any font the annotator still draws regions but skips labels.
    pub fn load(font_path: Option<&Path>) -> Self {
        if let Some(path) = font_path {
            match read_font(path) {
                Some(font) => return Self::new(Some(font)),
                None => warn!(font = %path.display(), "configured font could not be loaded"),
            }
        }

        let font = SYSTEM_FONT_CANDIDATES
            .iter()
            .map(Path::new)
            .filter(|p| p.is_file())
            .find_map(read_font);

        if font.is_none() {
            warn!("no usable font found, annotated images will carry no text label");
        }
        Self::new(font)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw every region outline in red and its bounding box in light green.
    pub fn draw_regions(&self, image: &mut RgbImage, regions: &[CrackRegion]) {
        for region in regions {
            draw_outline(image, region);
        }
        for region in regions {
            draw_box(image, region);
        }
    }

    /// Draw the label on a dark background in the top-left corner.
    pub fn draw_label(&self, image: &mut RgbImage, label: &Label) {
        let Some(font) = &self.font else {
            debug!(text = %label.text, "skipping label, no font loaded");
            return;
        };

        let short_side = image.width().min(image.height()) as f32;
        let scale = PxScale::from((short_side / 16.0).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE));
        let (text_w, text_h) = text_size(scale, font, &label.text);

        let background = Rect::at(LABEL_MARGIN, LABEL_MARGIN).of_size(
            text_w + 2 * LABEL_PADDING as u32,
            text_h.max(1) + 2 * LABEL_PADDING as u32,
        );
        draw_filled_rect_mut(image, background, LABEL_BACKGROUND);
        draw_text_mut(
            image,
            label.color,
            LABEL_MARGIN + LABEL_PADDING,
            LABEL_MARGIN + LABEL_PADDING,
            scale,
            font,
            &label.text,
        );
    }
}

fn read_font(path: &Path) -> Option<FontVec> {
    let bytes = std::fs::read(path).ok()?;
    match FontVec::try_from_vec(bytes) {
        Ok(font) => {
            debug!(font = %path.display(), "loaded label font");
            Some(font)
        }
        Err(_) => None,
    }
}

fn draw_outline(image: &mut RgbImage, region: &CrackRegion) {
    for p in &region.outline {
        let dot = Rect::at(p.x, p.y).of_size(LINE_THICKNESS, LINE_THICKNESS);
        draw_filled_rect_mut(image, dot, CONTOUR_COLOR);
    }
}

fn draw_box(image: &mut RgbImage, region: &CrackRegion) {
    let bbox = region.bbox;
    for inset in 0..LINE_THICKNESS {
        // The box runs one pixel past the region on the right and bottom.
        let w = (bbox.width + 1).saturating_sub(2 * inset);
        let h = (bbox.height + 1).saturating_sub(2 * inset);
        if w == 0 || h == 0 {
            break;
        }
        let rect = Rect::at((bbox.x + inset) as i32, (bbox.y + inset) as i32).of_size(w, h);
        draw_hollow_rect_mut(image, rect, BOX_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crack_label_colour_bands_are_strict() {
        assert_eq!(label_for(Outcome::Crack, 0.92).color, RED);
        assert_eq!(label_for(Outcome::Crack, 0.8001).color, RED);
        assert_eq!(label_for(Outcome::Crack, 0.8).color, ORANGE);
        assert_eq!(label_for(Outcome::Crack, 0.6).color, ORANGE);
        assert_eq!(label_for(Outcome::Crack, 0.4001).color, ORANGE);
        assert_eq!(label_for(Outcome::Crack, 0.4).color, GREEN);
        assert_eq!(label_for(Outcome::Crack, 0.3).color, GREEN);
        assert_eq!(label_for(Outcome::Crack, 0.92).text, "Crack Detected (92.0%)");
    }

    #[test]
    fn no_crack_label_is_green() {
        let label = label_for(Outcome::NoCrack, 0.05);
        assert_eq!(label.text, "No Crack (5.0%)");
        assert_eq!(label.color, GREEN);
        // even a high probability below a strict threshold stays green
        assert_eq!(label_for(Outcome::NoCrack, 0.85).color, GREEN);
    }

    #[test]
    fn missing_font_skips_label() {
        let annotator = Annotator::new(None);
        let mut image = RgbImage::from_pixel(50, 50, Rgb([200, 200, 200]));
        annotator.draw_label(&mut image, &label_for(Outcome::NoCrack, 0.1));
        assert!(image.pixels().all(|p| *p == Rgb([200, 200, 200])));
    }

    #[test]
    fn boxes_are_drawn_around_regions() {
        use imageproc::point::Point;
        let outline = vec![
            Point::new(10, 10),
            Point::new(30, 10),
            Point::new(20, 15),
            Point::new(30, 20),
            Point::new(10, 20),
        ];
        let region = CrackRegion::from_outline(outline).unwrap();
        let mut image = RgbImage::from_pixel(64, 64, Rgb([200, 200, 200]));
        Annotator::new(None).draw_regions(&mut image, &[region]);

        assert_eq!(*image.get_pixel(20, 10), BOX_COLOR);
        assert_eq!(*image.get_pixel(31, 15), BOX_COLOR);
        assert_eq!(*image.get_pixel(11, 15), BOX_COLOR);
        assert_eq!(*image.get_pixel(20, 15), RED);
        assert_eq!(*image.get_pixel(21, 16), RED);
        assert_eq!(*image.get_pixel(15, 15), Rgb([200, 200, 200]));
    }
}

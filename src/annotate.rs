//! Overlay drawing for reduced frames.

use std::fmt;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::config::AnnotateSettings;
use crate::detect::{BoundingBox, Detection};
use crate::policy::{FrameResult, PET_COLOR, PET_TRANSPARENT};

const SUMMARY_ORIGIN: (i32, i32) = (10, 30);
const SUMMARY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Deterministic box color for a label.
pub fn label_color(label: &str) -> Rgb<u8> {
    match label {
        PET_TRANSPARENT => Rgb([255, 0, 0]),
        PET_COLOR => Rgb([0, 255, 0]),
        _ => Rgb([0, 0, 255]),
    }
}

/// One drawn detection.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub label: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub color: Rgb<u8>,
    pub text: String,
}

impl Annotation {
    pub fn for_detection(det: &Detection) -> Self {
        Self {
            label: det.label.clone(),
            confidence: det.confidence,
            bbox: det.bbox,
            color: label_color(&det.label),
            text: format!("{} {:.2}", det.label, det.confidence),
        }
    }
}

/// `Detection Results: PET_transparent: true (0.93) | PET_color: false (0.81)`
pub fn summary_text(result: &FrameResult) -> String {
    let parts: Vec<String> = result
        .label_present
        .iter()
        .map(|(label, present)| {
            format!("{}: {} ({:.2})", label, present, result.confidence_of(label))
        })
        .collect();
    format!("Detection Results: {}", parts.join(" | "))
}

/// Draws annotations onto frames. Text needs a font; without one only boxes
/// are drawn.
pub struct Annotator {
    font: Option<FontVec>,
    scale: PxScale,
}

impl Annotator {
    pub fn new() -> Self {
        Self {
            font: None,
            scale: PxScale::from(18.0),
        }
    }

    pub fn with_font_file(path: &Path, scale: f32) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))?;
        Ok(Self {
            font: Some(font),
            scale: PxScale::from(scale),
        })
    }

    pub fn from_settings(settings: &AnnotateSettings) -> Result<Self> {
        match &settings.font_path {
            Some(path) => Self::with_font_file(path, settings.font_scale),
            None => Ok(Self::new()),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn render(&self, frame: &mut RgbImage, result: &FrameResult) {
        for annotation in &result.annotations {
            self.draw_annotation(frame, annotation);
        }
        if let Some(font) = &self.font {
            draw_text_mut(
                frame,
                SUMMARY_COLOR,
                SUMMARY_ORIGIN.0,
                SUMMARY_ORIGIN.1,
                self.scale,
                font,
                &summary_text(result),
            );
        }
    }

    fn draw_annotation(&self, frame: &mut RgbImage, annotation: &Annotation) {
        let (frame_width, frame_height) = frame.dimensions();
        let Some((x, y, w, h)) = annotation.bbox.clipped_rect(frame_width, frame_height) else {
            log::trace!("annotate: box for {} is off-frame", annotation.label);
            return;
        };
        draw_hollow_rect_mut(frame, Rect::at(x, y).of_size(w, h), annotation.color);

        if let Some(font) = &self.font {
            let text_height = self.scale.y.ceil() as i32;
            let text_y = if y >= text_height { y - text_height } else { y + 1 };
            draw_text_mut(
                frame,
                annotation.color,
                x,
                text_y,
                self.scale,
                font,
                &annotation.text,
            );
        }
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Annotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Annotator")
            .field("font", &self.font.is_some())
            .field("scale", &self.scale.y)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::LabelReducer;

    fn det(label: &str, confidence: f64, bbox: BoundingBox) -> Detection {
        Detection::new(label, confidence, bbox)
    }

    #[test]
    fn colors_are_keyed_by_label() {
        assert_eq!(label_color(PET_TRANSPARENT), Rgb([255, 0, 0]));
        assert_eq!(label_color(PET_COLOR), Rgb([0, 255, 0]));
        assert_eq!(label_color("can"), label_color("bottle_cap"));
        assert_ne!(label_color(PET_COLOR), label_color(PET_TRANSPARENT));
    }

    #[test]
    fn annotation_text_has_two_decimals() {
        let a = Annotation::for_detection(&det(
            PET_COLOR,
            0.876,
            BoundingBox::from_corners(0.0, 0.0, 1.0, 1.0),
        ));
        assert_eq!(a.text, "PET_color 0.88");
        assert_eq!(a.color, label_color(PET_COLOR));
    }

    #[test]
    fn summary_lists_labels_in_order() {
        let bbox = BoundingBox::from_corners(0.0, 0.0, 1.0, 1.0);
        let result = LabelReducer::new(0.7)
            .unwrap()
            .select(&[det(PET_COLOR, 0.81, bbox), det(PET_TRANSPARENT, 0.93, bbox)]);
        assert_eq!(
            summary_text(&result),
            "Detection Results: PET_transparent: true (0.93) | PET_color: false (0.81)"
        );
        assert_eq!(
            summary_text(&FrameResult::default()),
            "Detection Results: PET_transparent: false (0.00) | PET_color: false (0.00)"
        );
    }

    #[test]
    fn render_draws_box_outline_only() {
        let mut frame = RgbImage::new(32, 32);
        let result = LabelReducer::new(0.0).unwrap().select(&[det(
            PET_COLOR,
            0.9,
            BoundingBox::from_corners(4.0, 4.0, 20.0, 12.0),
        )]);
        Annotator::new().render(&mut frame, &result);

        let green = label_color(PET_COLOR);
        assert_eq!(*frame.get_pixel(4, 4), green);
        assert_eq!(*frame.get_pixel(20, 12), green);
        assert_eq!(*frame.get_pixel(12, 4), green);
        assert_eq!(*frame.get_pixel(12, 8), Rgb([0, 0, 0]));
    }

    #[test]
    fn render_clips_boxes_past_the_edge() {
        let mut frame = RgbImage::new(16, 16);
        let result = LabelReducer::new(0.0).unwrap().select(&[det(
            PET_TRANSPARENT,
            0.9,
            BoundingBox::from_corners(8.0, 8.0, 100.0, 100.0),
        )]);
        Annotator::new().render(&mut frame, &result);
        assert_eq!(*frame.get_pixel(15, 15), label_color(PET_TRANSPARENT));
    }

    #[test]
    fn missing_font_file_is_an_error() {
        assert!(Annotator::with_font_file(Path::new("/nonexistent/font.ttf"), 12.0).is_err());
    }
}

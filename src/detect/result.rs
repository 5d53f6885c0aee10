use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Build a box from two opposite corners. Corners are reordered so that
    /// `x1 <= x2` and `y1 <= y2`.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    /// Integer `(x, y, w, h)` rectangle clipped to a `frame_width` x `frame_height` frame.
    ///
    /// Returns `None` when the box lies entirely outside the frame. Width and height
    /// are at least 1 so degenerate boxes still render.
    pub fn clipped_rect(&self, frame_width: u32, frame_height: u32) -> Option<(i32, i32, u32, u32)> {
        if frame_width == 0 || frame_height == 0 || !self.is_finite() {
            return None;
        }
        let max_x = (frame_width - 1) as f32;
        let max_y = (frame_height - 1) as f32;
        if self.x2 < 0.0 || self.y2 < 0.0 || self.x1 > max_x || self.y1 > max_y {
            return None;
        }

        let left = self.x1.clamp(0.0, max_x).round() as i32;
        let top = self.y1.clamp(0.0, max_y).round() as i32;
        let right = self.x2.clamp(0.0, max_x).round() as i32;
        let bottom = self.y2.clamp(0.0, max_y).round() as i32;

        let width = (right - left + 1).max(1) as u32;
        let height = (bottom - top + 1).max(1) as u32;
        Some((left, top, width, height))
    }
}

/// One candidate object reported by a detector for a single frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// Score in `[0, 1]`.
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox: BoundingBox::from_corners(bbox.x1, bbox.y1, bbox.x2, bbox.y2),
        }
    }

    /// Reorders box corners in place. Detections deserialized from scripts skip
    /// the constructor, so loaders call this before handing them out.
    pub fn normalized(mut self) -> Self {
        self.bbox = BoundingBox::from_corners(self.bbox.x1, self.bbox.y1, self.bbox.x2, self.bbox.y2);
        self
    }

    /// Reject scores outside `[0, 1]` and non-finite coordinates.
    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(anyhow!("detection label must not be empty"));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(anyhow!(
                "detection '{}' has confidence {} outside [0, 1]",
                self.label,
                self.confidence
            ));
        }
        if !self.bbox.is_finite() {
            return Err(anyhow!(
                "detection '{}' has non-finite box coordinates",
                self.label
            ));
        }
        Ok(())
    }
}

//! Best-label reduction.
//!
//! Turns the raw detections of one frame into a single-winner decision over the
//! two bottle classes. The reduction is stateless: every frame is judged on its
//! own detections only.
//!
//! Rules:
//! - Only labels in [`INTEREST_SET`] with `confidence >= threshold` qualify.
//! - Every qualifying detection is annotated.
//! - The qualifying detection with the strictly greatest confidence wins; on an
//!   exact tie the earlier detection keeps the win. A score of 0.0 never wins.
//! - Reported confidences are the best qualifying score per label, whether or not
//!   that label won.

use anyhow::{anyhow, Result};
use image::RgbImage;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::annotate::{Annotation, Annotator};
use crate::detect::Detection;

pub const PET_TRANSPARENT: &str = "PET_transparent";
pub const PET_COLOR: &str = "PET_color";

/// The labels this system reports on, in reporting order.
pub const INTEREST_SET: [&str; 2] = [PET_TRANSPARENT, PET_COLOR];

/// Minimum confidence for a detection to be drawn or considered.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Position of `label` in [`INTEREST_SET`].
pub fn interest_index(label: &str) -> Option<usize> {
    INTEREST_SET.iter().position(|candidate| *candidate == label)
}

/// One value per InterestSet label, iterated in InterestSet order.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LabelMap<T>(pub(crate) [T; 2]);

impl<T: Copy> LabelMap<T> {
    pub fn get(&self, label: &str) -> Option<T> {
        interest_index(label).map(|idx| self.0[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, T)> + '_ {
        INTEREST_SET.iter().copied().zip(self.0.iter().copied())
    }
}

impl<T: Serialize> Serialize for LabelMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(INTEREST_SET.len()))?;
        for (label, value) in INTEREST_SET.iter().zip(self.0.iter()) {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// Outcome of reducing one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameResult {
    /// At most one entry is true.
    pub label_present: LabelMap<bool>,
    /// Best qualifying score per label, 0.0 when none qualified.
    pub confidence: LabelMap<f64>,
    /// Every qualifying detection, in input order.
    pub annotations: Vec<Annotation>,
}

impl FrameResult {
    pub fn is_present(&self, label: &str) -> bool {
        self.label_present.get(label).unwrap_or(false)
    }

    pub fn confidence_of(&self, label: &str) -> f64 {
        self.confidence.get(label).unwrap_or(0.0)
    }

    /// Winning label and its score.
    pub fn winner(&self) -> Option<(&'static str, f64)> {
        self.label_present
            .iter()
            .find(|(_, present)| *present)
            .map(|(label, _)| (label, self.confidence_of(label)))
    }

    pub fn present_count(&self) -> usize {
        self.label_present.iter().filter(|(_, present)| *present).count()
    }
}

/// Applies the best-label policy and draws the result.
#[derive(Debug)]
pub struct LabelReducer {
    threshold: f64,
    annotator: Annotator,
}

impl LabelReducer {
    pub fn new(threshold: f64) -> Result<Self> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!("threshold {} must be within [0, 1]", threshold));
        }
        Ok(Self {
            threshold,
            annotator: Annotator::new(),
        })
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn annotator(&self) -> &Annotator {
        &self.annotator
    }

    /// Decide the frame without touching any pixels.
    pub fn select(&self, detections: &[Detection]) -> FrameResult {
        let mut result = FrameResult::default();
        let mut best: Option<(usize, f64)> = None;

        for det in detections {
            let Some(idx) = interest_index(&det.label) else {
                continue;
            };
            // NaN fails this comparison and is dropped with the rest.
            if !(det.confidence >= self.threshold) {
                continue;
            }

            result.annotations.push(Annotation::for_detection(det));

            if det.confidence > result.confidence.0[idx] {
                result.confidence.0[idx] = det.confidence;
            }

            let beats = match best {
                Some((_, score)) => det.confidence > score,
                None => det.confidence > 0.0,
            };
            if beats {
                best = Some((idx, det.confidence));
            }
        }

        if let Some((idx, _)) = best {
            result.label_present.0[idx] = true;
        }
        result
    }

    /// Decide the frame and draw every qualifying detection onto it.
    pub fn reduce(&self, detections: &[Detection], frame: &mut RgbImage) -> FrameResult {
        let result = self.select(detections);
        self.annotator.render(frame, &result);
        result
    }
}

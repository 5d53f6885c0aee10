use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;
use serde::Deserialize;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;

/// Scripted backend. Replays a fixed sequence of per-frame detections.
///
/// Frame `n` of the run receives entry `n` of the script. Once the script is
/// exhausted every further frame sees no detections, unless looping is enabled.
pub struct ScriptedBackend {
    frames: Vec<Vec<Detection>>,
    cursor: usize,
    looping: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptFile {
    Frames(Vec<Vec<Detection>>),
    Document {
        frames: Vec<Vec<Detection>>,
        #[serde(default, rename = "loop")]
        looping: bool,
    },
}

impl ScriptedBackend {
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames: frames
                .into_iter()
                .map(|dets| dets.into_iter().map(Detection::normalized).collect())
                .collect(),
            cursor: 0,
            looping: false,
        }
    }

    /// Backend that never reports anything.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Load a JSON script: either a bare array of frames, or
    /// `{"frames": [...], "loop": true}`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detection script {}", path.display()))?;
        let script: ScriptFile = serde_json::from_str(&raw)
            .with_context(|| format!("invalid detection script {}", path.display()))?;
        let (frames, looping) = match script {
            ScriptFile::Frames(frames) => (frames, false),
            ScriptFile::Document { frames, looping } => (frames, looping),
        };
        for (index, detections) in frames.iter().enumerate() {
            for det in detections {
                det.validate()
                    .with_context(|| format!("script frame {} in {}", index, path.display()))?;
            }
        }
        log::info!(
            "ScriptedBackend: loaded {} frames from {} (loop={})",
            frames.len(),
            path.display(),
            looping
        );
        Ok(Self::new(frames).with_looping(looping))
    }

    /// Number of scripted frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        if self.cursor >= self.frames.len() {
            if !self.looping || self.frames.is_empty() {
                return Ok(Vec::new());
            }
            self.cursor = 0;
        }
        let detections = self.frames[self.cursor].clone();
        self.cursor += 1;
        Ok(detections)
    }
}

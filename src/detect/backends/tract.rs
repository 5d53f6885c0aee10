#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::labels::Labels;
use crate::detect::result::{BoundingBox, Detection};

/// Tract-based backend for end-to-end ONNX detectors.
///
/// The model must take a `1x3xHxW` float input in `[0, 1]` and emit post-NMS rows
/// of `[x1, y1, x2, y2, score, class_id]` (optionally prefixed by a batch index).
/// Frames must already be `width` x `height`; this backend does no resizing.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    labels: Labels,
    width: u32,
    height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, labels: Labels, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} ({}x{}, {} classes)",
            model_path.display(),
            width,
            height,
            labels.len()
        );

        Ok(Self {
            model,
            labels,
            width,
            height,
        })
    }

    fn build_input(&self, frame: &RgbImage) -> Result<Tensor> {
        let (width, height) = frame.dimensions();
        if width != self.width || height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                width,
                height,
                self.width,
                self.height
            ));
        }

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height as usize, width as usize),
            |(_, channel, y, x)| frame.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );

        Ok(input.into_tensor())
    }

    fn decode_rows(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let columns = output.shape().last().copied().unwrap_or(0);
        let offset = match columns {
            6 => 0,
            7 => 1,
            other => {
                return Err(anyhow!(
                    "expected detection rows of 6 or 7 values, model emits {}",
                    other
                ))
            }
        };
        let values = output
            .as_slice::<f32>()
            .context("model output tensor was not f32")?;

        let mut detections = Vec::new();
        for row in values.chunks_exact(columns) {
            let row = &row[offset..];
            let score = row[4];
            // End-to-end exports pad unused rows with zeros.
            if !score.is_finite() || score <= 0.0 {
                continue;
            }
            let class_id = row[5].round().max(0.0) as usize;
            let label = match self.labels.name(class_id) {
                Some(name) => name.to_string(),
                None => format!("class_{}", class_id),
            };
            let confidence = if score > 1.0 {
                log::warn!("TractBackend: clamping score {} for {}", score, label);
                1.0
            } else {
                score as f64
            };
            detections.push(Detection::new(
                label,
                confidence,
                BoundingBox::from_corners(row[0], row[1], row[2], row[3]),
            ));
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode_rows(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = RgbImage::new(self.width, self.height);
        self.detect(&blank).map(|_| ())
    }
}

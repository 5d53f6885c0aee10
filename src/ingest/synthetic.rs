//! Synthetic frame source for `stub://` URIs.
//!
//! Produces a moving gradient so downstream stages see changing pixels. Never
//! ends on its own; bound it with `max_frames` or the stop signal.

use anyhow::Result;
use image::{Rgb, RgbImage};

use super::{SourceConfig, SourceStats};
use crate::frame::Frame;

pub struct SyntheticSource {
    config: SourceConfig,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.uri,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.frame_count += 1;
        let shift = self.frame_count;
        let image = RgbImage::from_fn(self.config.width, self.config.height, |x, y| {
            let base = (x as u64 + y as u64 + shift) % 256;
            Rgb([base as u8, (base / 2) as u8, (255 - base) as u8])
        });
        Ok(Some(Frame::new(self.frame_count, image)))
    }

    pub fn is_healthy(&self) -> bool {
        true
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.uri.clone(),
        }
    }
}

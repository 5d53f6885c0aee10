//! Local image frame source.
//!
//! This module provides `ImageFileSource` for replaying still images from disk.
//! The URI is either a single image or a directory; directory entries with an
//! image extension are played in file-name order, each exactly once.
//!
//! The file source does not fetch remote URLs and does not follow
//! subdirectories.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{SourceConfig, SourceStats};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

pub struct ImageFileSource {
    config: SourceConfig,
    paths: Vec<PathBuf>,
    cursor: usize,
    frame_count: u64,
    last_error: Option<String>,
}

impl ImageFileSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if config.uri.trim().is_empty() {
            return Err(anyhow!("image source path must not be empty"));
        }
        Ok(Self {
            config,
            paths: Vec::new(),
            cursor: 0,
            frame_count: 0,
            last_error: None,
        })
    }

    /// Resolve the file list. Fails when the path holds no images.
    pub fn connect(&mut self) -> Result<()> {
        let root = Path::new(&self.config.uri);
        self.paths = if root.is_dir() {
            list_images(root)?
        } else if root.is_file() {
            vec![root.to_path_buf()]
        } else {
            return Err(anyhow!("image source {} does not exist", root.display()));
        };
        if self.paths.is_empty() {
            return Err(anyhow!("no images found in {}", root.display()));
        }
        self.cursor = 0;
        log::info!(
            "ImageFileSource: connected to {} ({} images)",
            root.display(),
            self.paths.len()
        );
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;

        let image = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                err
            })?
            .to_rgb8();
        self.frame_count += 1;
        log::debug!(
            "ImageFileSource: frame {} from {}",
            self.frame_count,
            path.display()
        );
        Ok(Some(Frame::new(self.frame_count, image)))
    }

    pub fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.uri.clone(),
        }
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

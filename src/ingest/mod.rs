//! Frame ingestion sources.
//!
//! This module provides different sources for frames:
//! - Synthetic frames (`stub://` URIs, testing and demos)
//! - Still images from a file or a directory
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! All sources produce `Frame` instances numbered from 1. `next_frame` returns
//! `Ok(None)` once the stream is exhausted; an error after `connect` means the
//! source is gone and the caller should stop.

pub mod file;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub use file::ImageFileSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// Configuration for a frame source.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceConfig {
    /// `stub://name`, `/dev/videoN`, or a local image file/directory path.
    pub uri: String,
    /// Target frame rate for live devices.
    pub target_fps: u32,
    /// Requested frame width (live devices, synthetic frames).
    pub width: u32,
    /// Requested frame height (live devices, synthetic frames).
    pub height: u32,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            uri: "stub://camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
            max_frames: None,
        }
    }
}

/// Frame source dispatching on the configured URI.
pub struct FrameSource {
    backend: SourceBackend,
    max_frames: Option<u64>,
    delivered: u64,
}

enum SourceBackend {
    Synthetic(SyntheticSource),
    Files(ImageFileSource),
    #[cfg(feature = "ingest-v4l2")]
    V4l2(V4l2Source),
}

impl FrameSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let max_frames = config.max_frames;
        let backend = if config.uri.starts_with("stub://") {
            SourceBackend::Synthetic(SyntheticSource::new(config))
        } else if config.uri.starts_with("/dev/video") {
            #[cfg(feature = "ingest-v4l2")]
            {
                SourceBackend::V4l2(V4l2Source::new(config)?)
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                return Err(anyhow!(
                    "camera capture from {} requires the ingest-v4l2 feature",
                    config.uri
                ));
            }
        } else if config.uri.contains("://") {
            return Err(anyhow!(
                "unsupported source '{}'; expected stub://, /dev/videoN or a local path",
                config.uri
            ));
        } else {
            SourceBackend::Files(ImageFileSource::new(config)?)
        };
        Ok(Self {
            backend,
            max_frames,
            delivered: 0,
        })
    }

    /// Connect to the source.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            SourceBackend::Synthetic(source) => source.connect(),
            SourceBackend::Files(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::V4l2(source) => source.connect(),
        }
    }

    /// Capture the next frame, or `None` at end of stream.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.max_frames.is_some_and(|max| self.delivered >= max) {
            return Ok(None);
        }
        let frame = match &mut self.backend {
            SourceBackend::Synthetic(source) => source.next_frame(),
            SourceBackend::Files(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::V4l2(source) => source.next_frame(),
        }?;
        if frame.is_some() {
            self.delivered += 1;
        }
        Ok(frame)
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.is_healthy(),
            SourceBackend::Files(source) => source.is_healthy(),
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::V4l2(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> SourceStats {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.stats(),
            SourceBackend::Files(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::V4l2(source) => source.stats(),
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_frames_ends_stream() -> Result<()> {
        let mut source = FrameSource::new(SourceConfig {
            uri: "stub://test".to_string(),
            width: 8,
            height: 6,
            max_frames: Some(2),
            ..SourceConfig::default()
        })?;
        source.connect()?;

        assert_eq!(source.next_frame()?.map(|f| f.index), Some(1));
        assert_eq!(source.next_frame()?.map(|f| f.index), Some(2));
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn rejects_network_uris() {
        let config = SourceConfig {
            uri: "rtsp://camera/stream".to_string(),
            ..SourceConfig::default()
        };
        assert!(FrameSource::new(config).is_err());
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn camera_requires_feature() {
        let config = SourceConfig {
            uri: "/dev/video0".to_string(),
            ..SourceConfig::default()
        };
        assert!(FrameSource::new(config).is_err());
    }
}

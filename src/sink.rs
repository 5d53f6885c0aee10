//! Consumers of reduced frames.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::frame::Frame;
use crate::policy::{FrameResult, LabelMap};

/// Receives every processed frame, in order.
pub trait FrameSink {
    /// `frame` is already annotated. `summary` is the one-line text form of `result`.
    fn emit(&mut self, frame: &Frame, result: &FrameResult, summary: &str) -> Result<()>;

    /// Called once when the loop ends, on every exit path.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes the per-frame summary to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl FrameSink for LogSink {
    fn emit(&mut self, frame: &Frame, result: &FrameResult, summary: &str) -> Result<()> {
        log::info!("frame {}: {}", frame.index, summary);
        match result.winner() {
            Some((label, score)) => {
                log::debug!("{} detected with highest score: {:.2}", label, score)
            }
            None => log::debug!("No relevant objects detected"),
        }
        Ok(())
    }
}

/// Saves annotated frames as `frame_NNNNNN.jpg` in a directory.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    written: u64,
}

impl DirectorySink {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn path_for(&self, frame: &Frame) -> PathBuf {
        self.dir.join(format!("frame_{:06}.jpg", frame.index))
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for DirectorySink {
    fn emit(&mut self, frame: &Frame, _result: &FrameResult, _summary: &str) -> Result<()> {
        let path = self.path_for(frame);
        frame
            .image
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        log::info!(
            "DirectorySink: wrote {} frames to {}",
            self.written,
            self.dir.display()
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct FrameRecord<'a> {
    frame: u64,
    winner: Option<&'static str>,
    label_present: &'a LabelMap<bool>,
    confidence: &'a LabelMap<f64>,
}

/// One JSON object per frame, newline-delimited.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FrameSink for JsonLinesSink<W> {
    fn emit(&mut self, frame: &Frame, result: &FrameResult, _summary: &str) -> Result<()> {
        let record = FrameRecord {
            frame: frame.index,
            winner: result.winner().map(|(label, _)| label),
            label_present: &result.label_present,
            confidence: &result.confidence,
        };
        serde_json::to_writer(&mut self.writer, &record).context("serialize frame record")?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Fans every frame out to several sinks.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn FrameSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn FrameSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl FrameSink for MultiSink {
    fn emit(&mut self, frame: &Frame, result: &FrameResult, summary: &str) -> Result<()> {
        for sink in &mut self.sinks {
            sink.emit(frame, result, summary)?;
        }
        Ok(())
    }

    /// Finishes every sink even if one fails; the first error is returned.
    fn finish(&mut self) -> Result<()> {
        let mut first_err = None;
        for sink in &mut self.sinks {
            if let Err(err) = sink.finish() {
                log::warn!("sink finish failed: {}", err);
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

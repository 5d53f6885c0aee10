//! Frame loop: acquire -> detect -> reduce -> emit.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::annotate::summary_text;
use crate::detect::DetectorBackend;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::policy::{FrameResult, LabelMap, LabelReducer};
use crate::sink::FrameSink;

/// What to do when the detector fails on a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorErrorPolicy {
    /// Abort the run with the detector's error.
    #[default]
    Fail,
    /// Log, count and move on to the next frame.
    Skip,
}

impl FromStr for DetectorErrorPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            other => Err(anyhow!(
                "unknown detector error policy '{}'; expected fail or skip",
                other
            )),
        }
    }
}

/// Totals for one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunStats {
    pub frames: u64,
    pub frames_with_winner: u64,
    pub wins: LabelMap<u64>,
    pub skipped: u64,
}

impl RunStats {
    fn record(&mut self, result: &FrameResult) {
        self.frames += 1;
        for (idx, (_, present)) in result.label_present.iter().enumerate() {
            if present {
                self.wins.0[idx] += 1;
                self.frames_with_winner += 1;
            }
        }
    }
}

/// Single-threaded frame loop. Holds borrowed, explicitly constructed
/// collaborators; nothing survives from one frame to the next.
pub struct Pipeline<'a> {
    detector: &'a mut dyn DetectorBackend,
    reducer: &'a LabelReducer,
    on_error: DetectorErrorPolicy,
}

impl<'a> Pipeline<'a> {
    pub fn new(detector: &'a mut dyn DetectorBackend, reducer: &'a LabelReducer) -> Self {
        Self {
            detector,
            reducer,
            on_error: DetectorErrorPolicy::default(),
        }
    }

    pub fn on_detector_error(mut self, policy: DetectorErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    /// Detect and reduce one frame, annotating it in place.
    pub fn process_frame(&mut self, frame: &mut Frame) -> Result<FrameResult> {
        let detections = self
            .detector
            .detect(&frame.image)
            .with_context(|| format!("{} detector failed on frame {}", self.detector.name(), frame.index))?;
        Ok(self.reducer.reduce(&detections, &mut frame.image))
    }

    /// Run until `stop` is set or the source ends. `sink.finish()` is called on
    /// every exit path.
    pub fn run(
        &mut self,
        source: &mut FrameSource,
        sink: &mut dyn FrameSink,
        stop: &AtomicBool,
    ) -> Result<RunStats> {
        let outcome = self.run_loop(source, sink, stop);
        let finished = sink.finish();
        let stats = outcome?;
        finished?;
        Ok(stats)
    }

    fn run_loop(
        &mut self,
        source: &mut FrameSource,
        sink: &mut dyn FrameSink,
        stop: &AtomicBool,
    ) -> Result<RunStats> {
        let mut stats = RunStats::default();
        let started = Instant::now();

        loop {
            if stop.load(Ordering::SeqCst) {
                log::info!("stop requested after {} frames", stats.frames);
                break;
            }

            let mut frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("source exhausted after {} frames", stats.frames);
                    break;
                }
                Err(err) => {
                    log::warn!("frame acquisition failed, stopping: {:#}", err);
                    break;
                }
            };

            let result = match self.process_frame(&mut frame) {
                Ok(result) => result,
                Err(err) => match self.on_error {
                    DetectorErrorPolicy::Fail => return Err(err),
                    DetectorErrorPolicy::Skip => {
                        log::warn!("skipping frame {}: {:#}", frame.index, err);
                        stats.skipped += 1;
                        continue;
                    }
                },
            };

            stats.record(&result);
            sink.emit(&frame, &result, &summary_text(&result))?;
        }

        log::debug!(
            "pipeline ran {} frames in {:.2?} ({} skipped)",
            stats.frames,
            started.elapsed(),
            stats.skipped
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection, ScriptedBackend};
    use crate::ingest::SourceConfig;
    use crate::policy::{PET_COLOR, PET_TRANSPARENT};
    use image::RgbImage;

    fn det(label: &str, confidence: f64) -> Detection {
        Detection::new(label, confidence, BoundingBox::from_corners(2.0, 2.0, 10.0, 10.0))
    }

    fn stub_source(max_frames: Option<u64>) -> FrameSource {
        let mut source = FrameSource::new(SourceConfig {
            uri: "stub://test".to_string(),
            width: 32,
            height: 24,
            max_frames,
            ..SourceConfig::default()
        })
        .unwrap();
        source.connect().unwrap();
        source
    }

    #[derive(Default)]
    struct Recording {
        winners: Vec<Option<&'static str>>,
        summaries: Vec<String>,
        finished: bool,
    }

    impl FrameSink for Recording {
        fn emit(&mut self, _frame: &Frame, result: &FrameResult, summary: &str) -> Result<()> {
            self.winners.push(result.winner().map(|(label, _)| label));
            self.summaries.push(summary.to_string());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    struct Failing {
        fail_on: u64,
        calls: u64,
    }

    impl DetectorBackend for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>> {
            self.calls += 1;
            if self.calls == self.fail_on {
                return Err(anyhow!("inference exploded"));
            }
            Ok(vec![det(PET_TRANSPARENT, 0.9)])
        }
    }

    #[test]
    fn runs_until_source_ends() -> Result<()> {
        let mut detector = ScriptedBackend::new(vec![
            vec![det(PET_COLOR, 0.81), det(PET_TRANSPARENT, 0.93)],
            vec![det("can", 0.99)],
            vec![det(PET_COLOR, 0.75)],
        ]);
        let reducer = LabelReducer::new(0.7)?;
        let mut sink = Recording::default();
        let stop = AtomicBool::new(false);

        let stats = Pipeline::new(&mut detector, &reducer).run(
            &mut stub_source(Some(4)),
            &mut sink,
            &stop,
        )?;

        assert_eq!(stats.frames, 4);
        assert_eq!(stats.frames_with_winner, 2);
        assert_eq!(stats.wins.get(PET_TRANSPARENT), Some(1));
        assert_eq!(stats.wins.get(PET_COLOR), Some(1));
        assert_eq!(
            sink.winners,
            vec![Some(PET_TRANSPARENT), None, Some(PET_COLOR), None]
        );
        assert!(sink.summaries[0].starts_with("Detection Results: PET_transparent: true (0.93)"));
        assert!(sink.finished);
        Ok(())
    }

    #[test]
    fn stop_flag_ends_run_before_first_frame() -> Result<()> {
        let mut detector = ScriptedBackend::empty();
        let reducer = LabelReducer::new(0.7)?;
        let mut sink = Recording::default();
        let stop = AtomicBool::new(true);

        let stats = Pipeline::new(&mut detector, &reducer).run(&mut stub_source(None), &mut sink, &stop)?;
        assert_eq!(stats.frames, 0);
        assert!(sink.finished);
        Ok(())
    }

    #[test]
    fn detector_error_is_fatal_by_default() -> Result<()> {
        let mut detector = Failing { fail_on: 2, calls: 0 };
        let reducer = LabelReducer::new(0.7)?;
        let mut sink = Recording::default();
        let stop = AtomicBool::new(false);

        let err = Pipeline::new(&mut detector, &reducer)
            .run(&mut stub_source(Some(5)), &mut sink, &stop)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("inference exploded"));
        assert_eq!(sink.winners.len(), 1);
        assert!(sink.finished);
        Ok(())
    }

    #[test]
    fn skip_policy_counts_failed_frames() -> Result<()> {
        let mut detector = Failing { fail_on: 2, calls: 0 };
        let reducer = LabelReducer::new(0.7)?;
        let mut sink = Recording::default();
        let stop = AtomicBool::new(false);

        let stats = Pipeline::new(&mut detector, &reducer)
            .on_detector_error(DetectorErrorPolicy::Skip)
            .run(&mut stub_source(Some(3)), &mut sink, &stop)?;

        assert_eq!(stats.frames, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(sink.winners, vec![Some(PET_TRANSPARENT), Some(PET_TRANSPARENT)]);
        Ok(())
    }

    #[test]
    fn process_frame_annotates_in_place() -> Result<()> {
        let mut detector = ScriptedBackend::new(vec![vec![det(PET_COLOR, 0.9)]]);
        let reducer = LabelReducer::new(0.7)?;
        let mut frame = Frame::new(1, RgbImage::new(16, 16));

        let result = Pipeline::new(&mut detector, &reducer).process_frame(&mut frame)?;
        assert!(result.is_present(PET_COLOR));
        assert_eq!(
            *frame.image.get_pixel(2, 2),
            crate::annotate::label_color(PET_COLOR)
        );
        Ok(())
    }

    #[test]
    fn parses_error_policy() {
        assert_eq!("Skip".parse::<DetectorErrorPolicy>().unwrap(), DetectorErrorPolicy::Skip);
        assert_eq!("fail".parse::<DetectorErrorPolicy>().unwrap(), DetectorErrorPolicy::Fail);
        assert!("retry".parse::<DetectorErrorPolicy>().is_err());
    }
}

//! End-to-end runs: still images in, scripted detections, annotated frames and
//! JSON lines out.

use std::path::Path;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use image::{Rgb, RgbImage};

use pet_watch::config::DetectorSettings;
use pet_watch::{
    annotate, build_backend, DetectorErrorPolicy, DirectorySink, FrameSink, FrameSource,
    JsonLinesSink, LabelReducer, MultiSink, Pipeline, SourceConfig, PET_COLOR, PET_TRANSPARENT,
};

const SCRIPT: &str = r#"{
    "frames": [
        [
            {"label": "PET_color", "confidence": 0.81, "bbox": {"x1": 4, "y1": 4, "x2": 20, "y2": 30}},
            {"label": "PET_transparent", "confidence": 0.93, "bbox": {"x1": 30, "y1": 8, "x2": 50, "y2": 40}}
        ],
        [
            {"label": "can", "confidence": 0.99, "bbox": {"x1": 1, "y1": 1, "x2": 10, "y2": 10}},
            {"label": "PET_color", "confidence": 0.5, "bbox": {"x1": 12, "y1": 12, "x2": 24, "y2": 24}}
        ],
        [
            {"label": "PET_transparent", "confidence": 0.8, "bbox": {"x1": 2, "y1": 2, "x2": 8, "y2": 8}},
            {"label": "PET_color", "confidence": 0.8, "bbox": {"x1": 40, "y1": 20, "x2": 60, "y2": 44}}
        ]
    ]
}"#;

fn write_frames(dir: &Path, count: usize) -> Result<()> {
    for i in 0..count {
        RgbImage::from_pixel(64, 48, Rgb([30, 30, 30])).save(dir.join(format!("img_{:02}.png", i)))?;
    }
    Ok(())
}

#[test]
fn replays_script_over_image_directory() -> Result<()> {
    let work = tempfile::tempdir()?;
    let frames_dir = work.path().join("frames");
    let out_dir = work.path().join("out");
    std::fs::create_dir_all(&frames_dir)?;
    write_frames(&frames_dir, 3)?;
    let script_path = work.path().join("script.json");
    std::fs::write(&script_path, SCRIPT)?;

    let mut source = FrameSource::new(SourceConfig {
        uri: frames_dir.display().to_string(),
        ..SourceConfig::default()
    })?;
    source.connect()?;

    let mut detector = build_backend(&DetectorSettings {
        script_path: Some(script_path),
        ..DetectorSettings::default()
    })?;
    let reducer = LabelReducer::new(0.7)?;

    let mut json = JsonLinesSink::new(Vec::new());
    let mut dir_sink = DirectorySink::new(&out_dir)?;
    let stop = AtomicBool::new(false);

    {
        let mut sink = Tee {
            first: &mut json,
            second: &mut dir_sink,
        };
        let stats = Pipeline::new(detector.as_mut(), &reducer).run(&mut source, &mut sink, &stop)?;
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.frames_with_winner, 2);
        assert_eq!(stats.wins.get(PET_TRANSPARENT), Some(2));
        assert_eq!(stats.wins.get(PET_COLOR), Some(0));
    }

    let lines: Vec<serde_json::Value> = String::from_utf8(json.into_inner())?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(lines.len(), 3);

    assert_eq!(lines[0]["winner"], PET_TRANSPARENT);
    assert_eq!(lines[0]["label_present"][PET_COLOR], false);
    assert_eq!(lines[0]["confidence"][PET_COLOR], 0.81);

    // Below-threshold bottle and an unrelated class: nothing wins.
    assert!(lines[1]["winner"].is_null());
    assert_eq!(lines[1]["confidence"][PET_COLOR], 0.0);

    // Tie goes to the first detection in the frame.
    assert_eq!(lines[2]["winner"], PET_TRANSPARENT);

    for index in 1..=3 {
        assert!(out_dir.join(format!("frame_{:06}.jpg", index)).is_file());
    }
    Ok(())
}

#[test]
fn annotated_frame_carries_box_colors() -> Result<()> {
    let work = tempfile::tempdir()?;
    write_frames(work.path(), 1)?;
    let script_path = work.path().join("script.json");
    std::fs::write(&script_path, SCRIPT)?;

    let mut source = FrameSource::new(SourceConfig {
        uri: work.path().join("img_00.png").display().to_string(),
        ..SourceConfig::default()
    })?;
    source.connect()?;
    let mut frame = source.next_frame()?.expect("one frame");

    let mut detector = build_backend(&DetectorSettings {
        script_path: Some(script_path),
        ..DetectorSettings::default()
    })?;
    let reducer = LabelReducer::new(0.7)?;
    let result = Pipeline::new(detector.as_mut(), &reducer).process_frame(&mut frame)?;

    assert_eq!(result.annotations.len(), 2);
    assert_eq!(*frame.image.get_pixel(4, 4), annotate::label_color(PET_COLOR));
    assert_eq!(*frame.image.get_pixel(30, 8), annotate::label_color(PET_TRANSPARENT));
    assert!(source.next_frame()?.is_none());
    Ok(())
}

#[test]
fn unreadable_frame_ends_run_cleanly() -> Result<()> {
    let work = tempfile::tempdir()?;
    std::fs::write(work.path().join("a_broken.jpg"), b"not a jpeg")?;
    write_frames(work.path(), 1)?;

    let mut source = FrameSource::new(SourceConfig {
        uri: work.path().display().to_string(),
        ..SourceConfig::default()
    })?;
    source.connect()?;

    let mut detector = build_backend(&DetectorSettings::default())?;
    let reducer = LabelReducer::new(0.7)?;
    let mut sink = MultiSink::new();
    let stop = AtomicBool::new(false);

    // A decode failure is an end-of-stream condition, not an error.
    let stats = Pipeline::new(detector.as_mut(), &reducer)
        .on_detector_error(DetectorErrorPolicy::Skip)
        .run(&mut source, &mut sink, &stop)?;
    assert_eq!(stats.frames, 0);
    assert_eq!(stats.skipped, 0);
    assert!(!source.is_healthy());
    Ok(())
}

struct Tee<'a> {
    first: &'a mut dyn FrameSink,
    second: &'a mut dyn FrameSink,
}

impl FrameSink for Tee<'_> {
    fn emit(
        &mut self,
        frame: &pet_watch::Frame,
        result: &pet_watch::FrameResult,
        summary: &str,
    ) -> Result<()> {
        self.first.emit(frame, result, summary)?;
        self.second.emit(frame, result, summary)
    }

    fn finish(&mut self) -> Result<()> {
        self.first.finish()?;
        self.second.finish()
    }
}

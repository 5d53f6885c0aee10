//! petwatch - watch a camera or image stream for PET bottles
//!
//! This binary:
//! 1. Loads configuration (file named by PETWATCH_CONFIG or --config, env, flags)
//! 2. Opens the frame source and the detector backend
//! 3. Reduces every frame to a single winning bottle label
//! 4. Logs the summary, and optionally writes annotated frames and JSON lines
//! 5. Stops on Ctrl-C or at end of stream

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pet_watch::{
    build_backend, Annotator, DetectorErrorPolicy, DetectorKind, DirectorySink, FrameSource,
    JsonLinesSink, LabelReducer, LogSink, MultiSink, PetwatchConfig, Pipeline, INTEREST_SET,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Recognize transparent and colored PET bottles in a frame stream"
)]
struct Args {
    /// Config file (.toml or .json).
    #[arg(long, env = "PETWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Frame source: stub://name, /dev/videoN, or an image file/directory.
    #[arg(long)]
    source: Option<String>,

    /// Minimum confidence for a detection to be drawn or win.
    #[arg(long)]
    threshold: Option<f64>,

    /// Detector backend (stub or tract).
    #[arg(long)]
    detector: Option<DetectorKind>,

    /// Detection script for the stub backend.
    #[arg(long)]
    script: Option<PathBuf>,

    /// ONNX model for the tract backend.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Class names file, one label per line.
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Write annotated frames to this directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Print one JSON object per frame on stdout.
    #[arg(long)]
    json: bool,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// What to do when the detector fails on a frame (fail or skip).
    #[arg(long)]
    on_detector_error: Option<DetectorErrorPolicy>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = PetwatchConfig::load_from(args.config.as_deref())?;
    apply_args(&mut cfg, args);
    cfg.validate()?;

    let mut source = FrameSource::new(cfg.source.clone())?;
    source.connect()?;

    let mut detector = build_backend(&cfg.detector)?;
    let reducer = LabelReducer::new(cfg.threshold)?
        .with_annotator(Annotator::from_settings(&cfg.annotate)?);
    log::info!(
        "petwatch {} starting: source={} detector={} threshold={:.2} labels={:?} text={}",
        env!("CARGO_PKG_VERSION"),
        cfg.source.uri,
        detector.name(),
        reducer.threshold(),
        INTEREST_SET,
        reducer.annotator().has_font()
    );

    let mut sink = MultiSink::new();
    sink.push(Box::new(LogSink));
    if let Some(dir) = &cfg.output.dir {
        sink.push(Box::new(DirectorySink::new(dir)?));
    }
    if cfg.output.json {
        sink.push(Box::new(JsonLinesSink::new(std::io::stdout().lock())));
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let stats = Pipeline::new(detector.as_mut(), &reducer)
        .on_detector_error(cfg.detector.on_error)
        .run(&mut source, &mut sink, &stop)?;

    let source_stats = source.stats();
    log::info!(
        "petwatch done: frames={} with_winner={} skipped={} source={} healthy={}",
        stats.frames,
        stats.frames_with_winner,
        stats.skipped,
        source_stats.source,
        source.is_healthy()
    );
    for (label, wins) in stats.wins.iter() {
        log::info!("  {}: {} frames", label, wins);
    }
    Ok(())
}

fn apply_args(cfg: &mut PetwatchConfig, args: Args) {
    if let Some(source) = args.source {
        cfg.source.uri = source;
    }
    if let Some(threshold) = args.threshold {
        cfg.threshold = threshold;
    }
    if let Some(kind) = args.detector {
        cfg.detector.kind = kind;
    }
    if let Some(script) = args.script {
        cfg.detector.script_path = Some(script);
    }
    if let Some(model) = args.model {
        cfg.detector.model_path = Some(model);
    }
    if let Some(labels) = args.labels {
        cfg.detector.labels_path = Some(labels);
    }
    if let Some(dir) = args.output_dir {
        cfg.output.dir = Some(dir);
    }
    if args.json {
        cfg.output.json = true;
    }
    if let Some(max) = args.max_frames {
        cfg.source.max_frames = Some(max);
    }
    if let Some(policy) = args.on_detector_error {
        cfg.detector.on_error = policy;
    }
}

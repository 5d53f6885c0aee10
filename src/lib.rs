//! pet-watch: PET bottle recognition on camera frames.
//!
//! Frames flow through a single-threaded loop:
//!
//! 1. A [`FrameSource`] yields frames (synthetic, still images, or V4L2).
//! 2. A [`DetectorBackend`] turns each frame into raw [`Detection`]s.
//! 3. The [`LabelReducer`] keeps the detections for the two bottle classes,
//!    draws them, and picks at most one winning label.
//! 4. A [`FrameSink`] displays or forwards the result.
//!
//! Inference itself (forward pass, NMS, letterboxing) belongs to the detector
//! backend; this crate only interprets its output.

pub mod annotate;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod policy;
pub mod sink;

pub use annotate::{summary_text, Annotation, Annotator};
pub use config::{DetectorKind, PetwatchConfig};
pub use detect::{build_backend, BoundingBox, Detection, DetectorBackend, Labels, ScriptedBackend};
pub use frame::Frame;
pub use ingest::{FrameSource, SourceConfig};
pub use pipeline::{DetectorErrorPolicy, Pipeline, RunStats};
pub use policy::{
    FrameResult, LabelMap, LabelReducer, DEFAULT_THRESHOLD, INTEREST_SET, PET_COLOR,
    PET_TRANSPARENT,
};
pub use sink::{DirectorySink, FrameSink, JsonLinesSink, LogSink, MultiSink};

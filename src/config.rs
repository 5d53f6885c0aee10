use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingest::SourceConfig;
use crate::pipeline::DetectorErrorPolicy;
use crate::policy::DEFAULT_THRESHOLD;

const DEFAULT_FONT_SCALE: f32 = 18.0;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PetwatchConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    policy: Option<PolicyConfigFile>,
    annotate: Option<AnnotateConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    uri: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<DetectorKind>,
    script_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    on_error: Option<DetectorErrorPolicy>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PolicyConfigFile {
    threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AnnotateConfigFile {
    font_path: Option<PathBuf>,
    font_scale: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    json: Option<bool>,
}

/// Which detector backend to construct.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Scripted detections (see `ScriptedBackend`).
    #[default]
    Stub,
    /// Local ONNX model via tract.
    Tract,
}

impl std::str::FromStr for DetectorKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(Self::Stub),
            "tract" => Ok(Self::Tract),
            other => Err(anyhow!(
                "unknown detector backend '{}'; expected stub or tract",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub kind: DetectorKind,
    pub script_path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub on_error: DetectorErrorPolicy,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        let source = SourceConfig::default();
        Self {
            kind: DetectorKind::Stub,
            script_path: None,
            model_path: None,
            labels_path: None,
            input_width: source.width,
            input_height: source.height,
            on_error: DetectorErrorPolicy::Fail,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotateSettings {
    pub font_path: Option<PathBuf>,
    pub font_scale: f32,
}

impl Default for AnnotateSettings {
    fn default() -> Self {
        Self {
            font_path: None,
            font_scale: DEFAULT_FONT_SCALE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSettings {
    /// Directory for annotated JPEGs.
    pub dir: Option<PathBuf>,
    /// Emit JSON lines on stdout.
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PetwatchConfig {
    pub source: SourceConfig,
    pub detector: DetectorSettings,
    pub threshold: f64,
    pub annotate: AnnotateSettings,
    pub output: OutputSettings,
}

impl Default for PetwatchConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            detector: DetectorSettings::default(),
            threshold: DEFAULT_THRESHOLD,
            annotate: AnnotateSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

impl PetwatchConfig {
    /// Load from the file named by `PETWATCH_CONFIG` (if any), then apply env
    /// overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PETWATCH_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like [`load`](Self::load) with an explicit config file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => PetwatchConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PetwatchConfigFile) -> Self {
        let defaults = Self::default();
        let source_file = file.source.unwrap_or_default();
        let source = SourceConfig {
            uri: source_file.uri.unwrap_or(defaults.source.uri),
            target_fps: source_file.target_fps.unwrap_or(defaults.source.target_fps),
            width: source_file.width.unwrap_or(defaults.source.width),
            height: source_file.height.unwrap_or(defaults.source.height),
            max_frames: source_file.max_frames,
        };
        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            kind: detector_file.backend.unwrap_or(defaults.detector.kind),
            script_path: detector_file.script_path,
            model_path: detector_file.model_path,
            labels_path: detector_file.labels_path,
            // Tract models take frames as-is, so the input defaults to the frame size.
            input_width: detector_file.input_width.unwrap_or(source.width),
            input_height: detector_file.input_height.unwrap_or(source.height),
            on_error: detector_file.on_error.unwrap_or(defaults.detector.on_error),
        };
        let threshold = file
            .policy
            .and_then(|policy| policy.threshold)
            .unwrap_or(defaults.threshold);
        let annotate_file = file.annotate.unwrap_or_default();
        let annotate = AnnotateSettings {
            font_path: annotate_file.font_path,
            font_scale: annotate_file
                .font_scale
                .unwrap_or(defaults.annotate.font_scale),
        };
        let output_file = file.output.unwrap_or_default();
        let output = OutputSettings {
            dir: output_file.dir,
            json: output_file.json.unwrap_or(false),
        };
        Self {
            source,
            detector,
            threshold,
            annotate,
            output,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(uri) = non_empty_env("PETWATCH_SOURCE") {
            self.source.uri = uri;
        }
        if let Some(max) = non_empty_env("PETWATCH_MAX_FRAMES") {
            let max: u64 = max
                .parse()
                .map_err(|_| anyhow!("PETWATCH_MAX_FRAMES must be a non-negative integer"))?;
            self.source.max_frames = Some(max);
        }
        if let Some(threshold) = non_empty_env("PETWATCH_THRESHOLD") {
            self.threshold = threshold
                .parse()
                .map_err(|_| anyhow!("PETWATCH_THRESHOLD must be a number in [0, 1]"))?;
        }
        if let Some(kind) = non_empty_env("PETWATCH_DETECTOR") {
            self.detector.kind = kind.parse()?;
        }
        if let Some(path) = non_empty_env("PETWATCH_SCRIPT_PATH") {
            self.detector.script_path = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty_env("PETWATCH_MODEL_PATH") {
            self.detector.model_path = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty_env("PETWATCH_LABELS_PATH") {
            self.detector.labels_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = non_empty_env("PETWATCH_OUTPUT_DIR") {
            self.output.dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Check cross-field constraints. Call again after applying CLI overrides.
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(anyhow!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            ));
        }
        if self.source.uri.trim().is_empty() {
            return Err(anyhow!("source uri must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        if self.detector.input_width == 0 || self.detector.input_height == 0 {
            return Err(anyhow!("detector input size must be greater than zero"));
        }
        if self.detector.kind == DetectorKind::Tract && self.detector.model_path.is_none() {
            return Err(anyhow!("tract detector requires detector.model_path"));
        }
        if !(self.annotate.font_scale.is_finite() && self.annotate.font_scale > 0.0) {
            return Err(anyhow!("annotate.font_scale must be greater than zero"));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// `.toml` files are parsed as TOML, everything else as JSON.
fn read_config_file(path: &Path) -> Result<PetwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

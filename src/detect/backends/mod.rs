pub mod scripted;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use scripted::ScriptedBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

use anyhow::Result;

use crate::config::{DetectorKind, DetectorSettings};
use crate::detect::backend::DetectorBackend;

/// Construct the configured detector backend.
pub fn build_backend(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    match settings.kind {
        DetectorKind::Stub => {
            let backend = match &settings.script_path {
                Some(path) => ScriptedBackend::from_file(path)?,
                None => {
                    log::warn!("ScriptedBackend: no script configured, frames will have no detections");
                    ScriptedBackend::empty()
                }
            };
            Ok(Box::new(backend))
        }
        DetectorKind::Tract => {
            #[cfg(feature = "backend-tract")]
            {
                use anyhow::anyhow;

                use crate::detect::labels::Labels;

                let model_path = settings
                    .model_path
                    .as_ref()
                    .ok_or_else(|| anyhow!("tract backend requires a model path"))?;
                let labels = match &settings.labels_path {
                    Some(path) => Labels::from_file(path)?,
                    None => Labels::interest_default(),
                };
                let mut backend = TractBackend::new(
                    model_path,
                    labels,
                    settings.input_width,
                    settings.input_height,
                )?;
                backend.warm_up()?;
                Ok(Box::new(backend))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                anyhow::bail!("tract backend requires the backend-tract feature")
            }
        }
    }
}

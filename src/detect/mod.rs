mod backend;
mod backends;
mod labels;
mod result;

pub use backend::DetectorBackend;
pub use backends::{build_backend, ScriptedBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use labels::Labels;
pub use result::{BoundingBox, Detection};

use anyhow::Result;
use image::RgbImage;

use crate::detect::result::Detection;

/// Detector backend trait.
///
/// A backend turns one RGB frame into the detections it sees. Boxes must already
/// be in the frame's pixel space; any resizing, letterboxing or NMS is the
/// backend's own business.
///
/// Backends are constructed once and lent to the frame loop. They must not
/// retain the frame beyond the `detect` call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame. An empty vector means nothing was found.
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

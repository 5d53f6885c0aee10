//! Frames as they travel through the loop.

use image::RgbImage;

/// One captured frame. Owned by the iteration that acquired it and dropped
/// once the sink has seen it.
#[derive(Clone, Debug)]
pub struct Frame {
    /// 1-based position in the source's stream.
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

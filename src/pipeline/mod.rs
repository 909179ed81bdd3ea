pub mod analysis;
#[cfg(feature = "facial-recognition")]
pub mod face;
pub mod features;

use anyhow::Result;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// A face found in a frame, in pixel coordinates of that frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Raw detector score in [0, 1].
    pub score: f32,
    /// Eyes located inside the region (0-2).
    pub eye_count: u8,
}

impl FaceRegion {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Locates faces in a decoded frame.
///
/// Implementations are shared across request handlers and called from
/// blocking worker threads.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceRegion>>;

    /// Short label reported by `/health`.
    fn name(&self) -> &'static str;
}

/// Stand-in used when the binary is built without a detection backend.
pub struct DisabledDetector;

impl FaceDetector for DisabledDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        anyhow::bail!("face detection is not available in this build")
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

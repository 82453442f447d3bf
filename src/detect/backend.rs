use anyhow::Result;
use image::RgbImage;

use crate::detect::result::Detection;

/// The two detection passes of the nested pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetectionStage {
    /// Outer container regions, run on the full frame.
    Vessel,
    /// Regions inside a vessel, run on the vessel crop only.
    Content,
}

impl DetectionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionStage::Vessel => "vessel",
            DetectionStage::Content => "content",
        }
    }
}

/// Object detector capability.
///
/// Backends receive an RGB image and a confidence floor and return detections
/// in that image's own pixel coordinates. Class labels are resolved by the
/// backend from its own class table.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &str;

    /// Run detection, returning only detections at or above `min_confidence`.
    fn detect(&mut self, image: &RgbImage, min_confidence: f32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

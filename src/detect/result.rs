use crate::geometry::BoundingBox;

/// One detector hit. Immutable once created; fields are read through accessors.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    bbox: BoundingBox,
    confidence: f32,
    label: String,
}

impl Detection {
    /// Confidence is clamped into `[0, 1]`.
    pub fn new(bbox: BoundingBox, confidence: f32, label: impl Into<String>) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            bbox,
            confidence,
            label: label.into(),
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}
